//! Ubuntu release calendar.
//!
//! Lifecycle flags come from the distro-info CSV
//! (`version,codename,series,created,release,eol,eol-server,eol-esm`), not
//! from branch names. A release is `supported` once released and until its
//! server end-of-life (plain `eol` when no server date is given), and `devel`
//! while created but not yet released.

use std::path::Path;

use chrono::NaiveDate;
use slice_index_core::{ReleaseFlags, release_number};

use crate::error::{Result, ScanError};

/// One release row of the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// `(year, month)` release number.
    pub version: (u32, u32),
    pub lts: bool,
    /// Full codename, e.g. `Noble Numbat`.
    pub codename: String,
    /// Archive series, e.g. `noble`.
    pub series: String,
    pub created: Option<NaiveDate>,
    pub release: Option<NaiveDate>,
    pub eol: Option<NaiveDate>,
    pub eol_server: Option<NaiveDate>,
}

impl ReleaseInfo {
    /// Lifecycle flags as of `today`.
    pub fn flags_on(&self, today: NaiveDate) -> ReleaseFlags {
        let released = self.release.is_some_and(|date| date <= today);
        let end = self.eol_server.or(self.eol);
        let created = self.created.is_some_and(|date| date <= today);
        ReleaseFlags {
            lts: self.lts,
            supported: released && end.is_none_or(|date| today <= date),
            devel: created && !released,
        }
    }
}

/// Parsed release calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseCalendar {
    releases: Vec<ReleaseInfo>,
}

impl ReleaseCalendar {
    /// An empty calendar; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads the calendar from a distro-info CSV file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parses distro-info CSV text.
    ///
    /// Columns are located by header name, so extra or reordered columns are
    /// tolerated.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use slice_index_scan::ReleaseCalendar;
    ///
    /// let csv = "version,codename,series,created,release,eol,eol-server,eol-esm\n\
    ///            24.04 LTS,Noble Numbat,noble,2023-10-26,2024-04-25,2029-05-31,2029-05-31,2034-04-25\n";
    /// let calendar = ReleaseCalendar::parse(csv).unwrap();
    /// let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let (series, flags) = calendar.lookup("ubuntu-24.04", today).unwrap();
    /// assert_eq!(series, "noble");
    /// assert!(flags.lts && flags.supported && !flags.devel);
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let Some((_, header)) = lines.next() else {
            return Ok(Self::empty());
        };
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let column = |name: &str| -> Result<usize> {
            columns
                .iter()
                .position(|c| *c == name)
                .ok_or_else(|| ScanError::Calendar {
                    line: 1,
                    message: format!("missing column '{name}'"),
                })
        };
        let version_col = column("version")?;
        let codename_col = column("codename")?;
        let series_col = column("series")?;
        let created_col = column("created")?;
        let release_col = column("release")?;
        let eol_col = column("eol")?;
        let eol_server_col = columns.iter().position(|c| *c == "eol-server");

        let mut releases = Vec::new();
        for (idx, line) in lines {
            let line_no = idx + 1;
            let cells: Vec<&str> = line.split(',').map(str::trim).collect();
            let cell = |col: usize| cells.get(col).copied().unwrap_or("");
            let date = |col: usize| -> Result<Option<NaiveDate>> {
                let value = cell(col);
                if value.is_empty() {
                    return Ok(None);
                }
                NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map(Some)
                    .map_err(|e| ScanError::Calendar {
                        line: line_no,
                        message: format!("bad date '{value}': {e}"),
                    })
            };

            let version_cell = cell(version_col);
            let number = version_cell.split_whitespace().next().unwrap_or("");
            let Some(version) = release_number(&format!("-{number}")) else {
                return Err(ScanError::Calendar {
                    line: line_no,
                    message: format!("bad version '{version_cell}'"),
                });
            };

            releases.push(ReleaseInfo {
                version,
                lts: version_cell.contains("LTS"),
                codename: cell(codename_col).to_string(),
                series: cell(series_col).to_string(),
                created: date(created_col)?,
                release: date(release_col)?,
                eol: date(eol_col)?,
                eol_server: match eol_server_col {
                    Some(col) => date(col)?,
                    None => None,
                },
            });
        }

        Ok(Self { releases })
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Finds the release matching a branch name such as `ubuntu-22.04`.
    pub fn find(&self, branch: &str) -> Option<&ReleaseInfo> {
        let version = release_number(branch)?;
        self.releases.iter().find(|r| r.version == version)
    }

    /// Returns the series and lifecycle flags of a branch as of `today`.
    pub fn lookup(&self, branch: &str, today: NaiveDate) -> Option<(String, ReleaseFlags)> {
        self.find(branch)
            .map(|info| (info.series.clone(), info.flags_on(today)))
    }
}
