use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Timelike, Utc};

pub const BACKUP_PREFIX: &str = "backup_";

const STAMP_FORMAT: &str = "%Y-%m-%d_%H_%M_%S_%3fZ";

/// Millisecond-precision UTC timestamp naming a backup directory, e.g.
/// `backup_2024-05-01_13_07_59_042Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupStamp {
    at: DateTime<Utc>,
}

impl BackupStamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let truncated_nanos = (at.nanosecond() / 1_000_000) * 1_000_000;
        let at = at.with_nanosecond(truncated_nanos).unwrap_or(at);
        Self { at }
    }

    /// Parses a directory name. Only names that re-render byte-for-byte are
    /// accepted, so `backup_other` or `backup_2024-01-01_x` are rejected.
    pub fn parse(name: &str) -> Option<Self> {
        let token = name.strip_prefix(BACKUP_PREFIX)?;
        let naive = NaiveDateTime::parse_from_str(token, STAMP_FORMAT).ok()?;
        let stamp = Self::from_datetime(naive.and_utc());
        (stamp.dir_name() == name).then_some(stamp)
    }

    pub fn dir_name(&self) -> String {
        format!("{BACKUP_PREFIX}{}", self.at.format(STAMP_FORMAT))
    }

    pub fn successor(&self) -> Self {
        Self {
            at: self.at + TimeDelta::milliseconds(1),
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

impl fmt::Display for BackupStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}
