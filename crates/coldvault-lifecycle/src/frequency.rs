//! Backup cadence and its eligibility cutoff.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// How often a backup image series is produced.
///
/// Selected once at configuration time. Each cadence carries the tag value
/// images are discovered by and the age cutoff below which an image is old
/// enough to ship to cold storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Monthly,
}

impl Frequency {
    /// Tag value the provider's backup images are discovered by.
    pub fn tag_value(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Latest creation time an image may have to be eligible at `now`.
    ///
    /// Selection is inclusive: an image is eligible when
    /// `created_at <= cutoff`, so an image produced exactly on the boundary
    /// is picked up and a same-day image never is.
    pub fn age_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Frequency::Weekly => now - Duration::days(7),
            Frequency::Monthly => {
                let (year, month) = if now.month() == 1 {
                    (now.year() - 1, 12)
                } else {
                    (now.year(), now.month() - 1)
                };
                Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
                    .single()
                    .expect("first of month at midnight is unambiguous in UTC")
            }
        }
    }

    /// Whether an image created at `created_at` is old enough at `now`.
    pub fn is_eligible(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        created_at <= self.age_cutoff(now)
    }
}
