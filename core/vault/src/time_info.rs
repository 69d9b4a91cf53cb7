//! Timestamps attached to groups and entries.

use chrono::{DateTime, Utc};

/// Creation, modification, access and expiry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeInfo {
    pub last_modification_time: DateTime<Utc>,
    pub creation_time: DateTime<Utc>,
    pub last_access_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub expires: bool,
    pub usage_count: i32,
    pub location_changed: DateTime<Utc>,
}

impl TimeInfo {
    /// All timestamps set to now, not expiring, never used.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            last_modification_time: now,
            creation_time: now,
            last_access_time: now,
            expiry_time: now,
            expires: false,
            usage_count: 0,
            location_changed: now,
        }
    }
}

impl Default for TimeInfo {
    fn default() -> Self {
        Self::new()
    }
}
