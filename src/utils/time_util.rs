use serde::{Deserialize, Serialize};
use std::time::{self, Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Ext2Error, Result};

/// represent a point in time with seconds and fraction of a second in nanoseconds
///
/// The volume stores every timestamp as 32-bit seconds since [UNIX_EPOCH],
/// so anything read back from disk has `nsec == 0`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeDurationStruct {
    /// seconds
    pub sec: u64,
    /// fraction of a second in nanoseconds
    pub nsec: u32,
}

/// calculate what time is it since `1970-1-1 00:00:00`,named as [UNIX_EPOCH]
pub fn now() -> TimeDurationStruct {
    // a clock set before 1970 is reported as the epoch itself
    let now = SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .unwrap_or_default();
    TimeDurationStruct {
        sec: now.as_secs(),
        nsec: now.subsec_nanos(),
    }
}

impl TimeDurationStruct {
    /// a timestamp read from disk
    pub const fn from_unix_seconds(sec: u32) -> Self {
        Self {
            sec: sec as u64,
            nsec: 0,
        }
    }

    /// an optional timestamp read from disk, `0` means "never"
    pub const fn from_optional_unix_seconds(sec: u32) -> Option<Self> {
        if sec == 0 {
            None
        } else {
            Some(Self::from_unix_seconds(sec))
        }
    }

    /// seconds to store on disk, the fraction of a second is dropped
    /// # Params
    /// - `field`: name of the on-disk field, reported when the value doesn't fit
    pub fn to_unix_seconds(&self, field: &'static str) -> Result<u32> {
        u32::try_from(self.sec).map_err(|_| Ext2Error::invalid_field(field, self.sec))
    }

    /// seconds to store on disk for an optional timestamp, `None` is stored as `0`
    pub fn optional_to_unix_seconds(value: Option<Self>, field: &'static str) -> Result<u32> {
        value.map_or(Ok(0), |ts| ts.to_unix_seconds(field))
    }

    /// drop the fraction of a second, the precision kept on disk
    pub const fn truncate_to_seconds(self) -> Self {
        Self {
            sec: self.sec,
            nsec: 0,
        }
    }
}

impl From<TimeDurationStruct> for SystemTime {
    fn from(value: TimeDurationStruct) -> Self {
        let duration = Duration::new(value.sec, value.nsec);
        UNIX_EPOCH + duration
    }
}

impl TryFrom<SystemTime> for TimeDurationStruct {
    type Error = Ext2Error;
    fn try_from(value: SystemTime) -> Result<Self> {
        match value.duration_since(UNIX_EPOCH) {
            Ok(duration) => Ok(TimeDurationStruct {
                sec: duration.as_secs(),
                nsec: duration.subsec_nanos(),
            }),
            Err(before_epoch_error) => Err(Ext2Error::invalid_argument(
                "timestamp",
                format!("doesn't support time before UNIX_EPOCH: {before_epoch_error}"),
            )),
        }
    }
}
