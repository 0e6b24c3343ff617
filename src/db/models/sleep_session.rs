//! Sleep session data models.

use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Id carried by a session that has not been inserted yet.
pub const UNSAVED_ID: i64 = 0;

/// Quality value of a session nobody has rated.
pub const UNRATED: i32 = -1;

/// One night of sleep.
///
/// A session is open while `end_time_ms == start_time_ms`; stopping it moves
/// `end_time_ms` forward exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSession {
    pub id: i64,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub quality: i32,
}

impl SleepSession {
    /// A fresh, unsaved, open session starting at `now_ms`.
    pub fn begin(now_ms: i64) -> Self {
        Self {
            id: UNSAVED_ID,
            start_time_ms: now_ms,
            end_time_ms: now_ms,
            quality: UNRATED,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time_ms == self.start_time_ms
    }

    pub fn is_rated(&self) -> bool {
        self.quality != UNRATED
    }

    pub fn rating(&self) -> Option<SleepQuality> {
        SleepQuality::try_from(self.quality).ok()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end_time_ms - self.start_time_ms).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SleepQuality {
    VeryBad,
    Poor,
    SoSo,
    Ok,
    PrettyGood,
    Excellent,
}

impl SleepQuality {
    pub fn as_i32(self) -> i32 {
        match self {
            SleepQuality::VeryBad => 0,
            SleepQuality::Poor => 1,
            SleepQuality::SoSo => 2,
            SleepQuality::Ok => 3,
            SleepQuality::PrettyGood => 4,
            SleepQuality::Excellent => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SleepQuality::VeryBad => "Very bad",
            SleepQuality::Poor => "Poor",
            SleepQuality::SoSo => "So-so",
            SleepQuality::Ok => "OK",
            SleepQuality::PrettyGood => "Pretty good",
            SleepQuality::Excellent => "Excellent",
        }
    }
}

impl TryFrom<i32> for SleepQuality {
    type Error = anyhow::Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(SleepQuality::VeryBad),
            1 => Ok(SleepQuality::Poor),
            2 => Ok(SleepQuality::SoSo),
            3 => Ok(SleepQuality::Ok),
            4 => Ok(SleepQuality::PrettyGood),
            5 => Ok(SleepQuality::Excellent),
            other => Err(anyhow!("sleep quality {other} is outside 0..=5")),
        }
    }
}

impl fmt::Display for SleepQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_creates_open_unrated_session() {
        let session = SleepSession::begin(1_000);
        assert_eq!(session.id, UNSAVED_ID);
        assert_eq!(session.end_time_ms, 1_000);
        assert!(session.is_open());
        assert!(!session.is_rated());
        assert_eq!(session.rating(), None);
        assert_eq!(session.duration_ms(), 0);
    }

    #[test]
    fn closed_session_reports_duration() {
        let mut session = SleepSession::begin(1_000);
        session.end_time_ms = 5_000;
        assert!(!session.is_open());
        assert_eq!(session.duration_ms(), 4_000);
    }

    #[test]
    fn quality_scale_is_zero_to_five() {
        assert!(SleepQuality::try_from(-1).is_err());
        assert!(SleepQuality::try_from(6).is_err());
        for value in 0..=5 {
            let quality = SleepQuality::try_from(value).unwrap();
            assert_eq!(quality.as_i32(), value);
        }
        assert_eq!(SleepQuality::Excellent.to_string(), "Excellent");
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let json = serde_json::to_value(SleepSession::begin(7)).unwrap();
        assert_eq!(json["startTimeMs"], 7);
        assert_eq!(json["quality"], -1);
    }
}
