use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};

use crate::db::models::{SleepQuality, UNRATED};

pub fn millis_to_datetime(value: i64, field: &str) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(value)
        .ok_or_else(|| anyhow!("{field} value {value} is not a representable timestamp"))
}

pub fn parse_quality(value: i32, field: &str) -> Result<i32> {
    if value == UNRATED || SleepQuality::try_from(value).is_ok() {
        Ok(value)
    } else {
        Err(anyhow!("{field} contains out-of-range rating {value}"))
    }
}

pub fn check_time_range(start_time_ms: i64, end_time_ms: i64) -> Result<()> {
    if end_time_ms < start_time_ms {
        bail!("end_time_ms {end_time_ms} precedes start_time_ms {start_time_ms}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_accepts_unrated_and_scale() {
        assert_eq!(parse_quality(-1, "quality_rating").unwrap(), -1);
        assert_eq!(parse_quality(5, "quality_rating").unwrap(), 5);
        assert!(parse_quality(9, "quality_rating").is_err());
        assert!(parse_quality(-2, "quality_rating").is_err());
    }

    #[test]
    fn time_range_rejects_backwards_sessions() {
        assert!(check_time_range(1_000, 1_000).is_ok());
        assert!(check_time_range(1_000, 5_000).is_ok());
        assert!(check_time_range(5_000, 1_000).is_err());
    }

    #[test]
    fn millis_convert_to_utc() {
        let dt = millis_to_datetime(0, "start_time_ms").unwrap();
        assert_eq!(dt.to_rfc3339(), "1970-01-01T00:00:00+00:00");
    }
}
