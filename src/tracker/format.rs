use std::fmt::Write;

use crate::db::{helpers::millis_to_datetime, SleepSession};

fn format_timestamp(value_ms: i64, field: &str) -> String {
    millis_to_datetime(value_ms, field)
        .map(|dt| dt.format("%a %b %d %Y %H:%M UTC").to_string())
        .unwrap_or_else(|_| format!("{value_ms} ms"))
}

fn format_duration(duration_ms: i64) -> String {
    let total_minutes = duration_ms / 60_000;
    format!("{}:{:02}", total_minutes / 60, total_minutes % 60)
}

/// Renders the history newest first, one block per session.
pub fn format_history(sessions: &[SleepSession]) -> String {
    if sessions.is_empty() {
        return "No sleep recorded yet.\n".to_string();
    }

    let mut out = String::from("HISTORY\n");
    for session in sessions {
        let _ = writeln!(out);
        let _ = writeln!(out, "#{}", session.id);
        let _ = writeln!(
            out,
            "  Start:    {}",
            format_timestamp(session.start_time_ms, "start_time_ms")
        );
        if session.is_open() {
            let _ = writeln!(out, "  End:      in progress");
        } else {
            let _ = writeln!(
                out,
                "  End:      {}",
                format_timestamp(session.end_time_ms, "end_time_ms")
            );
            let _ = writeln!(out, "  Slept:    {}", format_duration(session.duration_ms()));
        }
        let quality = session
            .rating()
            .map(|q| q.label())
            .unwrap_or("not rated");
        let _ = writeln!(out, "  Quality:  {quality}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_has_placeholder() {
        assert_eq!(format_history(&[]), "No sleep recorded yet.\n");
    }

    #[test]
    fn renders_closed_and_open_sessions() {
        let closed = SleepSession {
            id: 1,
            start_time_ms: 0,
            end_time_ms: (7 * 60 + 45) * 60_000,
            quality: 4,
        };
        let open = SleepSession {
            id: 2,
            ..SleepSession::begin(86_400_000)
        };

        let text = format_history(&[open, closed]);
        let open_at = text.find("#2").unwrap();
        let closed_at = text.find("#1").unwrap();
        assert!(open_at < closed_at);
        assert!(text.contains("in progress"));
        assert!(text.contains("Start:    Thu Jan 01 1970 00:00 UTC"));
        assert!(text.contains("Slept:    7:45"));
        assert!(text.contains("Quality:  Pretty good"));
        assert!(text.contains("Quality:  not rated"));
    }
}
