//! # Shift Report Parsing
//!
//! Parses the fiscal device's own shift-status report.
//!
//! ## Device Is Authoritative
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Bridge executes shift_status                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Device answers: { "shift_open": true,                                  │
//! │                    "opened_at": "21.08.2026 09:15:00" }  ← local time   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  parse_shift_report(payload, tz_offset) ── THIS MODULE                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ShiftSynchronizer overwrites local config (last-writer-wins)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Devices report wall-clock times in the tenant's fixed business
//! timezone, in either a `d.m.Y H:i:s` token or an ISO token. Both are
//! accepted and normalized to UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// =============================================================================
// Shift Report
// =============================================================================

/// The device's reported shift state, normalized to UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftReport {
    /// Whether the device considers a shift open.
    pub shift_open: bool,

    /// When the device opened the shift, if open.
    pub opened_at: Option<DateTime<Utc>>,
}

/// Raw JSON shape of a shift-status response payload.
#[derive(Debug, Deserialize)]
struct RawShiftReport {
    shift_open: bool,
    #[serde(default)]
    opened_at: Option<String>,
}

// =============================================================================
// Parsing
// =============================================================================

/// Wall-clock formats fiscal devices have been observed to emit.
const DEVICE_TIME_FORMATS: &[&str] = &["%d.%m.%Y %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parses a shift-status response payload.
///
/// `tz_offset_minutes` is the tenant's fixed business timezone (minutes
/// east of UTC); device tokens without an explicit offset are
/// interpreted in it.
pub fn parse_shift_report(payload: &str, tz_offset_minutes: i64) -> Result<ShiftReport, CoreError> {
    let raw: RawShiftReport =
        serde_json::from_str(payload).map_err(|e| CoreError::ShiftReportParse {
            reason: format!("invalid payload: {e}"),
        })?;

    let opened_at = match raw.opened_at.as_deref() {
        Some(token) if !token.is_empty() => {
            Some(parse_device_time(token, tz_offset_minutes)?)
        }
        _ => None,
    };

    Ok(ShiftReport {
        shift_open: raw.shift_open,
        opened_at,
    })
}

/// Parses one device time token, trying RFC 3339 first (offset carried
/// in the token wins), then the known offset-less wall-clock formats.
fn parse_device_time(token: &str, tz_offset_minutes: i64) -> Result<DateTime<Utc>, CoreError> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(token) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    let offset = FixedOffset::east_opt((tz_offset_minutes * 60) as i32).ok_or_else(|| {
        CoreError::ShiftReportParse {
            reason: format!("invalid timezone offset: {tz_offset_minutes} minutes"),
        }
    })?;

    for format in DEVICE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(token, format) {
            let local = naive.and_local_timezone(offset).single().ok_or_else(|| {
                CoreError::ShiftReportParse {
                    reason: format!("ambiguous local time: {token}"),
                }
            })?;
            return Ok(local.with_timezone(&Utc));
        }
    }

    Err(CoreError::ShiftReportParse {
        reason: format!("unrecognized time token: {token}"),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Baku business timezone: UTC+4.
    const BAKU_OFFSET_MINUTES: i64 = 240;

    #[test]
    fn test_device_wall_clock_format() {
        let report = parse_shift_report(
            r#"{"shift_open": true, "opened_at": "21.08.2026 09:15:00"}"#,
            BAKU_OFFSET_MINUTES,
        )
        .unwrap();

        assert!(report.shift_open);
        // 09:15 Baku == 05:15 UTC
        assert_eq!(
            report.opened_at.unwrap(),
            Utc.with_ymd_and_hms(2026, 8, 21, 5, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_iso_format_without_offset() {
        let report = parse_shift_report(
            r#"{"shift_open": true, "opened_at": "2026-08-21T09:15:00"}"#,
            BAKU_OFFSET_MINUTES,
        )
        .unwrap();

        assert_eq!(
            report.opened_at.unwrap(),
            Utc.with_ymd_and_hms(2026, 8, 21, 5, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_rfc3339_offset_in_token_wins() {
        let report = parse_shift_report(
            r#"{"shift_open": true, "opened_at": "2026-08-21T09:15:00+02:00"}"#,
            BAKU_OFFSET_MINUTES,
        )
        .unwrap();

        // Token's own +02:00 is honored, not the tenant offset
        assert_eq!(
            report.opened_at.unwrap(),
            Utc.with_ymd_and_hms(2026, 8, 21, 7, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_closed_shift_has_no_open_time() {
        let report =
            parse_shift_report(r#"{"shift_open": false}"#, BAKU_OFFSET_MINUTES).unwrap();

        assert!(!report.shift_open);
        assert!(report.opened_at.is_none());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let err = parse_shift_report(
            r#"{"shift_open": true, "opened_at": "yesterday-ish"}"#,
            BAKU_OFFSET_MINUTES,
        )
        .unwrap_err();

        assert!(matches!(err, CoreError::ShiftReportParse { .. }));
    }

    #[test]
    fn test_invalid_payload_rejected() {
        assert!(parse_shift_report("not json", BAKU_OFFSET_MINUTES).is_err());
    }
}
