//! Unit tests for time window resolution

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use meter_data_downloader::window::{resolve_window, WindowError};

fn now_utc() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap()
}

#[test]
fn test_relative_periods_end_at_now() {
    for (input, expected) in [
        ("1d", Duration::days(1)),
        ("12h", Duration::hours(12)),
        ("90m", Duration::minutes(90)),
        ("3D", Duration::days(3)),
        ("15M", Duration::minutes(15)),
    ] {
        let window = resolve_window(input, None, now_utc()).unwrap();
        assert_eq!(window.end(), now_utc(), "{input}");
        assert_eq!(window.duration(), expected, "{input}");
    }
}

#[test]
fn test_relative_period_ignores_end_date() {
    let window = resolve_window("2h", Some("2020-01-01T00:00:00"), now_utc()).unwrap();
    assert_eq!(window.end(), now_utc());
    assert_eq!(window.duration(), Duration::hours(2));
}

#[test]
fn test_naive_timestamps_use_timezone_of_now() {
    let cest = FixedOffset::east_opt(2 * 3600).unwrap();
    let now = cest.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap();

    let window = resolve_window("2025-05-01T00:00:00", Some("2025-05-02 00:00"), now).unwrap();
    assert_eq!(
        window.start(),
        Utc.with_ymd_and_hms(2025, 4, 30, 22, 0, 0).unwrap()
    );
    assert_eq!(window.duration(), Duration::days(1));
}

#[test]
fn test_explicit_offset_wins_over_timezone_of_now() {
    let cest = FixedOffset::east_opt(2 * 3600).unwrap();
    let now = cest.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap();

    let window = resolve_window("2025-05-01T00:00:00Z", None, now).unwrap();
    assert_eq!(window.start_secs(), 1_746_057_600);
    assert_eq!(window.end(), now.with_timezone(&Utc));
}

#[test]
fn test_date_only_start_is_midnight() {
    let window = resolve_window("2025-05-01", Some("2025-05-01T06:00:00"), now_utc()).unwrap();
    assert_eq!(window.start_secs(), 1_746_057_600);
    assert_eq!(window.end_secs() - window.start_secs(), 6 * 3600);
}

#[test]
fn test_unparsable_end_falls_back_to_now() {
    let window = resolve_window("2025-05-01T00:00:00Z", Some("yesterday-ish"), now_utc()).unwrap();
    assert_eq!(window.end(), now_utc());
}

#[test]
fn test_unknown_unit_is_rejected() {
    let err = resolve_window("5w", None, now_utc()).unwrap_err();
    assert!(matches!(err, WindowError::UnknownUnit(unit) if unit == "w"));
}

#[test]
fn test_garbage_start_is_rejected() {
    for input in ["", "yesterday", "2025-13-01", "h5"] {
        let err = resolve_window(input, None, now_utc()).unwrap_err();
        assert!(
            matches!(err, WindowError::InvalidFormat(_)),
            "{input:?} gave {err:?}"
        );
    }
}

#[test]
fn test_start_must_precede_end() {
    let err = resolve_window(
        "2025-05-02T00:00:00Z",
        Some("2025-05-01T00:00:00Z"),
        now_utc(),
    )
    .unwrap_err();
    assert!(matches!(err, WindowError::EmptyWindow { .. }));

    let err = resolve_window("2025-05-01T00:00:00Z", Some("2025-05-01T00:00:00Z"), now_utc())
        .unwrap_err();
    assert!(matches!(err, WindowError::EmptyWindow { .. }));

    // A start in the future ends at now
    let err = resolve_window("2030-01-01T00:00:00Z", None, now_utc()).unwrap_err();
    assert!(matches!(err, WindowError::EmptyWindow { .. }));
}

#[test]
fn test_protocol_seconds_round_half_up() {
    let window = resolve_window(
        "2025-05-01T00:00:00.499Z",
        Some("2025-05-01T00:00:10.500Z"),
        now_utc(),
    )
    .unwrap();
    assert_eq!(window.start_secs(), 1_746_057_600);
    assert_eq!(window.end_secs(), 1_746_057_611);
}
