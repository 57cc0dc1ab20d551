use super::*;
use chrono::TimeZone;

#[test]
fn fake_clock_advances_by_duration() {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let clock = FakeClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(chrono::Duration::seconds(90));
    assert_eq!(clock.now(), start + chrono::Duration::seconds(90));
}

#[test]
fn fake_clock_set_overrides_current() {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let clock = FakeClock::new(start);
    let later = start + chrono::Duration::days(1);
    clock.set(later);
    assert_eq!(clock.now(), later);
}

#[test]
fn system_clock_moves_forward() {
    let clock = SystemClock;
    let first = clock.now();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = clock.now();
    assert!(second >= first);
}
