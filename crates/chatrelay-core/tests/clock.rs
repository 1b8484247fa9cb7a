#![allow(clippy::unwrap_used)]

use chatrelay_core::{Clock, ManualClock, SystemClock};

#[test]
fn manual_clock_is_settable() {
    let clock = ManualClock::new(100);
    assert_eq!(clock.now_unix(), 100);
    clock.set(105);
    assert_eq!(clock.now_unix(), 105);
}

#[test]
fn system_clock_is_after_2020() {
    assert!(SystemClock.now_unix() > 1_577_836_800);
}
