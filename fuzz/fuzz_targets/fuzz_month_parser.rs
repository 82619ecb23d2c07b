#![no_main]
use libfuzzer_sys::fuzz_target;

use uilet_calendar::domain::calendar_view::{CalendarMonth, WeekStart, enumerate_visible_days};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data)
        && let Ok(month) = text.parse::<CalendarMonth>()
    {
        assert_eq!(month.to_string().parse::<CalendarMonth>().ok(), Some(month));
        let days = enumerate_visible_days(month, WeekStart::Sunday);
        assert_eq!(days.len() % 7, 0);
        let _ = month.offset(i32::MAX).offset(i32::MIN);
    }
});
