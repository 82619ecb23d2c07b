#![no_main]
use libfuzzer_sys::fuzz_target;

use uilet_calendar::adapters::backend::client::parse_records;
use uilet_calendar::domain::availability::resolve;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data)
        && let Ok(records) = parse_records(body)
        && let Some(first) = records.first()
    {
        // Whatever decodes must resolve without panicking
        let _ = resolve(first.date_start, &records, true, first.date_end);
        let _ = first.day_count();
    }
});
