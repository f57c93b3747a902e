#![no_main]

use libfuzzer_sys::fuzz_target;
use spf_policy::parse_record;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data)
        && let Ok(record) = parse_record(raw)
    {
        // A parsed record renders to text that parses to the same record.
        let rendered = record.to_string();
        assert_eq!(parse_record(&rendered).ok(), Some(record));
    }
});
