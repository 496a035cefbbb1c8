#![no_main]

use convoy_types::Values;
use convoy_values::ValueTyping;
use convoy_values::strvals::parse_into;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else { return };

    for typing in [ValueTyping::Structured, ValueTyping::ForcedString] {
        let mut values = Values::new();
        if parse_into(s, typing, &mut values).is_ok() {
            // Whatever parses must serialize.
            serde_json::to_string(&values).expect("parsed values serialize");
        }
    }
});
