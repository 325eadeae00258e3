#![no_main]

use std::str::FromStr;

use libfuzzer_sys::fuzz_target;

use amalgam_types::{AccountName, Asset};

// Account names and asset literals come straight from user input in
// API payloads. Parsing must reject garbage without panicking.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = AccountName::new(text);

    if let Ok(asset) = Asset::from_str(text) {
        // Anything that parses has to print back to a parseable form.
        let printed = asset.to_string();
        let reparsed = Asset::from_str(&printed).unwrap();
        assert_eq!(asset, reparsed);
    }
});
