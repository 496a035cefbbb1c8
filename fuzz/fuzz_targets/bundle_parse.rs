#![no_main]

use convoy_types::{BundleLock, BundleMetadata};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else { return };

    if let Ok(meta) = serde_yaml::from_str::<BundleMetadata>(s) {
        let _ = meta.is_installable();
        let _ = serde_yaml::to_string(&meta);
    }
    let _ = serde_yaml::from_str::<BundleLock>(s);
});
