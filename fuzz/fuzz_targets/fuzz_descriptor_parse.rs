#![no_main]

use libfuzzer_sys::fuzz_target;
use tidb_bootstrap::connection::TlsRegistry;
use tidb_bootstrap::normalize;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let registry = TlsRegistry::new();

    if let Ok(first) = normalize(input, &registry, None) {
        assert!(first.as_str().contains("parseTime=true"));

        let second = normalize(first.as_str(), &registry, None)
            .expect("canonical descriptor must parse");
        assert_eq!(first.as_str(), second.as_str());
    }
});
