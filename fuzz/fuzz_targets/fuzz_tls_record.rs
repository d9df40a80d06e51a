#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut layer = embtls_tls::record::RecordLayer::new();
    let mut rest = data;
    while let Ok(Some((_, _, consumed))) = layer.open_record(rest) {
        rest = &rest[consumed..];
    }
});
