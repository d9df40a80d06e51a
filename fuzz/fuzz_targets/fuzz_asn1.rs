#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = embtls_utils::asn1::Decoder::new(data);
    while !decoder.is_empty() {
        let Ok(tlv) = decoder.read_tlv() else {
            break;
        };
        // descend one level into constructed values
        if tlv.tag & 0x20 != 0 {
            let mut inner = embtls_utils::asn1::Decoder::new(tlv.value);
            while !inner.is_empty() && inner.read_tlv().is_ok() {}
        }
    }
});
