#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((certs, consumed)) = embtls_pki::x509::parse_certificates(data) {
        assert!(consumed <= data.len());
        for cert in &certs {
            let _ = cert.to_text("");
        }
    }
    let _ = embtls_pki::parse_rsa_private_key(data);
});
