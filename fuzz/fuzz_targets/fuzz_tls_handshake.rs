#![no_main]
use libfuzzer_sys::fuzz_target;

use embtls_tls::handshake::codec;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let _ = codec::decode_v2_client_hello(data);
    if let Ok((_, body)) = codec::parse_handshake_header(data) {
        let _ = codec::decode_client_hello(body);
        let _ = codec::decode_server_hello(body);
        let _ = codec::decode_certificate(body);
        let _ = codec::decode_certificate_request(body);
        let _ = codec::decode_server_key_exchange(body);
    }
});
