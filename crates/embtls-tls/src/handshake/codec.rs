//! SSLv3 / TLS 1.0 handshake message encoding and decoding
//! (RFC 6101 §5.6, RFC 2246 §7.4, and the SSLv2-framed ClientHello of
//! RFC 2246 Appendix E).

use super::HandshakeType;
use crate::{CipherSuite, TlsVersion};
use embtls_crypto::hash::{Digest, Md5, Sha1};
use embtls_types::TlsError;

/// Handshake messages larger than this are rejected before buffering.
pub const MAX_HANDSHAKE_LEN: usize = 65536;

const EXT_SERVER_NAME: u16 = 0;
const SNI_HOST_NAME: u8 = 0;
/// SSLv2 CLIENT-HELLO message type.
const SSL2_MT_CLIENT_HELLO: u8 = 1;
/// `rsa_sign` client certificate type.
pub const CERT_TYPE_RSA_SIGN: u8 = 1;

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// ClientHello message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Highest version the client supports, as sent.
    pub version: [u8; 2],
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
    /// Host name from the server_name extension.
    pub server_name: Option<String>,
}

/// ServerHello message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub version: TlsVersion,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
}

/// ServerKeyExchange for the DHE_RSA suites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    /// `dh_p || dh_g || dh_Ys`, each with a 2-byte length, as on the wire.
    pub params: Vec<u8>,
    pub signature: Vec<u8>,
}

/// CertificateRequest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    /// DER distinguished names of acceptable CAs.
    pub ca_names: Vec<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over one message body. Every read names the
/// message in its error.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    msg: &'static str,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8], msg: &'static str) -> Self {
        Self { data, pos: 0, msg }
    }

    pub(crate) fn err(&self, reason: impl Into<String>) -> TlsError {
        TlsError::BadHandshakeMessage {
            state: self.msg,
            reason: reason.into(),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn bytes(&mut self, n: usize, what: &str) -> Result<&'a [u8], TlsError> {
        if self.remaining() < n {
            return Err(self.err(format!("truncated {what}")));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn u8(&mut self, what: &str) -> Result<u8, TlsError> {
        Ok(self.bytes(1, what)?[0])
    }

    pub(crate) fn u16(&mut self, what: &str) -> Result<u16, TlsError> {
        let b = self.bytes(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u24(&mut self, what: &str) -> Result<usize, TlsError> {
        let b = self.bytes(3, what)?;
        Ok(read_u24(b))
    }

    pub(crate) fn vec8(&mut self, what: &str) -> Result<&'a [u8], TlsError> {
        let n = self.u8(what)? as usize;
        self.bytes(n, what)
    }

    pub(crate) fn vec16(&mut self, what: &str) -> Result<&'a [u8], TlsError> {
        let n = self.u16(what)? as usize;
        self.bytes(n, what)
    }

    pub(crate) fn vec24(&mut self, what: &str) -> Result<&'a [u8], TlsError> {
        let n = self.u24(what)?;
        self.bytes(n, what)
    }

    pub(crate) fn array32(&mut self, what: &str) -> Result<[u8; 32], TlsError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.bytes(32, what)?);
        Ok(out)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    /// The message must end exactly here.
    pub(crate) fn finish(&self) -> Result<(), TlsError> {
        if self.remaining() != 0 {
            return Err(self.err(format!("{} trailing bytes", self.remaining())));
        }
        Ok(())
    }
}

pub(crate) fn read_u24(b: &[u8]) -> usize {
    ((b[0] as usize) << 16) | ((b[1] as usize) << 8) | (b[2] as usize)
}

fn push_u24(out: &mut Vec<u8>, n: usize) {
    out.push((n >> 16) as u8);
    out.push((n >> 8) as u8);
    out.push(n as u8);
}

fn push_vec16(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
}

// ---------------------------------------------------------------------------
// Handshake header
// ---------------------------------------------------------------------------

/// Parse a handshake header: msg_type(1) || length(3).
/// Returns the type and the body, which must fill the rest of `data`.
pub fn parse_handshake_header(data: &[u8]) -> Result<(HandshakeType, &[u8]), TlsError> {
    let mut r = Reader::new(data, "handshake header");
    let raw_type = r.u8("message type")?;
    let body = r.vec24("message body")?;
    r.finish()?;
    let msg_type = HandshakeType::from_u8(raw_type)
        .ok_or_else(|| r.err(format!("unknown handshake type {raw_type}")))?;
    Ok((msg_type, body))
}

/// Wrap a handshake body with the 4-byte header.
pub fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.push(msg_type as u8);
    push_u24(&mut out, body.len());
    out.extend_from_slice(body);
    out
}

// ---------------------------------------------------------------------------
// Hello messages
// ---------------------------------------------------------------------------

pub fn encode_hello_request() -> Vec<u8> {
    wrap_handshake(HandshakeType::HelloRequest, &[])
}

/// Encode a ClientHello as a complete handshake message.
pub fn encode_client_hello(ch: &ClientHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(128);
    body.extend_from_slice(&ch.version);
    body.extend_from_slice(&ch.random);
    body.push(ch.session_id.len() as u8);
    body.extend_from_slice(&ch.session_id);

    body.extend_from_slice(&((ch.cipher_suites.len() * 2) as u16).to_be_bytes());
    for suite in &ch.cipher_suites {
        body.extend_from_slice(&suite.0.to_be_bytes());
    }
    body.push(ch.compression_methods.len() as u8);
    body.extend_from_slice(&ch.compression_methods);

    if let Some(name) = &ch.server_name {
        // server_name: list_len || name_type || name_len || name
        let mut entry = vec![SNI_HOST_NAME];
        push_vec16(&mut entry, name.as_bytes());
        let mut list = Vec::with_capacity(entry.len() + 2);
        push_vec16(&mut list, &entry);

        let mut exts = Vec::with_capacity(list.len() + 4);
        exts.extend_from_slice(&EXT_SERVER_NAME.to_be_bytes());
        push_vec16(&mut exts, &list);
        push_vec16(&mut body, &exts);
    }
    wrap_handshake(HandshakeType::ClientHello, &body)
}

/// Decode a record-framed ClientHello body.
pub fn decode_client_hello(body: &[u8]) -> Result<ClientHello, TlsError> {
    let mut r = Reader::new(body, "ClientHello");
    let mut version = [0u8; 2];
    version.copy_from_slice(r.bytes(2, "version")?);
    let random = r.array32("random")?;
    let session_id = r.vec8("session id")?;
    if session_id.len() > 32 {
        return Err(r.err("session id longer than 32 bytes"));
    }
    let suites = r.vec16("cipher suites")?;
    if suites.is_empty() || suites.len() % 2 != 0 {
        return Err(r.err("bad cipher suite list length"));
    }
    let cipher_suites = suites
        .chunks_exact(2)
        .map(|c| CipherSuite(u16::from_be_bytes([c[0], c[1]])))
        .collect();
    let compression_methods = r.vec8("compression methods")?.to_vec();
    if !compression_methods.contains(&0) {
        return Err(r.err("null compression not offered"));
    }

    let mut server_name = None;
    if r.remaining() > 0 {
        let exts = r.vec16("extensions")?;
        let mut er = Reader::new(exts, "ClientHello");
        while er.remaining() > 0 {
            let ext_type = er.u16("extension type")?;
            let data = er.vec16("extension data")?;
            if ext_type == EXT_SERVER_NAME {
                server_name = decode_server_name(data)?;
            }
        }
    }
    r.finish()?;

    Ok(ClientHello {
        version,
        random,
        session_id: session_id.to_vec(),
        cipher_suites,
        compression_methods,
        server_name,
    })
}

fn decode_server_name(data: &[u8]) -> Result<Option<String>, TlsError> {
    let mut r = Reader::new(data, "ClientHello");
    let list = r.vec16("server name list")?;
    r.finish()?;

    let mut lr = Reader::new(list, "ClientHello");
    let mut host = None;
    while lr.remaining() > 0 {
        let name_type = lr.u8("server name type")?;
        let name = lr.vec16("server name")?;
        if name_type == SNI_HOST_NAME && host.is_none() {
            let name = std::str::from_utf8(name)
                .map_err(|_| lr.err("server name is not UTF-8"))?;
            host = Some(name.to_string());
        }
    }
    Ok(host)
}

/// Decode an SSLv2-framed CLIENT-HELLO. `msg` starts at the message type
/// byte, after the 2-byte record header.
///
/// Only the SSLv3-compatible cipher specs (first byte zero) are kept, and
/// the challenge becomes the right-aligned client random.
pub fn decode_v2_client_hello(msg: &[u8]) -> Result<ClientHello, TlsError> {
    let mut r = Reader::new(msg, "ClientHello (SSLv2)");
    if r.u8("message type")? != SSL2_MT_CLIENT_HELLO {
        return Err(r.err("not a CLIENT-HELLO"));
    }
    let mut version = [0u8; 2];
    version.copy_from_slice(r.bytes(2, "version")?);
    let specs_len = r.u16("cipher specs length")? as usize;
    let sid_len = r.u16("session id length")? as usize;
    let challenge_len = r.u16("challenge length")? as usize;
    if specs_len == 0 || specs_len % 3 != 0 {
        return Err(r.err("bad cipher spec list length"));
    }
    if sid_len > 32 {
        return Err(r.err("session id longer than 32 bytes"));
    }
    if !(16..=32).contains(&challenge_len) {
        return Err(r.err("challenge length outside 16..=32"));
    }
    let specs = r.bytes(specs_len, "cipher specs")?;
    let session_id = r.bytes(sid_len, "session id")?.to_vec();
    let challenge = r.bytes(challenge_len, "challenge")?;
    r.finish()?;

    let cipher_suites: Vec<CipherSuite> = specs
        .chunks_exact(3)
        .filter(|s| s[0] == 0)
        .map(|s| CipherSuite(u16::from_be_bytes([s[1], s[2]])))
        .collect();
    let mut random = [0u8; 32];
    random[32 - challenge_len..].copy_from_slice(challenge);

    Ok(ClientHello {
        version,
        random,
        session_id,
        cipher_suites,
        compression_methods: vec![0],
        server_name: None,
    })
}

/// Encode a ServerHello as a complete handshake message.
pub fn encode_server_hello(sh: &ServerHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(70 + sh.session_id.len());
    body.extend_from_slice(&sh.version.wire());
    body.extend_from_slice(&sh.random);
    body.push(sh.session_id.len() as u8);
    body.extend_from_slice(&sh.session_id);
    body.extend_from_slice(&sh.cipher_suite.0.to_be_bytes());
    body.push(sh.compression_method);
    wrap_handshake(HandshakeType::ServerHello, &body)
}

/// Decode a ServerHello body. A trailing extensions block is skipped.
pub fn decode_server_hello(body: &[u8]) -> Result<ServerHello, TlsError> {
    let mut r = Reader::new(body, "ServerHello");
    let major = r.u8("version")?;
    let minor = r.u8("version")?;
    if major != TlsVersion::MAJOR {
        return Err(TlsError::UnsupportedVersion);
    }
    let version = TlsVersion::from_minor(minor).ok_or(TlsError::UnsupportedVersion)?;
    let random = r.array32("random")?;
    let session_id = r.vec8("session id")?;
    if session_id.len() > 32 {
        return Err(r.err("session id longer than 32 bytes"));
    }
    let cipher_suite = CipherSuite(r.u16("cipher suite")?);
    let compression_method = r.u8("compression method")?;
    if r.remaining() > 0 {
        r.vec16("extensions")?;
    }
    r.finish()?;

    Ok(ServerHello {
        version,
        random,
        session_id: session_id.to_vec(),
        cipher_suite,
        compression_method,
    })
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

/// Encode a Certificate message from DER certificates, leaf first.
pub fn encode_certificate(chain: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = chain.iter().map(|c| 3 + c.len()).sum();
    let mut body = Vec::with_capacity(3 + total);
    push_u24(&mut body, total);
    for cert in chain {
        push_u24(&mut body, cert.len());
        body.extend_from_slice(cert);
    }
    wrap_handshake(HandshakeType::Certificate, &body)
}

/// Decode a Certificate body into DER certificates. The list may be empty.
pub fn decode_certificate(body: &[u8]) -> Result<Vec<Vec<u8>>, TlsError> {
    let mut r = Reader::new(body, "Certificate");
    let list = r.vec24("certificate list")?;
    r.finish()?;

    let mut lr = Reader::new(list, "Certificate");
    let mut chain = Vec::new();
    while lr.remaining() > 0 {
        let cert = lr.vec24("certificate")?;
        if cert.is_empty() {
            return Err(lr.err("empty certificate entry"));
        }
        chain.push(cert.to_vec());
    }
    Ok(chain)
}

pub fn encode_certificate_request(cr: &CertificateRequest) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(cr.certificate_types.len() as u8);
    body.extend_from_slice(&cr.certificate_types);
    let names_len: usize = cr.ca_names.iter().map(|n| 2 + n.len()).sum();
    body.extend_from_slice(&(names_len as u16).to_be_bytes());
    for name in &cr.ca_names {
        push_vec16(&mut body, name);
    }
    wrap_handshake(HandshakeType::CertificateRequest, &body)
}

pub fn decode_certificate_request(body: &[u8]) -> Result<CertificateRequest, TlsError> {
    let mut r = Reader::new(body, "CertificateRequest");
    let certificate_types = r.vec8("certificate types")?.to_vec();
    if certificate_types.is_empty() {
        return Err(r.err("no certificate types"));
    }
    let names = r.vec16("certificate authorities")?;
    r.finish()?;

    let mut nr = Reader::new(names, "CertificateRequest");
    let mut ca_names = Vec::new();
    while nr.remaining() > 0 {
        ca_names.push(nr.vec16("distinguished name")?.to_vec());
    }
    Ok(CertificateRequest {
        certificate_types,
        ca_names,
    })
}

// ---------------------------------------------------------------------------
// Key exchange
// ---------------------------------------------------------------------------

/// `MD5(client_random || server_random || params) || SHA1(...)`, the
/// 36 bytes the ServerKeyExchange signature covers.
pub fn ske_signed_hash(
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    params: &[u8],
) -> [u8; 36] {
    let mut md5 = Md5::new();
    let mut sha1 = Sha1::new();
    for part in [&client_random[..], &server_random[..], params] {
        md5.update(part);
        sha1.update(part);
    }
    let mut out = [0u8; 36];
    out[..16].copy_from_slice(&md5.finalize());
    out[16..].copy_from_slice(&sha1.finalize());
    out
}

pub fn encode_server_key_exchange(ske: &ServerKeyExchange) -> Vec<u8> {
    let mut body = Vec::with_capacity(ske.params.len() + 2 + ske.signature.len());
    body.extend_from_slice(&ske.params);
    push_vec16(&mut body, &ske.signature);
    wrap_handshake(HandshakeType::ServerKeyExchange, &body)
}

/// Split a DHE ServerKeyExchange body into the raw parameters and the
/// signature. The parameters themselves are validated by the DHM context.
pub fn decode_server_key_exchange(body: &[u8]) -> Result<ServerKeyExchange, TlsError> {
    let mut r = Reader::new(body, "ServerKeyExchange");
    for what in ["dh_p", "dh_g", "dh_Ys"] {
        if r.vec16(what)?.is_empty() {
            return Err(r.err(format!("empty {what}")));
        }
    }
    let params_len = r.pos;
    let signature = r.vec16("signature")?.to_vec();
    r.finish()?;
    Ok(ServerKeyExchange {
        params: body[..params_len].to_vec(),
        signature,
    })
}

pub fn encode_server_hello_done() -> Vec<u8> {
    wrap_handshake(HandshakeType::ServerHelloDone, &[])
}

pub fn decode_server_hello_done(body: &[u8]) -> Result<(), TlsError> {
    Reader::new(body, "ServerHelloDone").finish()
}

/// RSA ClientKeyExchange: TLS prefixes the ciphertext with its length,
/// SSLv3 sends it bare.
pub fn encode_client_key_exchange_rsa(version: TlsVersion, encrypted: &[u8]) -> Vec<u8> {
    let body = match version {
        TlsVersion::Ssl3 => encrypted.to_vec(),
        TlsVersion::Tls10 => {
            let mut b = Vec::with_capacity(2 + encrypted.len());
            push_vec16(&mut b, encrypted);
            b
        }
    };
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

pub fn decode_client_key_exchange_rsa(
    version: TlsVersion,
    body: &[u8],
) -> Result<Vec<u8>, TlsError> {
    let mut r = Reader::new(body, "ClientKeyExchange");
    let encrypted = match version {
        TlsVersion::Ssl3 => r.rest(),
        TlsVersion::Tls10 => r.vec16("encrypted premaster")?,
    };
    r.finish()?;
    if encrypted.is_empty() {
        return Err(r.err("empty encrypted premaster"));
    }
    Ok(encrypted.to_vec())
}

/// DHE ClientKeyExchange: `dh_Yc` with a 2-byte length in both versions.
pub fn encode_client_key_exchange_dhe(public: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + public.len());
    push_vec16(&mut body, public);
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

pub fn decode_client_key_exchange_dhe(body: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = Reader::new(body, "ClientKeyExchange");
    let public = r.vec16("dh_Yc")?;
    r.finish()?;
    if public.is_empty() {
        return Err(r.err("empty dh_Yc"));
    }
    Ok(public.to_vec())
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

pub fn encode_certificate_verify(signature: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + signature.len());
    push_vec16(&mut body, signature);
    wrap_handshake(HandshakeType::CertificateVerify, &body)
}

pub fn decode_certificate_verify(body: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = Reader::new(body, "CertificateVerify");
    let sig = r.vec16("signature")?;
    r.finish()?;
    Ok(sig.to_vec())
}

pub fn encode_finished(verify_data: &[u8]) -> Vec<u8> {
    wrap_handshake(HandshakeType::Finished, verify_data)
}

/// The Finished body is the bare verify_data; its length depends on the
/// version.
pub fn decode_finished(body: &[u8], expected_len: usize) -> Result<&[u8], TlsError> {
    if body.len() != expected_len {
        return Err(TlsError::BadHandshakeMessage {
            state: "Finished",
            reason: format!("verify_data is {} bytes, expected {expected_len}", body.len()),
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(msg: &[u8]) -> &[u8] {
        parse_handshake_header(msg).unwrap().1
    }

    fn sample_hello() -> ClientHello {
        ClientHello {
            version: [3, 1],
            random: [0x5a; 32],
            session_id: vec![7; 32],
            cipher_suites: vec![
                CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
                CipherSuite::TLS_RSA_WITH_RC4_128_MD5,
            ],
            compression_methods: vec![0],
            server_name: Some("localhost".into()),
        }
    }

    #[test]
    fn test_handshake_header() {
        let msg = wrap_handshake(HandshakeType::Finished, &[1, 2, 3]);
        assert_eq!(msg, vec![20, 0, 0, 3, 1, 2, 3]);
        let (ty, body) = parse_handshake_header(&msg).unwrap();
        assert_eq!(ty, HandshakeType::Finished);
        assert_eq!(body, &[1, 2, 3]);

        assert!(parse_handshake_header(&[20, 0, 0, 4, 1, 2, 3]).is_err());
        assert!(parse_handshake_header(&[20, 0, 0, 2, 1, 2, 3]).is_err());
        assert!(parse_handshake_header(&[99, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_client_hello_layout() {
        let msg = encode_client_hello(&sample_hello());
        let body = body_of(&msg);
        assert_eq!(&body[..2], &[3, 1]);
        assert_eq!(body[34], 32);
        // suites at 67: length 4, then 0x002F, 0x0004
        assert_eq!(&body[67..73], &[0, 4, 0, 0x2f, 0, 4]);
        assert_eq!(&body[73..75], &[1, 0]);
        // extensions: total, type 0, ext len, list len, host_name, name len
        let name_len = "localhost".len() as u8;
        assert_eq!(
            &body[75..84],
            &[0, name_len + 9, 0, 0, 0, name_len + 5, 0, name_len + 3, 0]
        );
        assert_eq!(decode_client_hello(body).unwrap(), sample_hello());
    }

    #[test]
    fn test_client_hello_without_extensions() {
        let mut ch = sample_hello();
        ch.server_name = None;
        ch.session_id.clear();
        let msg = encode_client_hello(&ch);
        assert_eq!(decode_client_hello(body_of(&msg)).unwrap(), ch);
    }

    #[test]
    fn test_client_hello_rejects_malformed() {
        let mut ch = sample_hello();
        ch.compression_methods = vec![1];
        let msg = encode_client_hello(&ch);
        assert!(matches!(
            decode_client_hello(body_of(&msg)),
            Err(TlsError::BadHandshakeMessage { state: "ClientHello", .. })
        ));

        let msg = encode_client_hello(&sample_hello());
        let body = body_of(&msg);
        for cut in [10, 40, 70, body.len() - 1] {
            assert!(decode_client_hello(&body[..cut]).is_err(), "cut at {cut}");
        }

        let mut odd = body.to_vec();
        odd[68] = 3;
        assert!(decode_client_hello(&odd).is_err());
    }

    #[test]
    fn test_client_hello_skips_unknown_extensions() {
        let mut ch = sample_hello();
        ch.server_name = None;
        let mut body = body_of(&encode_client_hello(&ch)).to_vec();
        // one unknown extension (type 0xff01, 1 byte of data)
        body.extend_from_slice(&[0, 5, 0xff, 0x01, 0, 1, 0]);
        let parsed = decode_client_hello(&body).unwrap();
        assert_eq!(parsed.server_name, None);
        assert_eq!(parsed.cipher_suites.len(), 2);

        // an extension claiming more data than present
        body.truncate(body.len() - 7);
        body.extend_from_slice(&[0, 4, 0xff, 0x01, 0, 9]);
        assert!(decode_client_hello(&body).is_err());
    }

    #[test]
    fn test_v2_client_hello() {
        // SSLv2 CLIENT-HELLO offering one v2-only spec and two v3 suites
        let mut msg = vec![1, 3, 1];
        msg.extend_from_slice(&9u16.to_be_bytes());
        msg.extend_from_slice(&0u16.to_be_bytes());
        msg.extend_from_slice(&16u16.to_be_bytes());
        msg.extend_from_slice(&[0x01, 0x00, 0x80, 0x00, 0x00, 0x2f, 0x00, 0x00, 0x0a]);
        msg.extend_from_slice(&[0xc3; 16]);

        let ch = decode_v2_client_hello(&msg).unwrap();
        assert_eq!(ch.version, [3, 1]);
        assert_eq!(
            ch.cipher_suites,
            vec![
                CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
                CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA
            ]
        );
        assert!(ch.session_id.is_empty());
        assert_eq!(&ch.random[..16], &[0; 16]);
        assert_eq!(&ch.random[16..], &[0xc3; 16]);

        let mut bad = msg.clone();
        bad[0] = 4;
        assert!(decode_v2_client_hello(&bad).is_err());
        assert!(decode_v2_client_hello(&msg[..msg.len() - 1]).is_err());
    }

    #[test]
    fn test_server_hello_roundtrip_and_version() {
        let sh = ServerHello {
            version: TlsVersion::Ssl3,
            random: [9; 32],
            session_id: vec![1; 32],
            cipher_suite: CipherSuite::TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
            compression_method: 0,
        };
        let msg = encode_server_hello(&sh);
        assert_eq!(decode_server_hello(body_of(&msg)).unwrap(), sh);

        let mut body = body_of(&msg).to_vec();
        body[1] = 2;
        assert!(matches!(
            decode_server_hello(&body),
            Err(TlsError::UnsupportedVersion)
        ));
        body[0] = 2;
        body[1] = 0;
        assert!(matches!(
            decode_server_hello(&body),
            Err(TlsError::UnsupportedVersion)
        ));
    }

    #[test]
    fn test_certificate_list() {
        let chain = vec![vec![0x30, 1, 2], vec![0x30; 300]];
        let msg = encode_certificate(&chain);
        assert_eq!(&msg[4..7], &[0, 1, 0x35]);
        assert_eq!(decode_certificate(body_of(&msg)).unwrap(), chain);

        let empty = encode_certificate(&[]);
        assert_eq!(body_of(&empty), &[0, 0, 0]);
        assert!(decode_certificate(body_of(&empty)).unwrap().is_empty());

        // inner length overruns the list
        assert!(decode_certificate(&[0, 0, 4, 0, 0, 5, 1]).is_err());
    }

    #[test]
    fn test_certificate_request() {
        let cr = CertificateRequest {
            certificate_types: vec![CERT_TYPE_RSA_SIGN],
            ca_names: vec![vec![0x30, 0], vec![0x30, 2, 5, 0]],
        };
        let msg = encode_certificate_request(&cr);
        assert_eq!(decode_certificate_request(body_of(&msg)).unwrap(), cr);
        assert!(decode_certificate_request(&[0, 0, 0]).is_err());
    }

    #[test]
    fn test_server_key_exchange_split() {
        let params = [0u8, 2, 0xaa, 0xbb, 0, 1, 2, 0, 1, 7];
        let ske = ServerKeyExchange {
            params: params.to_vec(),
            signature: vec![0x55; 64],
        };
        let msg = encode_server_key_exchange(&ske);
        assert_eq!(decode_server_key_exchange(body_of(&msg)).unwrap(), ske);

        // missing signature
        assert!(decode_server_key_exchange(&params).is_err());
        // empty generator
        assert!(decode_server_key_exchange(&[0, 1, 5, 0, 0, 0, 1, 1, 0, 0]).is_err());
    }

    #[test]
    fn test_ske_signed_hash() {
        let h = ske_signed_hash(&[1; 32], &[2; 32], b"params");
        let mut data = vec![1u8; 32];
        data.extend_from_slice(&[2; 32]);
        data.extend_from_slice(b"params");
        assert_eq!(&h[..16], Md5::digest(&data).as_slice());
        assert_eq!(&h[16..], Sha1::digest(&data).as_slice());
    }

    #[test]
    fn test_client_key_exchange_framing() {
        let ct = vec![0x42; 128];
        let tls = encode_client_key_exchange_rsa(TlsVersion::Tls10, &ct);
        assert_eq!(&tls[..6], &[16, 0, 0, 130, 0, 128]);
        assert_eq!(
            decode_client_key_exchange_rsa(TlsVersion::Tls10, body_of(&tls)).unwrap(),
            ct
        );

        let ssl3 = encode_client_key_exchange_rsa(TlsVersion::Ssl3, &ct);
        assert_eq!(&ssl3[..4], &[16, 0, 0, 128]);
        assert_eq!(
            decode_client_key_exchange_rsa(TlsVersion::Ssl3, body_of(&ssl3)).unwrap(),
            ct
        );
        assert!(decode_client_key_exchange_rsa(TlsVersion::Tls10, body_of(&ssl3)).is_err());

        let dhe = encode_client_key_exchange_dhe(&[3; 128]);
        assert_eq!(decode_client_key_exchange_dhe(body_of(&dhe)).unwrap(), vec![3; 128]);
        assert!(decode_client_key_exchange_dhe(&[0, 0]).is_err());
    }

    #[test]
    fn test_finished_and_verify() {
        let msg = encode_finished(&[0xab; 12]);
        assert_eq!(decode_finished(body_of(&msg), 12).unwrap(), &[0xab; 12]);
        assert!(matches!(
            decode_finished(body_of(&msg), 36),
            Err(TlsError::BadHandshakeMessage { state: "Finished", .. })
        ));

        let cv = encode_certificate_verify(&[1; 256]);
        assert_eq!(decode_certificate_verify(body_of(&cv)).unwrap(), vec![1; 256]);

        assert_eq!(encode_server_hello_done(), vec![14, 0, 0, 0]);
        assert!(decode_server_hello_done(&[]).is_ok());
        assert!(decode_server_hello_done(&[0]).is_err());
        assert_eq!(encode_hello_request(), vec![0, 0, 0, 0]);
    }
}
