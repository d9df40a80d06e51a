//! Integration tests for embtls.
//! Cross-crate roundtrip tests and TCP loopback handshakes.

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use embtls_crypto::dhm::{DhmContext, DhmGroup};
    use embtls_crypto::OsRandom;
    use embtls_pki::x509::{parse_certificates, verify};
    use embtls_pki::{parse_rsa_private_key, Certificate};
    use embtls_tls::config::DhParams;
    use embtls_tls::{
        AuthMode, CipherSuite, InMemorySessionCache, TlsConfig, TlsRole, TlsStream, TlsVersion,
    };
    use embtls_types::{HashAlgId, PkiError, TlsError, VerifyFlags};

    macro_rules! fixture {
        ($name:literal) => {
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/", $name))
        };
    }

    fn certs(pem: &str) -> Vec<Certificate> {
        parse_certificates(pem.as_bytes()).unwrap().0
    }

    fn server_config() -> TlsConfig {
        server_builder().build()
    }

    fn server_builder() -> embtls_tls::config::TlsConfigBuilder {
        let chain = vec![
            certs(fixture!("srv.pem"))[0].raw.clone(),
            certs(fixture!("int.pem"))[0].raw.clone(),
        ];
        TlsConfig::builder()
            .role(TlsRole::Server)
            .auth_mode(AuthMode::None)
            .certificate_chain(chain)
            .private_key(parse_rsa_private_key(fixture!("srv.key").as_bytes()).unwrap())
    }

    fn client_builder() -> embtls_tls::config::TlsConfigBuilder {
        TlsConfig::builder()
            .role(TlsRole::Client)
            .auth_mode(AuthMode::Required)
            .trusted_certs(certs(fixture!("root.pem")))
            .server_name("localhost")
    }

    fn set_timeouts(stream: &TcpStream) {
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        stream
            .set_write_timeout(Some(Duration::from_secs(10)))
            .unwrap();
    }

    fn connect(addr: std::net::SocketAddr, config: TlsConfig) -> TlsStream<TcpStream> {
        let stream = TcpStream::connect_timeout(&addr, Duration::from_secs(5)).unwrap();
        set_timeouts(&stream);
        TlsStream::new(stream, Arc::new(config))
    }

    /// Accept one connection, read one message, answer with `reply`.
    fn spawn_server(
        config: Arc<TlsConfig>,
        expect: &'static [u8],
        reply: &'static [u8],
    ) -> (std::net::SocketAddr, thread::JoinHandle<Result<(), TlsError>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            set_timeouts(&stream);
            let mut conn = TlsStream::new(stream, config);
            conn.handshake()?;
            let mut buf = [0u8; 256];
            let n = conn.read(&mut buf)?;
            assert_eq!(&buf[..n], expect);
            conn.write(reply)?;
            conn.shutdown()
        });
        (addr, handle)
    }

    // -------------------------------------------------------
    // 1. X.509 chain from PEM verifies against the root
    // -------------------------------------------------------
    #[test]
    fn test_x509_parse_and_verify_chain() {
        let mut chain = certs(fixture!("srv.pem"));
        chain.extend(certs(fixture!("int.pem")));
        let root = certs(fixture!("root.pem"));

        assert_eq!(chain[0].subject.common_name(), Some("localhost"));
        assert_eq!(chain[0].issuer_raw, chain[1].subject_raw);
        verify(&chain, &root, Some("localhost")).unwrap();
        verify(&chain, &root, Some("www.example.test")).unwrap();

        match verify(&chain[..1], &root, Some("localhost")) {
            Err(PkiError::VerifyFailed(flags)) => assert_eq!(flags, VerifyFlags::NOT_TRUSTED),
            other => panic!("expected NOT_TRUSTED, got {other:?}"),
        }
    }

    // -------------------------------------------------------
    // 2. Certificate public key and key file interoperate
    // -------------------------------------------------------
    #[test]
    fn test_rsa_certificate_key_pair_roundtrip() {
        let cert = &certs(fixture!("srv.pem"))[0];
        let key = parse_rsa_private_key(fixture!("srv.key").as_bytes()).unwrap();
        assert_eq!(cert.public_key.bits(), 2048);

        let premaster = [0x03u8; 48];
        let ct = cert.public_key.encrypt_pkcs1(&OsRandom, &premaster).unwrap();
        assert_eq!(key.decrypt_pkcs1(&OsRandom, &ct).unwrap(), premaster.to_vec());

        let hashed = embtls_crypto::hash::digest(HashAlgId::Sha1, b"signed by the key file");
        let sig = key.sign_pkcs1(&OsRandom, Some(HashAlgId::Sha1), &hashed).unwrap();
        cert.public_key
            .verify_pkcs1(Some(HashAlgId::Sha1), &hashed, &sig)
            .unwrap();
    }

    // -------------------------------------------------------
    // 3. DHM: both sides agree through the wire form
    // -------------------------------------------------------
    #[test]
    fn test_dhm_exchange_via_wire_params() {
        let mut server = DhmContext::from_group(DhmGroup::Rfc3526_2048).unwrap();
        let params = server.make_params(&OsRandom).unwrap();

        let (mut client, consumed) = DhmContext::read_params(&params).unwrap();
        assert_eq!(consumed, params.len());
        assert_eq!(client.len(), 256);
        let gy = client.make_public(&OsRandom).unwrap();
        server.read_public(&gy).unwrap();

        assert_eq!(
            &*server.calc_secret().unwrap(),
            &*client.calc_secret().unwrap()
        );
    }

    // -------------------------------------------------------
    // 4. TCP loopback: RSA AES-128, 2048-bit certificate
    // -------------------------------------------------------
    #[test]
    fn test_tcp_rsa_aes128_loopback() {
        let suites = [CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA];
        let server = Arc::new(server_builder().cipher_suites(&suites).build());
        let (addr, handle) = spawn_server(server, b"hello", b"hello back");

        let mut conn = connect(addr, client_builder().cipher_suites(&suites).build());
        conn.handshake().unwrap();
        assert_eq!(conn.version(), Some(TlsVersion::Tls10));
        assert_eq!(conn.cipher_suite(), Some(suites[0]));
        assert_eq!(conn.verify_result(), Some(VerifyFlags::empty()));
        assert_eq!(conn.peer_certificates().len(), 2);

        conn.write(b"hello").unwrap();
        let mut buf = [0u8; 256];
        let n = conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello back");
        conn.shutdown().unwrap();
        handle.join().unwrap().unwrap();
    }

    // -------------------------------------------------------
    // 5. TCP loopback: DHE-RSA AES-256
    // -------------------------------------------------------
    #[test]
    fn test_tcp_dhe_rsa_loopback() {
        let suites = [CipherSuite::TLS_DHE_RSA_WITH_AES_256_CBC_SHA];
        let server = Arc::new(
            server_builder()
                .cipher_suites(&suites)
                .dh_params(DhParams::from_group(DhmGroup::Rfc2409_1024).unwrap())
                .build(),
        );
        let (addr, handle) = spawn_server(server, b"DHE over TCP", b"DHE confirmed");

        let mut conn = connect(addr, client_builder().build());
        conn.handshake().unwrap();
        assert_eq!(conn.cipher_suite(), Some(suites[0]));

        conn.write(b"DHE over TCP").unwrap();
        let mut buf = [0u8; 256];
        let n = conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"DHE confirmed");
        conn.shutdown().unwrap();
        handle.join().unwrap().unwrap();
    }

    // -------------------------------------------------------
    // 6. TCP loopback: SSLv3 3DES
    // -------------------------------------------------------
    #[test]
    fn test_tcp_ssl3_3des_loopback() {
        let suites = [CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA];
        let server = Arc::new(
            server_builder()
                .cipher_suites(&suites)
                .max_version(TlsVersion::Ssl3)
                .build(),
        );
        let (addr, handle) = spawn_server(server, b"SSLv3 over TCP", b"SSLv3 confirmed");

        let mut conn = connect(addr, client_builder().cipher_suites(&suites).build());
        conn.handshake().unwrap();
        assert_eq!(conn.version(), Some(TlsVersion::Ssl3));

        conn.write(b"SSLv3 over TCP").unwrap();
        let mut buf = [0u8; 256];
        let n = conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"SSLv3 confirmed");
        conn.shutdown().unwrap();
        handle.join().unwrap().unwrap();
    }

    // -------------------------------------------------------
    // 7. TCP loopback: session-id resumption
    // -------------------------------------------------------
    #[test]
    fn test_tcp_session_resumption_loopback() {
        let cache = Arc::new(Mutex::new(InMemorySessionCache::new(8)));
        let server = Arc::new(server_builder().session_cache(cache).build());

        let (addr, handle) = spawn_server(Arc::clone(&server), b"full", b"full ok");
        let mut conn = connect(addr, client_builder().build());
        conn.write(b"full").unwrap();
        let mut buf = [0u8; 256];
        let n = conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"full ok");
        assert!(!conn.is_resumed());
        let session = conn.session().cloned().unwrap();
        conn.shutdown().unwrap();
        handle.join().unwrap().unwrap();

        let (addr2, handle2) = spawn_server(server, b"resumed", b"resumed ok");
        let mut conn2 = connect(addr2, client_builder().resumption_session(session.clone()).build());
        conn2.handshake().unwrap();
        assert!(conn2.is_resumed());
        assert_eq!(conn2.session().map(|s| s.id.clone()), Some(session.id.clone()));
        assert_eq!(conn2.peer_certificates().len(), 2);

        conn2.write(b"resumed").unwrap();
        let n = conn2.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"resumed ok");
        conn2.shutdown().unwrap();
        handle2.join().unwrap().unwrap();
    }

    // -------------------------------------------------------
    // 8. TCP loopback: mutual authentication
    // -------------------------------------------------------
    #[test]
    fn test_tcp_client_auth_loopback() {
        let server = Arc::new(
            server_builder()
                .auth_mode(AuthMode::Required)
                .trusted_certs(certs(fixture!("root.pem")))
                .build(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            set_timeouts(&stream);
            let mut conn = TlsStream::new(stream, server);
            conn.handshake().unwrap();
            let subject = conn.peer_certificates()[0].subject.common_name().map(String::from);
            let mut buf = [0u8; 256];
            let n = conn.read(&mut buf).unwrap();
            conn.write(&buf[..n]).unwrap();
            conn.shutdown().unwrap();
            subject
        });

        let client_chain = vec![
            certs(fixture!("client.pem"))[0].raw.clone(),
            certs(fixture!("int.pem"))[0].raw.clone(),
        ];
        let client = client_builder()
            .certificate_chain(client_chain)
            .private_key(parse_rsa_private_key(fixture!("client.key").as_bytes()).unwrap())
            .build();
        let mut conn = connect(addr, client);
        conn.write(b"mutual").unwrap();
        let mut buf = [0u8; 256];
        let n = conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"mutual");
        conn.shutdown().unwrap();

        assert_eq!(handle.join().unwrap().as_deref(), Some("emtls Client"));
    }

    // -------------------------------------------------------
    // 9. TCP loopback: payload spanning many records
    // -------------------------------------------------------
    #[test]
    fn test_tcp_large_payload_loopback() {
        const TOTAL: usize = 100_000;
        let server = Arc::new(
            server_builder()
                .cipher_suites(&[CipherSuite::TLS_RSA_WITH_CAMELLIA_256_CBC_SHA])
                .build(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            set_timeouts(&stream);
            let mut conn = TlsStream::new(stream, server);
            let mut received = Vec::with_capacity(TOTAL);
            let mut buf = vec![0u8; 16384];
            while received.len() < TOTAL {
                let n = conn.read(&mut buf).unwrap();
                assert!(n > 0);
                received.extend_from_slice(&buf[..n]);
            }
            conn.write(&received).unwrap();
            conn.shutdown().unwrap();
        });

        let payload: Vec<u8> = (0..TOTAL).map(|i| (i % 251) as u8).collect();
        let mut conn = connect(addr, client_builder().build());
        conn.write(&payload).unwrap();

        let mut echoed = Vec::with_capacity(TOTAL);
        let mut buf = vec![0u8; 16384];
        while echoed.len() < TOTAL {
            let n = conn.read(&mut buf).unwrap();
            assert!(n > 0);
            echoed.extend_from_slice(&buf[..n]);
        }
        assert_eq!(echoed, payload);
        // the server's close_notify follows the data
        assert_eq!(conn.read(&mut buf).unwrap(), 0);
        handle.join().unwrap();
    }

    // -------------------------------------------------------
    // 10. TCP loopback: untrusted server is refused on both ends
    // -------------------------------------------------------
    #[test]
    fn test_tcp_untrusted_server_loopback() {
        let (addr, handle) = spawn_server(Arc::new(server_config()), b"", b"");
        let client = TlsConfig::builder()
            .role(TlsRole::Client)
            .auth_mode(AuthMode::Required)
            .trusted_certs(certs(fixture!("small.pem")))
            .build();
        let mut conn = connect(addr, client);

        match conn.handshake() {
            Err(TlsError::PeerCertificate(flags)) => {
                assert!(flags.contains(VerifyFlags::NOT_TRUSTED))
            }
            other => panic!("expected PeerCertificate, got {other:?}"),
        }
        match handle.join().unwrap() {
            Err(TlsError::AlertReceived(desc)) => assert_eq!(desc, "bad_certificate"),
            other => panic!("expected bad_certificate alert, got {other:?}"),
        }
    }
}
