//! TLS server command (`s-server`).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embtls_crypto::dhm::DhmGroup;
use embtls_pki::load_rsa_private_key;
use embtls_pki::x509::load_certificates;
use embtls_tls::config::DhParams;
use embtls_tls::{AuthMode, InMemorySessionCache, TlsConfig, TlsRole, TlsStream};
use embtls_types::TlsError;
use log::info;

const SESSION_CACHE_SIZE: usize = 64;

pub fn run(
    port: u16,
    cert_path: &str,
    key_path: &str,
    dhe: bool,
    ca_file: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(build_config(cert_path, key_path, dhe, ca_file)?);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener =
        TcpListener::bind(&bind_addr).map_err(|e| format!("cannot bind to '{bind_addr}': {e}"))?;
    eprintln!("Listening on {bind_addr}");
    eprintln!("Press Ctrl+C to stop.");

    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Accept error: {e}");
                continue;
            }
        };
        if let Ok(addr) = stream.peer_addr() {
            info!("accepted connection from {addr}");
        }
        if let Err(e) = serve(stream, Arc::clone(&config)) {
            eprintln!("Connection error: {e}");
        }
        eprintln!("Connection closed.");
    }
    Ok(())
}

fn build_config(
    cert_path: &str,
    key_path: &str,
    dhe: bool,
    ca_file: Option<&str>,
) -> Result<TlsConfig, Box<dyn std::error::Error>> {
    let certs = load_certificates(cert_path)
        .map_err(|e| format!("cannot load certificate file '{cert_path}': {e}"))?;
    let chain: Vec<Vec<u8>> = certs.iter().map(|c| c.raw.clone()).collect();
    let key = load_rsa_private_key(key_path)
        .map_err(|e| format!("cannot load private key '{key_path}': {e}"))?;
    if key.public_key() != &certs[0].public_key {
        return Err("private key does not match the certificate".into());
    }

    let cache = Arc::new(Mutex::new(InMemorySessionCache::new(SESSION_CACHE_SIZE)));
    let mut builder = TlsConfig::builder()
        .role(TlsRole::Server)
        .certificate_chain(chain)
        .private_key(key)
        .session_cache(cache);
    if dhe {
        builder = builder.dh_params(DhParams::from_group(DhmGroup::Rfc3526_2048)?);
    }
    builder = match ca_file {
        Some(path) => {
            let trusted = load_certificates(path)
                .map_err(|e| format!("cannot load CA file '{path}': {e}"))?;
            builder.auth_mode(AuthMode::Required).trusted_certs(trusted)
        }
        None => builder.auth_mode(AuthMode::None),
    };
    Ok(builder.build())
}

fn serve(stream: TcpStream, config: Arc<TlsConfig>) -> Result<(), Box<dyn std::error::Error>> {
    stream.set_read_timeout(Some(Duration::from_secs(30)))?;
    stream.set_write_timeout(Some(Duration::from_secs(30)))?;
    let mut conn = TlsStream::new(stream, config);
    echo(&mut conn)
}

/// Handshake, then send back whatever the client writes until it closes.
fn echo<S: Read + Write>(conn: &mut TlsStream<S>) -> Result<(), Box<dyn std::error::Error>> {
    conn.handshake()?;
    if let (Some(version), Some(suite)) = (conn.version(), conn.cipher_suite()) {
        let resumed = if conn.is_resumed() { " (resumed)" } else { "" };
        eprintln!("  {version} {suite}{resumed}");
    }
    if let Some(name) = conn.server_name() {
        eprintln!("  SNI: {name}");
    }

    let mut buf = vec![0u8; 16384];
    loop {
        match conn.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                eprint!("< {}", String::from_utf8_lossy(&buf[..n]));
                conn.write(&buf[..n])?;
            }
            Err(TlsError::ConnectionClosed) | Err(TlsError::AlertReceived(_)) => break,
            Err(TlsError::IoError(ref e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    let _ = conn.shutdown();
    Ok(())
}
