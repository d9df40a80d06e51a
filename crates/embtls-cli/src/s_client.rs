//! TLS client command (`s-client`).

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use embtls_pki::x509::load_certificates;
use embtls_tls::{AuthMode, CipherSuite, TlsConfig, TlsRole, TlsStream, TlsVersion};
use embtls_types::TlsError;
use log::debug;

pub fn run(
    connect: &str,
    ca_file: Option<&str>,
    suites: &[String],
    version: &str,
    http: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (host, addr) = parse_connect(connect)?;
    let max_version = parse_version(version)?;

    let mut builder = TlsConfig::builder()
        .role(TlsRole::Client)
        .min_version(TlsVersion::Ssl3)
        .max_version(max_version)
        .server_name(&host);
    if !suites.is_empty() {
        builder = builder.cipher_suites(&parse_suites(suites)?);
    }
    builder = match ca_file {
        Some(path) => {
            let trusted = load_certificates(path)
                .map_err(|e| format!("cannot load CA file '{path}': {e}"))?;
            builder.auth_mode(AuthMode::Required).trusted_certs(trusted)
        }
        None => builder.auth_mode(AuthMode::None),
    };
    let config = Arc::new(builder.build());

    let sock_addr = addr
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve '{addr}': {e}"))?
        .next()
        .ok_or_else(|| format!("no address for '{addr}'"))?;
    debug!("connecting to {sock_addr}");
    let stream = TcpStream::connect_timeout(&sock_addr, Duration::from_secs(10))
        .map_err(|e| format!("cannot connect to '{addr}': {e}"))?;
    stream.set_read_timeout(Some(Duration::from_secs(30)))?;
    stream.set_write_timeout(Some(Duration::from_secs(30)))?;

    let mut conn = TlsStream::new(stream, config);
    conn.handshake()?;
    print_connection_info(&conn);

    if http {
        do_http(&host, &mut conn)?;
    }
    let _ = conn.shutdown();
    eprintln!("Connection closed.");
    Ok(())
}

/// Parse "host:port" or "host" (defaults to port 443).
fn parse_connect(connect: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    if let Some(idx) = connect.rfind(':') {
        let host = &connect[..idx];
        let port = &connect[idx + 1..];
        port.parse::<u16>()
            .map_err(|_| format!("invalid port in '{connect}'"))?;
        Ok((host.to_string(), connect.to_string()))
    } else {
        Ok((connect.to_string(), format!("{connect}:443")))
    }
}

fn parse_version(version: &str) -> Result<TlsVersion, Box<dyn std::error::Error>> {
    match version {
        "ssl3" => Ok(TlsVersion::Ssl3),
        "tls1" | "tls1.0" => Ok(TlsVersion::Tls10),
        other => Err(format!("unsupported version '{other}' (use \"ssl3\" or \"tls1\")").into()),
    }
}

fn parse_suites(names: &[String]) -> Result<Vec<CipherSuite>, Box<dyn std::error::Error>> {
    let mut suites = Vec::with_capacity(names.len());
    for name in names {
        let suite = CipherSuite::from_name(name)
            .ok_or_else(|| format!("unknown cipher suite '{name}'"))?;
        suites.push(suite);
    }
    Ok(suites)
}

fn print_connection_info<S: std::io::Read + std::io::Write>(conn: &TlsStream<S>) {
    eprintln!("--- connection established ---");
    if let Some(version) = conn.version() {
        eprintln!("  Protocol: {version}");
    }
    if let Some(cs) = conn.cipher_suite() {
        eprintln!("  Cipher:   {cs}");
    }
    if let Some(session) = conn.session() {
        let id: String = session.id.iter().map(|b| format!("{b:02x}")).collect();
        eprintln!("  Session:  {id}");
    }
    if let Some(leaf) = conn.peer_certificates().first() {
        eprintln!("  Peer:     {}", leaf.subject);
    }
    match conn.verify_result() {
        Some(flags) => eprintln!("  Verify:   {flags}"),
        None => eprintln!("  Verify:   skipped"),
    }
    eprintln!("------------------------------");
}

fn do_http<S: std::io::Read + std::io::Write>(
    host: &str,
    conn: &mut TlsStream<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = format!("GET / HTTP/1.0\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    conn.write(request.as_bytes())?;

    let mut buf = vec![0u8; 16384];
    loop {
        match conn.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => print!("{}", String::from_utf8_lossy(&buf[..n])),
            Err(TlsError::ConnectionClosed) => break,
            Err(TlsError::IoError(ref e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    println!();
    Ok(())
}
