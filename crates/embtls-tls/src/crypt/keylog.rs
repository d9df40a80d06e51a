//! NSS key log lines (SSLKEYLOGFILE) for SSLv3 and TLS 1.0.
//!
//! Both versions have a single secret per connection, so the only label
//! emitted is `CLIENT_RANDOM <client_random_hex> <master_secret_hex>`.

use std::fmt::Write;

use crate::config::TlsConfig;

const LABEL: &str = "CLIENT_RANDOM";

fn key_log_line(client_random: &[u8; 32], master_secret: &[u8]) -> String {
    let mut line = String::with_capacity(LABEL.len() + 2 + 2 * (32 + master_secret.len()));
    line.push_str(LABEL);
    for part in [&client_random[..], master_secret] {
        line.push(' ');
        for b in part {
            // writing into a String cannot fail
            let _ = write!(line, "{b:02x}");
        }
    }
    line
}

/// Pass the connection's master secret to the configured key log callback.
/// Does nothing unless one is set.
pub fn log_master_secret(config: &TlsConfig, client_random: &[u8; 32], master_secret: &[u8]) {
    if let Some(cb) = &config.key_log_callback {
        cb(&key_log_line(client_random, master_secret));
    }
}
