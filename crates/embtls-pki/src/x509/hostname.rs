//! Host name matching against the subject CN and SAN dNSName entries.

use embtls_utils::oid::known;

use super::Certificate;

/// True if `host` matches any subject Common Name or any SAN dNSName of
/// `cert`. Comparison ignores ASCII case and one trailing dot.
pub fn matches_hostname(cert: &Certificate, host: &str) -> bool {
    let host = host.trim();
    if host.is_empty() {
        return false;
    }
    cert.subject
        .values(known::AT_CN)
        .chain(cert.dns_names.iter().map(String::as_str))
        .any(|pattern| matches_dns(pattern, host))
}

/// Exact match, or `*.rest` where `*` stands for exactly one left-most
/// label and `rest` has at least two labels.
fn matches_dns(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    let Some(suffix) = pattern.strip_prefix("*.") else {
        return !pattern.contains('*') && pattern == host;
    };
    if suffix.contains('*') || suffix.split('.').count() < 2 {
        return false;
    }
    match host.split_once('.') {
        Some((label, rest)) => !label.is_empty() && rest == suffix,
        None => false,
    }
}
