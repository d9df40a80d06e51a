//! Session state kept for resumption, and the server-side session cache.

use crate::{CipherSuite, TlsVersion};
use std::collections::HashMap;
use zeroize::Zeroize;

/// Session ids offered for resumption must fall in this range.
pub const MIN_RESUMABLE_ID_LEN: usize = 16;
pub const MAX_SESSION_ID_LEN: usize = 32;

/// A negotiated session: enough to resume without a key exchange.
#[derive(Clone)]
pub struct TlsSession {
    pub id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub version: TlsVersion,
    pub master_secret: [u8; 48],
    /// Seconds since the Unix epoch.
    pub created_at: u64,
    /// DER certificates the peer presented, leaf first.
    pub peer_certificates: Vec<Vec<u8>>,
}

impl Drop for TlsSession {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

impl std::fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSession")
            .field("id_len", &self.id.len())
            .field("cipher_suite", &self.cipher_suite)
            .field("version", &self.version)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl TlsSession {
    /// True when more than `timeout_secs` have passed since the session was
    /// created. A zero timeout never expires.
    pub fn is_expired(&self, timeout_secs: u64, now: u64) -> bool {
        timeout_secs != 0 && now.saturating_sub(self.created_at) > timeout_secs
    }

    /// Whether a client may offer this session: the id is long enough to be
    /// a real server-issued id and the session is still fresh.
    pub fn is_resumable(&self, timeout_secs: u64, now: u64) -> bool {
        (MIN_RESUMABLE_ID_LEN..=MAX_SESSION_ID_LEN).contains(&self.id.len())
            && !self.is_expired(timeout_secs, now)
    }
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Server-side session store keyed by session id.
pub trait SessionCache: Send + Sync {
    fn put(&mut self, key: &[u8], session: TlsSession);
    fn get(&self, key: &[u8]) -> Option<&TlsSession>;
    fn remove(&mut self, key: &[u8]);
}

/// A bounded in-memory session cache with a fixed lifetime.
pub struct InMemorySessionCache {
    sessions: HashMap<Vec<u8>, TlsSession>,
    max_size: usize,
    session_lifetime: u64,
}

impl InMemorySessionCache {
    /// A cache of `max_size` entries with a two-hour lifetime.
    pub fn new(max_size: usize) -> Self {
        Self::with_lifetime(max_size, 7200)
    }

    /// Zero `lifetime_secs` keeps sessions until evicted.
    pub fn with_lifetime(max_size: usize, lifetime_secs: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            max_size,
            session_lifetime: lifetime_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired session.
    pub fn cleanup(&mut self) {
        let now = unix_now();
        let lifetime = self.session_lifetime;
        self.sessions.retain(|_, s| !s.is_expired(lifetime, now));
    }
}

impl SessionCache for InMemorySessionCache {
    fn put(&mut self, key: &[u8], session: TlsSession) {
        if self.max_size == 0 {
            return;
        }
        if self.sessions.len() >= self.max_size && !self.sessions.contains_key(key) {
            // Expired slots go first, then the oldest session.
            self.cleanup();
            if self.sessions.len() >= self.max_size {
                let oldest = self
                    .sessions
                    .iter()
                    .min_by_key(|(_, s)| s.created_at)
                    .map(|(id, _)| id.clone());
                if let Some(id) = oldest {
                    self.sessions.remove(&id);
                }
            }
        }
        self.sessions.insert(key.to_vec(), session);
    }

    fn get(&self, key: &[u8]) -> Option<&TlsSession> {
        let session = self.sessions.get(key)?;
        if session.is_expired(self.session_lifetime, unix_now()) {
            return None;
        }
        Some(session)
    }

    fn remove(&mut self, key: &[u8]) {
        self.sessions.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &[u8], created_at: u64) -> TlsSession {
        TlsSession {
            id: id.to_vec(),
            cipher_suite: CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
            version: TlsVersion::Tls10,
            master_secret: [0x42; 48],
            created_at,
            peer_certificates: Vec::new(),
        }
    }

    #[test]
    fn test_expiry() {
        let s = session(&[1; 32], 1000);
        assert!(!s.is_expired(0, 1_000_000));
        assert!(!s.is_expired(60, 1060));
        assert!(s.is_expired(60, 1061));
    }

    #[test]
    fn test_resumable_id_length() {
        assert!(session(&[1; 16], 0).is_resumable(0, 5));
        assert!(session(&[1; 32], 0).is_resumable(0, 5));
        assert!(!session(&[1; 15], 0).is_resumable(0, 5));
        assert!(!session(&[], 0).is_resumable(0, 5));
        assert!(!session(&[1; 32], 0).is_resumable(3, 5));
    }

    #[test]
    fn test_debug_hides_master_secret() {
        let text = format!("{:?}", session(&[1; 32], 0));
        assert!(!text.contains("66"));
        assert!(text.contains("id_len: 32"));
    }

    #[test]
    fn test_cache_put_get_remove() {
        let mut cache = InMemorySessionCache::new(4);
        let now = unix_now();
        cache.put(&[1; 32], session(&[1; 32], now));
        assert_eq!(cache.len(), 1);
        let got = cache.get(&[1; 32]).unwrap();
        assert_eq!(got.master_secret, [0x42; 48]);
        assert!(cache.get(&[2; 32]).is_none());
        cache.remove(&[1; 32]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_same_id_replaces() {
        let mut cache = InMemorySessionCache::new(1);
        let now = unix_now();
        cache.put(&[1; 32], session(&[1; 32], now));
        let mut newer = session(&[1; 32], now);
        newer.cipher_suite = CipherSuite::TLS_RSA_WITH_RC4_128_MD5;
        cache.put(&[1; 32], newer);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(&[1; 32]).unwrap().cipher_suite,
            CipherSuite::TLS_RSA_WITH_RC4_128_MD5
        );
    }

    #[test]
    fn test_cache_evicts_expired_first() {
        let mut cache = InMemorySessionCache::with_lifetime(2, 60);
        let now = unix_now();
        cache.put(&[1; 32], session(&[1; 32], now - 3600));
        cache.put(&[2; 32], session(&[2; 32], now));
        cache.put(&[3; 32], session(&[3; 32], now));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&[2; 32]).is_some());
        assert!(cache.get(&[3; 32]).is_some());
    }

    #[test]
    fn test_cache_evicts_oldest_when_full() {
        let mut cache = InMemorySessionCache::with_lifetime(3, 0);
        let now = unix_now();
        cache.put(&[2; 32], session(&[2; 32], now - 10));
        cache.put(&[1; 32], session(&[1; 32], now - 500));
        cache.put(&[3; 32], session(&[3; 32], now - 20));
        cache.put(&[4; 32], session(&[4; 32], now));
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&[1; 32]).is_none());

        cache.put(&[5; 32], session(&[5; 32], now));
        assert!(cache.get(&[3; 32]).is_none());
        for id in [2u8, 4, 5] {
            assert!(cache.get(&[id; 32]).is_some(), "session {id} evicted");
        }
    }

    #[test]
    fn test_cache_expired_entry_invisible() {
        let mut cache = InMemorySessionCache::with_lifetime(8, 60);
        cache.put(&[1; 32], session(&[1; 32], unix_now() - 61));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&[1; 32]).is_none());
        cache.cleanup();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = InMemorySessionCache::new(0);
        cache.put(&[1; 32], session(&[1; 32], unix_now()));
        assert!(cache.is_empty());
    }
}
