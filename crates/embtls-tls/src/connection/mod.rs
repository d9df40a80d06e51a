//! Synchronous connection wrapping a `Read + Write` transport.
//!
//! [`TlsStream`] owns the transport, the record layer and, while the
//! handshake runs, one of the two state machines. Blocking transports drive
//! the handshake to completion in one call. A non-blocking transport
//! surfaces `TlsError::WouldBlock`; the same call is repeated once the
//! transport is ready again, and the state machine resumes where it
//! stopped.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

use log::{debug, warn};
use zeroize::Zeroizing;

use crate::alert::{Alert, AlertDescription, AlertLevel};
use crate::config::TlsConfig;
use crate::handshake::codec::{read_u24, MAX_HANDSHAKE_LEN};
use crate::handshake::{
    ClientHandshake, HandshakeIo, HandshakeSummary, HandshakeType, Incoming, ServerHandshake,
    Step,
};
use crate::record::{ContentType, RecordLayer, RecordProtection, MAX_PLAINTEXT_LENGTH};
use crate::session::TlsSession;
use crate::{CipherSuite, TlsConnection, TlsRole, TlsVersion};
use embtls_pki::Certificate;
use embtls_types::{TlsError, VerifyFlags};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Handshaking,
    Connected,
    Closed,
    Failed,
}

enum Handshake {
    Client(Box<ClientHandshake>),
    Server(Box<ServerHandshake>),
}

fn io_error(err: std::io::Error) -> TlsError {
    if err.kind() == ErrorKind::WouldBlock {
        TlsError::WouldBlock
    } else {
        TlsError::IoError(err)
    }
}

/// Transport plus record layer, with separate buffers per phase: raw input,
/// reassembled handshake plaintext, queued output and decrypted application
/// data. The plaintext buffers are wiped when dropped.
struct RecordChannel<S> {
    stream: S,
    role: TlsRole,
    record: RecordLayer,
    read_buf: Vec<u8>,
    hs_buf: Zeroizing<Vec<u8>>,
    out_buf: Vec<u8>,
    app_data: Zeroizing<Vec<u8>>,
    /// Server only, until the first record: accept an SSLv2-framed hello.
    accept_v2_hello: bool,
    peer_closed: bool,
    sent_close_notify: bool,
}

impl<S: Read + Write> RecordChannel<S> {
    fn new(stream: S, role: TlsRole) -> Self {
        Self {
            stream,
            role,
            record: RecordLayer::new(),
            read_buf: Vec::with_capacity(16 * 1024),
            hs_buf: Zeroizing::new(Vec::new()),
            out_buf: Vec::new(),
            app_data: Zeroizing::new(Vec::new()),
            accept_v2_hello: role == TlsRole::Server,
            peer_closed: false,
            sent_close_notify: false,
        }
    }

    /// One read from the transport. `Ok(false)` means it would block.
    fn read_more(&mut self) -> Result<bool, TlsError> {
        let mut tmp = [0u8; 16384];
        loop {
            match self.stream.read(&mut tmp) {
                Ok(0) => return Err(TlsError::ConnectionClosed),
                Ok(n) => {
                    self.read_buf.extend_from_slice(&tmp[..n]);
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(TlsError::IoError(e)),
            }
        }
    }

    /// The next whole record, or `None` when the transport would block.
    fn next_record(&mut self) -> Result<Option<(ContentType, Zeroizing<Vec<u8>>)>, TlsError> {
        loop {
            if let Some((ct, plaintext, used)) = self.record.open_record(&self.read_buf)? {
                self.read_buf.drain(..used);
                self.accept_v2_hello = false;
                return Ok(Some((ct, Zeroizing::new(plaintext))));
            }
            if !self.read_more()? {
                return Ok(None);
            }
        }
    }

    /// Split one complete message off the reassembly buffer.
    fn take_handshake_message(&mut self) -> Result<Option<Vec<u8>>, TlsError> {
        if self.hs_buf.len() < 4 {
            return Ok(None);
        }
        let len = read_u24(&self.hs_buf[1..4]);
        if len > MAX_HANDSHAKE_LEN {
            return Err(TlsError::BadHandshakeMessage {
                state: "record",
                reason: format!("handshake message of {len} bytes"),
            });
        }
        if self.hs_buf.len() < 4 + len {
            return Ok(None);
        }
        Ok(Some(self.hs_buf.drain(..4 + len).collect()))
    }

    /// An SSLv2 CLIENT-HELLO: high bit set in the 2-byte length, message
    /// type 1. `None` covers both "not v2" and "incomplete"; the flag stays
    /// set only in the second case.
    fn take_v2_client_hello(&mut self) -> Option<Vec<u8>> {
        if self.read_buf.len() < 3 {
            return None;
        }
        if self.read_buf[0] & 0x80 == 0 || self.read_buf[2] != 1 {
            self.accept_v2_hello = false;
            return None;
        }
        let len = (((self.read_buf[0] & 0x7f) as usize) << 8) | self.read_buf[1] as usize;
        if self.read_buf.len() < 2 + len {
            return None;
        }
        self.accept_v2_hello = false;
        let msg = self.read_buf[2..2 + len].to_vec();
        self.read_buf.drain(..2 + len);
        Some(msg)
    }

    fn handle_alert(&mut self, body: &[u8]) -> Result<(), TlsError> {
        let alert = Alert::from_bytes(body)?;
        if alert.description == AlertDescription::CloseNotify {
            debug!("peer sent close_notify");
            self.peer_closed = true;
            return Err(TlsError::ConnectionClosed);
        }
        match alert.level {
            AlertLevel::Fatal => {
                warn!("fatal alert received: {}", alert.description);
                Err(TlsError::AlertReceived(alert.description.to_string()))
            }
            AlertLevel::Warning => {
                warn!("warning alert received: {}", alert.description);
                Ok(())
            }
        }
    }

    /// Seal `data` into as many records as it takes and queue them.
    fn queue(&mut self, content_type: ContentType, data: &[u8]) -> Result<(), TlsError> {
        for chunk in data.chunks(MAX_PLAINTEXT_LENGTH) {
            let record = self.record.seal_record(content_type, chunk)?;
            self.out_buf.extend_from_slice(&record);
        }
        Ok(())
    }

    /// Write out everything queued; on `WouldBlock` the rest stays queued.
    fn flush(&mut self) -> Result<(), TlsError> {
        while !self.out_buf.is_empty() {
            match self.stream.write(&self.out_buf) {
                Ok(0) => return Err(TlsError::ConnectionClosed),
                Ok(n) => {
                    self.out_buf.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_error(e)),
            }
        }
        self.stream.flush().map_err(io_error)
    }
}

impl<S: Read + Write> HandshakeIo for RecordChannel<S> {
    fn next_message(&mut self) -> Result<Option<Incoming>, TlsError> {
        loop {
            if let Some(msg) = self.take_handshake_message()? {
                if self.role == TlsRole::Client && msg[0] == HandshakeType::HelloRequest as u8 {
                    debug!("client: ignoring HelloRequest during handshake");
                    continue;
                }
                return Ok(Some(Incoming::Handshake(msg)));
            }
            if self.accept_v2_hello {
                if let Some(msg) = self.take_v2_client_hello() {
                    return Ok(Some(Incoming::V2ClientHello(msg)));
                }
                if self.accept_v2_hello {
                    if !self.read_more()? {
                        return Ok(None);
                    }
                    continue;
                }
            }

            let Some((ct, data)) = self.next_record()? else {
                return Ok(None);
            };
            match ct {
                ContentType::Handshake => self.hs_buf.extend_from_slice(&data),
                ContentType::ChangeCipherSpec => {
                    if data[..] != [1u8] {
                        return Err(TlsError::InvalidRecord(
                            "malformed ChangeCipherSpec".into(),
                        ));
                    }
                    if !self.hs_buf.is_empty() {
                        return Err(TlsError::UnexpectedMessage(
                            "ChangeCipherSpec inside a fragmented handshake message".into(),
                        ));
                    }
                    return Ok(Some(Incoming::ChangeCipherSpec));
                }
                ContentType::Alert => self.handle_alert(&data)?,
                ContentType::ApplicationData => {
                    return Err(TlsError::UnexpectedMessage(
                        "application data during handshake".into(),
                    ))
                }
            }
        }
    }

    fn send_handshake(&mut self, msg: &[u8]) -> Result<(), TlsError> {
        self.queue(ContentType::Handshake, msg)
    }

    fn send_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        self.queue(ContentType::ChangeCipherSpec, &[1])
    }

    fn send_alert(&mut self, alert: Alert) -> Result<(), TlsError> {
        self.queue(ContentType::Alert, &alert.to_bytes())
    }

    fn set_version(&mut self, version: TlsVersion) {
        self.record.set_version(version);
    }

    fn activate_write(&mut self, protection: RecordProtection) {
        self.record.activate_write(protection);
    }

    fn activate_read(&mut self, protection: RecordProtection) {
        self.record.activate_read(protection);
    }
}

/// A client or server connection over `S`.
pub struct TlsStream<S: Read + Write> {
    channel: RecordChannel<S>,
    handshake: Option<Handshake>,
    pub(crate) state: ConnectionState,
    summary: Option<HandshakeSummary>,
    config: Arc<TlsConfig>,
}

impl<S: Read + Write> fmt::Debug for TlsStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsStream")
            .field("role", &self.config.role)
            .field("state", &self.state)
            .field("version", &self.summary.as_ref().map(|s| s.version))
            .field("cipher_suite", &self.summary.as_ref().map(|s| s.cipher_suite))
            .finish_non_exhaustive()
    }
}

impl<S: Read + Write> TlsStream<S> {
    /// Wrap `stream`; the role comes from the configuration. Nothing is
    /// sent until the first `handshake()`, `read()` or `write()`.
    pub fn new(stream: S, config: Arc<TlsConfig>) -> Self {
        let handshake = match config.role {
            TlsRole::Client => Handshake::Client(Box::new(ClientHandshake::new(config.clone()))),
            TlsRole::Server => Handshake::Server(Box::new(ServerHandshake::new(config.clone()))),
        };
        Self {
            channel: RecordChannel::new(stream, config.role),
            handshake: Some(handshake),
            state: ConnectionState::Handshaking,
            summary: None,
            config,
        }
    }

    /// Run the handshake. Returns `Ok(())` at once when already connected.
    pub fn handshake(&mut self) -> Result<(), TlsError> {
        match self.state {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed | ConnectionState::Failed => {
                return Err(TlsError::ConnectionClosed)
            }
            ConnectionState::Handshaking => {}
        }
        self.drive_handshake().map_err(|e| self.fail(e))
    }

    fn drive_handshake(&mut self) -> Result<(), TlsError> {
        loop {
            self.channel.flush()?;
            let step = match self.handshake.as_mut() {
                Some(Handshake::Client(hs)) => hs.step(&mut self.channel)?,
                Some(Handshake::Server(hs)) => hs.step(&mut self.channel)?,
                None => return Err(TlsError::HandshakeFailed("no handshake in progress".into())),
            };
            match step {
                Step::Continue | Step::Output => {}
                Step::NeedInput => {
                    self.channel.flush()?;
                    return Err(TlsError::WouldBlock);
                }
                Step::Done => break,
            }
        }
        self.channel.flush()?;

        let summary = match &self.handshake {
            Some(Handshake::Client(hs)) => hs.summary()?,
            Some(Handshake::Server(hs)) => hs.summary()?,
            None => return Err(TlsError::HandshakeFailed("no handshake in progress".into())),
        };
        debug!(
            "{:?}: handshake complete, {} {} resumed={}",
            self.config.role, summary.version, summary.cipher_suite, summary.resumed
        );
        self.summary = Some(summary);
        self.handshake = None;
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Record a fatal error: alert the peer when the error calls for it and
    /// refuse further traffic. Retryable errors pass through untouched.
    fn fail(&mut self, err: TlsError) -> TlsError {
        if err.is_retryable() {
            return err;
        }
        if let Some(description) = AlertDescription::for_error(&err) {
            warn!("{:?}: sending fatal alert {description}: {err}", self.config.role);
            let _ = self
                .channel
                .send_alert(Alert::fatal(description))
                .and_then(|_| self.channel.flush());
        }
        self.state = ConnectionState::Failed;
        err
    }

    fn ensure_connected(&mut self) -> Result<(), TlsError> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Handshaking => self.handshake(),
            ConnectionState::Closed | ConnectionState::Failed => Err(TlsError::ConnectionClosed),
        }
    }

    /// Read application data, running the handshake first if needed.
    /// `Ok(0)` once the peer has sent close_notify.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        if self.state == ConnectionState::Closed {
            return Ok(0);
        }
        self.ensure_connected()?;
        loop {
            if !self.channel.app_data.is_empty() || buf.is_empty() {
                let n = buf.len().min(self.channel.app_data.len());
                buf[..n].copy_from_slice(&self.channel.app_data[..n]);
                self.channel.app_data.drain(..n);
                return Ok(n);
            }
            match self.read_record() {
                Ok(true) => {}
                Ok(false) => return Err(TlsError::WouldBlock),
                Err(TlsError::ConnectionClosed) if self.channel.peer_closed => {
                    self.state = ConnectionState::Closed;
                    return Ok(0);
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Process one record. `Ok(false)` when the transport would block.
    fn read_record(&mut self) -> Result<bool, TlsError> {
        let Some((ct, data)) = self.channel.next_record()? else {
            return Ok(false);
        };
        match ct {
            ContentType::ApplicationData => self.channel.app_data.extend_from_slice(&data),
            ContentType::Alert => self.channel.handle_alert(&data)?,
            ContentType::Handshake => {
                self.channel.hs_buf.extend_from_slice(&data);
                while let Some(msg) = self.channel.take_handshake_message()? {
                    self.refuse_renegotiation(&msg)?;
                }
            }
            ContentType::ChangeCipherSpec => {
                return Err(TlsError::UnexpectedMessage(
                    "ChangeCipherSpec after handshake".into(),
                ))
            }
        }
        Ok(true)
    }

    /// Renegotiation is not supported: a HelloRequest (client) or a new
    /// ClientHello (server) gets a no_renegotiation warning in TLS and is
    /// dropped in SSLv3, which has no such alert.
    fn refuse_renegotiation(&mut self, msg: &[u8]) -> Result<(), TlsError> {
        let renegotiation = match self.config.role {
            TlsRole::Client => HandshakeType::HelloRequest,
            TlsRole::Server => HandshakeType::ClientHello,
        };
        if msg[0] != renegotiation as u8 {
            return Err(TlsError::UnexpectedMessage(format!(
                "handshake message type {} after handshake",
                msg[0]
            )));
        }
        debug!("{:?}: refusing renegotiation", self.config.role);
        if self.channel.record.version() == TlsVersion::Tls10 {
            self.channel
                .send_alert(Alert::warning(AlertDescription::NoRenegotiation))?;
            match self.channel.flush() {
                Ok(()) | Err(TlsError::WouldBlock) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Send application data, running the handshake first if needed. The
    /// data is split into records of at most 16384 bytes. If the transport
    /// would block, the records stay queued and go out on the next
    /// `flush()`, `write()` or `shutdown()`.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError> {
        self.ensure_connected()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if let Err(e) = self.channel.queue(ContentType::ApplicationData, buf) {
            return Err(self.fail(e));
        }
        match self.channel.flush() {
            Ok(()) | Err(TlsError::WouldBlock) => Ok(buf.len()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Push out queued records.
    pub fn flush(&mut self) -> Result<(), TlsError> {
        self.channel.flush()
    }

    /// Send close_notify. Does not wait for the peer's.
    pub fn shutdown(&mut self) -> Result<(), TlsError> {
        if self.state == ConnectionState::Failed {
            return Ok(());
        }
        if !self.channel.sent_close_notify {
            self.channel.send_alert(Alert::close_notify())?;
            self.channel.sent_close_notify = true;
        }
        self.state = ConnectionState::Closed;
        self.channel.flush()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// The negotiated session; clients hand this back through
    /// `TlsConfigBuilder::resumption_session` to resume.
    pub fn session(&self) -> Option<&TlsSession> {
        self.summary.as_ref().map(|s| &s.session)
    }

    pub fn is_resumed(&self) -> bool {
        self.summary.as_ref().is_some_and(|s| s.resumed)
    }

    /// Certificates the peer presented, leaf first.
    pub fn peer_certificates(&self) -> &[Certificate] {
        self.summary
            .as_ref()
            .map(|s| s.peer_certificates.as_slice())
            .unwrap_or_default()
    }

    /// Outcome of the peer chain check; `None` when it was not checked.
    pub fn verify_result(&self) -> Option<VerifyFlags> {
        self.summary.as_ref().and_then(|s| s.verify_result)
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.summary.as_ref().map(|s| s.cipher_suite)
    }

    pub fn version(&self) -> Option<TlsVersion> {
        self.summary.as_ref().map(|s| s.version)
    }

    /// Host name from SNI: the one requested (client) or received (server).
    pub fn server_name(&self) -> Option<&str> {
        self.summary.as_ref().and_then(|s| s.server_name.as_deref())
    }

    /// Decrypted application data buffered and ready for `read()`.
    pub fn bytes_available(&self) -> usize {
        self.channel.app_data.len()
    }

    pub fn get_ref(&self) -> &S {
        &self.channel.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.channel.stream
    }
}

impl<S: Read + Write> TlsConnection for TlsStream<S> {
    fn handshake(&mut self) -> Result<(), TlsError> {
        TlsStream::handshake(self)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        TlsStream::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError> {
        TlsStream::write(self, buf)
    }

    fn shutdown(&mut self) -> Result<(), TlsError> {
        TlsStream::shutdown(self)
    }

    fn version(&self) -> Option<TlsVersion> {
        TlsStream::version(self)
    }

    fn cipher_suite(&self) -> Option<CipherSuite> {
        TlsStream::cipher_suite(self)
    }
}
