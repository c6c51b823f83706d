//! # Session
//!
//! One logical connection. A session couples the decoding side (a
//! [`DataHandler`], shared by every session of a peer) with the sending side
//! (a [`DataSender`], unique to this session), so the rest of the engine can
//! send and receive without knowing which transport is underneath.
//!
//! Inbound frames go through [`Session::receive_binary`] /
//! [`Session::receive_text`], which never propagate a failure: a malformed
//! frame is logged and dropped, and the connection stays up.
//!
//! After the session is closed, sends become no-ops so handlers still working
//! through already-queued messages can reply without special-casing closure.

use crate::core::serialization::{self, WireFormat, WirePayload};
use crate::error::Result;
use crate::protocol::message::NetData;
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Process-unique session identifier
pub type SessionId = u64;

// Id source only; holds no engine state
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Decoding endpoint: turns raw inbound data into queued messages
pub trait DataHandler: Send + Sync {
    fn on_binary(&self, session: &Arc<Session>, data: Bytes) -> Result<()>;

    fn on_text(&self, session: &Arc<Session>, text: &str) -> Result<()>;
}

/// Sending endpoint of one transport connection
pub trait DataSender: Send + Sync {
    fn send_binary(&self, data: Bytes) -> Result<()>;

    fn send_text(&self, text: String) -> Result<()>;

    /// Ask the transport to close the connection
    fn close(&self) -> Result<()>;
}

pub struct Session {
    id: SessionId,
    remote_addr: Option<SocketAddr>,
    handler: Arc<dyn DataHandler>,
    sender: Box<dyn DataSender>,
    closed: AtomicBool,
    log_data: bool,
}

impl Session {
    pub fn new(handler: Arc<dyn DataHandler>, sender: Box<dyn DataSender>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            remote_addr: None,
            handler,
            sender,
            closed: AtomicBool::new(false),
            log_data: false,
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Trace every frame in and out of this session
    pub fn with_log_data(mut self, log_data: bool) -> Self {
        self.log_data = log_data;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Deliver an inbound binary frame to the handler
    pub fn receive_binary(self: &Arc<Self>, data: impl Into<Bytes>) {
        let data = data.into();
        if self.log_data {
            trace!(session = self.id, bytes = ?&data[..], "Received binary frame");
        }
        let result = catch_unwind(AssertUnwindSafe(|| self.handler.on_binary(self, data)));
        self.report("binary", result);
    }

    /// Deliver an inbound text frame to the handler
    pub fn receive_text(self: &Arc<Self>, text: &str) {
        if self.log_data {
            trace!(session = self.id, text, "Received text frame");
        }
        let result = catch_unwind(AssertUnwindSafe(|| self.handler.on_text(self, text)));
        self.report("text", result);
    }

    fn report(&self, kind: &'static str, result: std::thread::Result<Result<()>>) {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(session = self.id, kind, error = %e, "Inbound frame dropped"),
            Err(_) => error!(session = self.id, kind, "Panic while decoding inbound frame"),
        }
    }

    /// Send raw bytes. A no-op once the session is closed.
    pub fn send_binary(&self, data: Bytes) -> Result<()> {
        if self.is_closed() {
            trace!(session = self.id, "Send on closed session ignored");
            return Ok(());
        }
        if self.log_data {
            trace!(session = self.id, bytes = ?&data[..], "Sending binary frame");
        }
        self.sender.send_binary(data)
    }

    /// Send text. A no-op once the session is closed.
    pub fn send_text(&self, text: String) -> Result<()> {
        if self.is_closed() {
            trace!(session = self.id, "Send on closed session ignored");
            return Ok(());
        }
        if self.log_data {
            trace!(session = self.id, text = %text, "Sending text frame");
        }
        self.sender.send_text(text)
    }

    /// Send an already encoded payload
    pub fn send_payload(&self, payload: WirePayload) -> Result<()> {
        match payload {
            WirePayload::Binary(bytes) => self.send_binary(bytes),
            WirePayload::Text(text) => self.send_text(text),
        }
    }

    /// Encode and send a single message to this session
    pub fn send_message(&self, message: &dyn NetData, format: WireFormat) -> Result<()> {
        self.send_payload(serialization::encode(message, format)?)
    }

    /// Request closure from the transport. Removal from the owning peer
    /// happens when the transport reports the close.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(session = self.id, "Closing session");
        self.sender.close().inspect_err(|e| {
            warn!(session = self.id, error = %e, "Transport refused close request");
        })
    }

    /// Record that the transport has closed underneath this session
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::error::ProtocolError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        binary: Mutex<Vec<Bytes>>,
        text: Mutex<Vec<String>>,
        closes: AtomicU64,
    }

    struct RecordingSender(Arc<Recorder>);

    impl DataSender for RecordingSender {
        fn send_binary(&self, data: Bytes) -> Result<()> {
            self.0.binary.lock().unwrap().push(data);
            Ok(())
        }

        fn send_text(&self, text: String) -> Result<()> {
            self.0.text.lock().unwrap().push(text);
            Ok(())
        }

        fn close(&self) -> Result<()> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    impl DataHandler for FailingHandler {
        fn on_binary(&self, _session: &Arc<Session>, data: Bytes) -> Result<()> {
            if data.is_empty() {
                panic!("handler blew up");
            }
            Err(ProtocolError::DecodeFailure("bad".into()))
        }

        fn on_text(&self, _session: &Arc<Session>, _text: &str) -> Result<()> {
            Err(ProtocolError::UnknownTag(1))
        }
    }

    fn session() -> (Arc<Session>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let session = Session::new(
            Arc::new(FailingHandler),
            Box::new(RecordingSender(recorder.clone())),
        );
        (Arc::new(session), recorder)
    }

    #[test]
    fn test_receive_swallows_errors_and_panics() {
        let (session, _) = session();
        session.receive_binary(vec![1u8]);
        session.receive_binary(Vec::new());
        session.receive_text("{}");
        assert!(!session.is_closed());
    }

    #[test]
    fn test_send_forwards_to_sender() {
        let (session, recorder) = session();
        session.send_binary(Bytes::from_static(&[1, 2])).unwrap();
        session.send_text("hi".into()).unwrap();
        assert_eq!(recorder.binary.lock().unwrap().len(), 1);
        assert_eq!(recorder.text.lock().unwrap()[0], "hi");
    }

    #[test]
    fn test_send_after_close_is_noop() {
        let (session, recorder) = session();
        session.close().unwrap();
        session.close().unwrap();
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);

        session.send_text("late".into()).unwrap();
        assert!(recorder.text.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _) = session();
        let (b, _) = session();
        assert_ne!(a.id(), b.id());
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| (0..250).map(|_| session().0.id()).collect::<Vec<_>>())
            })
            .collect();
        let mut ids: Vec<SessionId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 1000);
    }
}
