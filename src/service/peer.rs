//! # Peer Core
//!
//! State shared by the host and client roles: the active session list and
//! the `send_data` path.
//!
//! The session list is written by transport tasks (connect/close) and read
//! by the tick thread during broadcast, so it sits behind an `RwLock`.
//! Broadcast works on a snapshot and never holds the lock while sending.

use crate::context::NetContext;
use crate::core::codec::NetCodec;
use crate::core::serialization::{self, WireFormat};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::NetData;
use crate::protocol::session::{Session, SessionId};
use crate::utils::metrics::Metrics;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct PeerCore {
    sessions: RwLock<Vec<Arc<Session>>>,
    scratch: Mutex<NetCodec>,
    metrics: Arc<Metrics>,
}

impl PeerCore {
    pub fn new(ctx: &NetContext) -> Self {
        Self {
            sessions: RwLock::new(Vec::new()),
            scratch: Mutex::new(NetCodec::writer()),
            metrics: ctx.metrics().clone(),
        }
    }

    /// Track a newly opened session
    pub fn add(&self, session: Arc<Session>) {
        if let Ok(mut sessions) = self.sessions.write() {
            debug!(session = session.id(), remote = ?session.remote_addr(), "Session added");
            sessions.push(session);
            self.metrics.session_opened();
        }
    }

    /// Forget a closed session. Returns it if it was tracked.
    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().ok()?;
        let index = sessions.iter().position(|s| s.id() == id)?;
        let session = sessions.remove(index);
        self.metrics.session_closed();
        debug!(session = id, "Session removed");
        Some(session)
    }

    /// Point-in-time copy of the session list
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether any open session comes from `ip`
    pub fn is_address_connected(&self, ip: IpAddr) -> bool {
        self.sessions
            .read()
            .map(|sessions| {
                sessions
                    .iter()
                    .any(|s| s.remote_addr().map(|a| a.ip()) == Some(ip))
            })
            .unwrap_or(false)
    }

    /// Encode `message` once and send it to `target`, or to every session
    /// when `target` is `None`.
    ///
    /// Returns how many sessions accepted the frame. During a broadcast a
    /// failing session is logged and skipped; the error is returned only when
    /// a single targeted send fails.
    pub fn send_data(
        &self,
        message: &dyn NetData,
        target: Option<&Arc<Session>>,
        binary: bool,
    ) -> Result<usize> {
        let format = WireFormat::from_binary_flag(binary);
        let payload = {
            let mut codec = self
                .scratch
                .lock()
                .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.into()))?;
            serialization::encode_into(&mut codec, message, format)?
        };

        if let Some(session) = target {
            session
                .send_payload(payload)
                .inspect_err(|_| self.metrics.send_failed())?;
            return Ok(1);
        }

        let mut delivered = 0;
        for session in self.sessions() {
            match session.send_payload(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    self.metrics.send_failed();
                    warn!(
                        session = session.id(),
                        tag = message.tag(),
                        error = %e,
                        "Broadcast send failed, continuing"
                    );
                }
            }
        }
        Ok(delivered)
    }

    /// Request closure of every session. Removal happens as each transport
    /// reports the close.
    pub fn close_all(&self) {
        for session in self.sessions() {
            if let Err(e) = session.close() {
                debug!(session = session.id(), error = %e, "Close request failed");
            }
        }
    }
}
