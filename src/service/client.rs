//! # Client (client role)
//!
//! Owns at most one outbound connection. The connection state is an explicit
//! field, readable from any thread, rather than something inferred from the
//! session list.
//!
//! ```text
//! Disconnected --connect()--> Connecting --handshake ok--> Connected
//!      ^                          |                            |
//!      +------- failure ----------+------- transport close ----+
//! ```

use crate::config::ClientConfig;
use crate::context::NetContext;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::NetData;
use crate::protocol::session::Session;
use crate::service::peer::PeerCore;
use crate::transport::framing::FrameCodec;
use crate::transport::tcp;
use crate::utils::metrics::Metrics;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Observable state of a client's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

#[derive(Debug)]
struct Link {
    state: AtomicU8,
    session: Mutex<Option<Arc<Session>>>,
}

impl Link {
    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.session.lock().ok().and_then(|s| s.clone())
    }
}

pub struct PeerClient<O> {
    config: ClientConfig,
    codec: FrameCodec,
    metrics: Arc<Metrics>,
    core: Arc<PeerCore>,
    dispatcher: Dispatcher<O>,
    link: Arc<Link>,
    pump_task: Option<JoinHandle<()>>,
}

impl<O: 'static> PeerClient<O> {
    /// Client configured from `ctx.config().client`
    pub fn new(ctx: &NetContext) -> Self {
        Self::with_config(ctx, ctx.config().client.clone())
    }

    pub fn with_config(ctx: &NetContext, config: ClientConfig) -> Self {
        Self {
            config,
            codec: FrameCodec::new(ctx.config().transport.max_frame_size),
            metrics: ctx.metrics().clone(),
            core: Arc::new(PeerCore::new(ctx)),
            dispatcher: Dispatcher::new(ctx),
            link: Arc::new(Link {
                state: AtomicU8::new(ConnectionState::Disconnected as u8),
                session: Mutex::new(None),
            }),
            pump_task: None,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<O> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<O> {
        &mut self.dispatcher
    }

    /// Connect to the configured host and request the configured service
    #[instrument(skip(self), fields(address = %self.config.address, service = %self.config.service))]
    pub async fn connect(&mut self) -> Result<Arc<Session>> {
        if self.link.state() != ConnectionState::Disconnected {
            return Err(ProtocolError::Custom(constants::ERR_ALREADY_STARTED.into()));
        }
        let addr: SocketAddr = self.config.address.parse().map_err(|e| {
            ProtocolError::ConfigError(format!("Invalid client address '{}': {e}", self.config.address))
        })?;

        self.link.set_state(ConnectionState::Connecting);
        let framed = match tcp::connect(
            addr,
            &self.config.service,
            self.config.connection_timeout,
            self.codec,
        )
        .await
        {
            Ok(framed) => framed,
            Err(e) => {
                self.link.set_state(ConnectionState::Disconnected);
                self.metrics.transport_error();
                warn!(error = %e, "Connection attempt failed");
                return Err(e);
            }
        };

        let (session, pump) = tcp::attach(
            framed,
            self.dispatcher.data_handler(),
            self.config.log_data,
            self.metrics.clone(),
        );
        self.core.add(session.clone());
        if let Ok(mut slot) = self.link.session.lock() {
            *slot = Some(session.clone());
        }
        self.link.set_state(ConnectionState::Connected);
        info!(session = session.id(), "Connected to host");

        let core = self.core.clone();
        let link = self.link.clone();
        let closing = session.clone();
        self.pump_task = Some(tokio::spawn(async move {
            pump.run().await;
            core.remove(closing.id());
            if let Ok(mut slot) = link.session.lock() {
                *slot = None;
            }
            link.set_state(ConnectionState::Disconnected);
            info!(session = closing.id(), "Disconnected from host");
        }));

        Ok(session)
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn is_connecting(&self) -> bool {
        self.state() == ConnectionState::Connecting
    }

    pub fn host_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The live session, if connected
    pub fn session(&self) -> Option<Arc<Session>> {
        self.link.session()
    }

    /// Run handlers for every message received since the last tick
    pub fn tick(&self, owner: &mut O) -> usize {
        self.dispatcher.tick(owner)
    }

    /// Send to `target`, or to the host session when `target` is `None`
    pub fn send_data(
        &self,
        message: &dyn NetData,
        target: Option<&Arc<Session>>,
        binary: bool,
    ) -> Result<usize> {
        if target.is_none() && self.core.session_count() == 0 {
            return Err(ProtocolError::SendFailure(constants::ERR_NOT_CONNECTED.into()));
        }
        self.core.send_data(message, target, binary)
    }

    /// Wait until the current connection has fully closed
    pub async fn wait_disconnected(&mut self) {
        if let Some(task) = self.pump_task.take() {
            let _ = task.await;
        }
    }
}

impl<O> PeerClient<O> {
    /// Ask the host session to close. The state becomes `Disconnected` once
    /// the transport confirms.
    pub fn destroy(&mut self) {
        self.core.close_all();
    }
}

impl<O> Drop for PeerClient<O> {
    fn drop(&mut self) {
        self.destroy();
    }
}
