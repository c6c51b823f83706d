//! # Host (server role)
//!
//! Listens on the configured address, accepts connections that request the
//! configured service path and turns each one into a [`Session`] feeding the
//! host's [`Dispatcher`].
//!
//! ## Threads
//! Accepting, handshakes and frame decoding run on the tokio runtime.
//! Message handlers only run inside [`PeerHost::tick`], on whichever thread
//! calls it. The connect/close callbacks run on runtime threads.
//!
//! ## Shutdown
//! [`PeerHost::shutdown`] stops accepting, asks every session to close and
//! waits up to `shutdown_timeout` for them to go away. [`PeerHost::destroy`]
//! does the same without waiting.

use crate::config::ServerConfig;
use crate::context::NetContext;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::NetData;
use crate::protocol::session::{DataHandler, Session};
use crate::service::peer::PeerCore;
use crate::transport::framing::FrameCodec;
use crate::transport::tcp;
use crate::utils::metrics::Metrics;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

/// Callback fired with the affected session
pub type SessionCallback = Arc<dyn Fn(&Arc<Session>) + Send + Sync>;

#[derive(Default, Clone)]
struct Callbacks {
    on_connected: Option<SessionCallback>,
    on_closed: Option<SessionCallback>,
}

/// Everything a connection task needs
#[derive(Clone)]
struct Shared {
    core: Arc<PeerCore>,
    handler: Arc<dyn DataHandler>,
    metrics: Arc<Metrics>,
    callbacks: Callbacks,
    config: ServerConfig,
    codec: FrameCodec,
}

pub struct PeerHost<O> {
    config: ServerConfig,
    codec: FrameCodec,
    metrics: Arc<Metrics>,
    core: Arc<PeerCore>,
    dispatcher: Dispatcher<O>,
    callbacks: Callbacks,
    shutdown_tx: Option<mpsc::Sender<()>>,
    accept_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl<O: 'static> PeerHost<O> {
    /// Host configured from `ctx.config().server`
    pub fn new(ctx: &NetContext) -> Self {
        Self::with_config(ctx, ctx.config().server.clone())
    }

    pub fn with_config(ctx: &NetContext, config: ServerConfig) -> Self {
        Self {
            config,
            codec: FrameCodec::new(ctx.config().transport.max_frame_size),
            metrics: ctx.metrics().clone(),
            core: Arc::new(PeerCore::new(ctx)),
            dispatcher: Dispatcher::new(ctx),
            callbacks: Callbacks::default(),
            shutdown_tx: None,
            accept_task: None,
            local_addr: None,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<O> {
        &self.dispatcher
    }

    /// Bind handlers here before calling [`PeerHost::tick`]
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<O> {
        &mut self.dispatcher
    }

    /// Set before [`PeerHost::start`]; later changes do not reach running
    /// connections.
    pub fn on_session_connected<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.callbacks.on_connected = Some(Arc::new(callback));
        self
    }

    /// Set before [`PeerHost::start`]; later changes do not reach running
    /// connections.
    pub fn on_session_closed<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.callbacks.on_closed = Some(Arc::new(callback));
        self
    }

    /// Bind the listener and start accepting. Returns the bound address.
    #[instrument(skip(self), fields(service = %self.config.service))]
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.accept_task.is_some() {
            return Err(ProtocolError::Custom(constants::ERR_ALREADY_STARTED.into()));
        }

        let listener = TcpListener::bind(self.config.bind_addr()?).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, service = %self.config.service, "Host listening");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let shared = Shared {
            core: self.core.clone(),
            handler: self.dispatcher.data_handler(),
            metrics: self.metrics.clone(),
            callbacks: self.callbacks.clone(),
            config: self.config.clone(),
            codec: self.codec,
        };

        self.accept_task = Some(tokio::spawn(accept_loop(listener, shutdown_rx, shared)));
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.accept_task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Run handlers for every message received since the last tick
    pub fn tick(&self, owner: &mut O) -> usize {
        self.dispatcher.tick(owner)
    }

    /// See [`PeerCore::send_data`]
    pub fn send_data(
        &self,
        message: &dyn NetData,
        target: Option<&Arc<Session>>,
        binary: bool,
    ) -> Result<usize> {
        self.core.send_data(message, target, binary)
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.core.sessions()
    }

    pub fn session_count(&self) -> usize {
        self.core.session_count()
    }

    pub fn is_address_connected(&self, ip: IpAddr) -> bool {
        self.core.is_address_connected(ip)
    }

    /// Stop accepting, close every session and wait for the accept loop to
    /// finish draining
    pub async fn shutdown(&mut self) {
        self.destroy();
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Accept loop ended abnormally");
            }
        }
    }
}

impl<O> PeerHost<O> {
    /// Stop accepting and ask every session to close, without waiting
    pub fn destroy(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        self.core.close_all();
    }
}

impl<O> Drop for PeerHost<O> {
    fn drop(&mut self) {
        self.destroy();
    }
}

async fn accept_loop(listener: TcpListener, mut shutdown_rx: mpsc::Receiver<()>, shared: Shared) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down host. Waiting for sessions to close...");
                shared.core.close_all();

                let timeout = tokio::time::sleep(shared.config.shutdown_timeout);
                tokio::pin!(timeout);

                loop {
                    tokio::select! {
                        _ = &mut timeout => {
                            warn!(
                                sessions = shared.core.session_count(),
                                "Shutdown timeout reached, leaving remaining sessions"
                            );
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_millis(50)) => {
                            let sessions = shared.core.session_count();
                            if sessions == 0 {
                                info!("All sessions closed, host stopped");
                                break;
                            }
                            debug!(sessions, "Waiting for sessions to close");
                        }
                    }
                }
                return;
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        if shared.core.session_count() >= shared.config.max_connections {
                            warn!(
                                remote = %addr,
                                max = shared.config.max_connections,
                                "Connection limit reached, rejecting"
                            );
                            continue;
                        }
                        tokio::spawn(serve_connection(stream, addr, shared.clone()));
                    }
                    Err(e) => {
                        shared.metrics.transport_error();
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

#[instrument(skip(stream, shared), fields(remote = %addr))]
async fn serve_connection(stream: TcpStream, addr: SocketAddr, shared: Shared) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "Could not disable Nagle");
    }
    let mut framed = Framed::new(stream, shared.codec);

    if let Err(e) = tcp::accept_handshake(
        &mut framed,
        &shared.config.service,
        shared.config.handshake_timeout,
    )
    .await
    {
        shared.metrics.transport_error();
        debug!(error = %e, "Handshake failed");
        return;
    }

    let (session, pump) = tcp::attach(
        framed,
        shared.handler.clone(),
        shared.config.log_data,
        shared.metrics.clone(),
    );
    shared.core.add(session.clone());
    info!(session = session.id(), "Session connected");
    if let Some(callback) = &shared.callbacks.on_connected {
        callback(&session);
    }

    pump.run().await;

    shared.core.remove(session.id());
    info!(session = session.id(), "Session closed");
    if let Some(callback) = &shared.callbacks.on_closed {
        callback(&session);
    }
}
