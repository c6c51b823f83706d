//! # TCP Transport
//!
//! Message-oriented duplex channel over TCP built on [`FrameCodec`].
//!
//! ## Handshake
//! The connecting side sends its service path as the first text frame. The
//! accepting side echoes it back when it matches the service it serves, or
//! answers with a close frame and drops the connection.
//!
//! ## Per-connection tasks
//! Outbound frames go through an unbounded channel into a writer task, so
//! [`DataSender`] calls never block the caller. The reader side runs in
//! [`Pump::run`], which hands every inbound frame to the session and returns
//! once either direction is finished.

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::session::{DataHandler, DataSender, Session};
use crate::transport::framing::{FrameCodec, WireFrame};
use crate::utils::metrics::Metrics;
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, instrument, trace, warn};

pub type FramedStream = Framed<TcpStream, FrameCodec>;

/// [`DataSender`] feeding a connection's writer task
#[derive(Debug)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<WireFrame>,
    metrics: Arc<Metrics>,
}

impl ChannelSender {
    fn push(&self, frame: WireFrame, len: usize) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| ProtocolError::SendFailure(constants::ERR_CONNECTION_CLOSED.into()))?;
        self.metrics.message_sent(len as u64);
        Ok(())
    }
}

impl DataSender for ChannelSender {
    fn send_binary(&self, data: Bytes) -> Result<()> {
        let len = data.len();
        self.push(WireFrame::Binary(data), len)
    }

    fn send_text(&self, text: String) -> Result<()> {
        let len = text.len();
        self.push(WireFrame::Text(text), len)
    }

    fn close(&self) -> Result<()> {
        self.tx
            .send(WireFrame::Close)
            .map_err(|_| ProtocolError::SendFailure(constants::ERR_CONNECTION_CLOSED.into()))
    }
}

/// Connect to `addr` and request `service`
#[instrument(skip(codec), fields(max_frame = codec.max_frame_size()))]
pub async fn connect(
    addr: SocketAddr,
    service: &str,
    timeout: Duration,
    codec: FrameCodec,
) -> Result<FramedStream> {
    let handshake = async {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let mut framed = Framed::new(stream, codec);

        framed.send(WireFrame::Text(service.to_string())).await?;
        match framed.next().await {
            Some(Ok(WireFrame::Text(ack))) if ack == service => {
                debug!(%addr, service, "Handshake accepted");
                Ok(framed)
            }
            Some(Ok(WireFrame::Close)) => Err(ProtocolError::TransportError(
                constants::ERR_SERVICE_MISMATCH.into(),
            )),
            Some(Ok(other)) => Err(ProtocolError::TransportError(format!(
                "Unexpected handshake reply: {other:?}"
            ))),
            Some(Err(e)) => Err(e),
            None => Err(ProtocolError::ConnectionClosed),
        }
    };

    tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| ProtocolError::TransportError(format!("Connect to {addr} timed out")))?
}

/// Wait for the connecting side's service path and accept or reject it
#[instrument(skip(framed), fields(peer = ?framed.get_ref().peer_addr().ok()))]
pub async fn accept_handshake(
    framed: &mut FramedStream,
    service: &str,
    timeout: Duration,
) -> Result<()> {
    let requested = tokio::time::timeout(timeout, framed.next())
        .await
        .map_err(|_| ProtocolError::TransportError("Handshake timed out".into()))?;

    match requested {
        Some(Ok(WireFrame::Text(path))) if path.trim_start_matches('/') == service => {
            framed.send(WireFrame::Text(service.to_string())).await?;
            Ok(())
        }
        Some(Ok(WireFrame::Text(path))) => {
            warn!(requested = %path, service, "Rejecting connection for another service");
            let _ = framed.send(WireFrame::Close).await;
            Err(ProtocolError::TransportError(
                constants::ERR_SERVICE_MISMATCH.into(),
            ))
        }
        Some(Ok(other)) => {
            let _ = framed.send(WireFrame::Close).await;
            Err(ProtocolError::TransportError(format!(
                "Expected service path, got {other:?}"
            )))
        }
        Some(Err(e)) => Err(e),
        None => Err(ProtocolError::ConnectionClosed),
    }
}

/// Drives one established connection
pub struct Pump {
    session: Arc<Session>,
    framed: FramedStream,
    rx: mpsc::UnboundedReceiver<WireFrame>,
    metrics: Arc<Metrics>,
}

/// Wrap an established connection in a session. The session is usable at
/// once; frames flow after [`Pump::run`] is spawned.
pub fn attach(
    framed: FramedStream,
    handler: Arc<dyn DataHandler>,
    log_data: bool,
    metrics: Arc<Metrics>,
) -> (Arc<Session>, Pump) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = ChannelSender {
        tx,
        metrics: metrics.clone(),
    };

    let mut session = Session::new(handler, Box::new(sender)).with_log_data(log_data);
    if let Ok(addr) = framed.get_ref().peer_addr() {
        session = session.with_remote_addr(addr);
    }
    let session = Arc::new(session);

    let pump = Pump {
        session: session.clone(),
        framed,
        rx,
        metrics,
    };
    (session, pump)
}

impl Pump {
    /// Pump frames until the connection closes from either side. The session
    /// is marked closed on return.
    #[instrument(skip(self), fields(session = self.session.id()))]
    pub async fn run(self) {
        let Pump {
            session,
            framed,
            rx,
            metrics,
        } = self;
        let (sink, mut stream) = framed.split();
        let mut writer = tokio::spawn(write_loop(sink, rx));

        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(WireFrame::Binary(data))) => session.receive_binary(data),
                    Some(Ok(WireFrame::Text(text))) => session.receive_text(&text),
                    Some(Ok(WireFrame::Close)) => {
                        debug!("Remote requested close");
                        break;
                    }
                    Some(Err(e)) => {
                        metrics.transport_error();
                        warn!(error = %e, "Connection failed");
                        break;
                    }
                    None => {
                        debug!("Remote closed the stream");
                        break;
                    }
                },
                _ = &mut writer => {
                    debug!("Writer finished");
                    break;
                }
            }
        }

        writer.abort();
        session.mark_closed();
    }
}

async fn write_loop(
    mut sink: SplitSink<FramedStream, WireFrame>,
    mut rx: mpsc::UnboundedReceiver<WireFrame>,
) {
    while let Some(frame) = rx.recv().await {
        let closing = frame == WireFrame::Close;
        if let Err(e) = sink.send(frame).await {
            trace!(error = %e, "Write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}
