//! Example: host and client echoing demo messages over loopback
//!
//! The host replies to every `DemoMessage` with a `DemoReply`; the client
//! sends a few messages in both wire formats and prints the replies as its
//! tick loop picks them up.
//!
//! Run with: `cargo run --example echo`
//! Set `RUST_LOG=net_dispatch=debug` for transport detail.

#![allow(clippy::uninlined_format_args)]

use net_dispatch::config::{LoggingConfig, NetworkConfig};
use net_dispatch::context::NetContext;
use net_dispatch::core::serialization::WireFormat;
use net_dispatch::protocol::messages::{DemoMessage, DemoReply, HeartBeat};
use net_dispatch::protocol::registry::MessageRegistry;
use net_dispatch::service::client::PeerClient;
use net_dispatch::service::host::PeerHost;
use net_dispatch::utils::logging::init_logging;
use std::time::Duration;

#[derive(Default)]
struct HostState {
    echoed: usize,
    beats: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LoggingConfig::default())?;

    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.address = "127.0.0.1".into();
        c.server.port = 0;
        c.server.service = "Echo".into();
        c.client.service = "Echo".into();
    });
    config.validate_strict()?;
    let ctx = NetContext::with_config(MessageRegistry::register_all(), config);

    let mut host = PeerHost::<HostState>::new(&ctx);
    host.dispatcher_mut()
        .bind::<DemoMessage, _>(|state, session, msg| {
            state.echoed += 1;
            session.send_message(
                &DemoReply {
                    reply: msg.message.chars().rev().collect(),
                },
                WireFormat::Binary,
            )
        })
        .bind::<HeartBeat, _>(|state, _, _| {
            state.beats += 1;
            Ok(())
        });
    host.on_session_connected(|session| {
        println!("host: session {} connected from {:?}", session.id(), session.remote_addr());
    });
    let addr = host.start().await?;

    let mut client_config = ctx.config().client.clone();
    client_config.address = addr.to_string();
    let mut client = PeerClient::<Vec<String>>::with_config(&ctx, client_config);
    client
        .dispatcher_mut()
        .bind::<DemoReply, _>(|replies, _, msg| {
            replies.push(msg.reply.clone());
            Ok(())
        });
    client.connect().await?;

    for (i, text) in ["hello", "dispatch", "world"].iter().enumerate() {
        let message = DemoMessage {
            message: text.to_string(),
        };
        client.send_data(&message, None, i % 2 == 0)?;
    }
    client.send_data(&HeartBeat { status: true }, None, true)?;

    let mut host_state = HostState::default();
    let mut replies = Vec::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(16));
    for _ in 0..120 {
        ticker.tick().await;
        host.tick(&mut host_state);
        client.tick(&mut replies);
        if replies.len() == 3 && host_state.beats == 1 {
            break;
        }
    }

    for reply in &replies {
        println!("client: received {:?}", reply);
    }
    println!(
        "host: echoed {} message(s), saw {} heartbeat(s)",
        host_state.echoed, host_state.beats
    );

    client.destroy();
    client.wait_disconnected().await;
    host.shutdown().await;
    ctx.metrics().log_metrics();
    Ok(())
}
