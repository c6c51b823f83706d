//! # Dispatch Engine
//!
//! Binds handlers to message tags, decodes inbound frames into pooled
//! instances and runs the bound handler on the owner's thread.
//!
//! ## Message lifecycle
//! ```text
//! Received -> Decoded -> Queued -> Invoked -> Released
//!    |           |         |
//!    |           |         +-> Dropped (queue full)
//!    |           +-> Dropped (decode error)
//!    +-> Dropped (unknown tag)             Dropped (no handler) <- Queued
//! ```
//!
//! Decoding runs on whichever thread the transport delivers on, through the
//! [`Inbox`] (the [`DataHandler`] every session of a peer shares). It never
//! calls application code. [`Dispatcher::tick`] works through what is queued at
//! call time and is the only place handlers run. A `Dispatcher` is `Send` but not
//! `Sync`, so one thread owns the tick.
//!
//! ## Usage
//! ```rust
//! use net_dispatch::context::NetContext;
//! use net_dispatch::protocol::dispatcher::Dispatcher;
//! use net_dispatch::protocol::messages::DemoMessage;
//! use net_dispatch::protocol::registry::MessageRegistry;
//!
//! #[derive(Default)]
//! struct App {
//!     seen: Vec<String>,
//! }
//!
//! let ctx = NetContext::new(MessageRegistry::register_all());
//! let mut dispatcher = Dispatcher::<App>::new(&ctx);
//! dispatcher.bind::<DemoMessage, _>(|app, _session, msg| {
//!     app.seen.push(msg.message.clone());
//!     Ok(())
//! });
//! assert!(dispatcher.is_bound(10));
//!
//! let mut app = App::default();
//! assert_eq!(dispatcher.tick(&mut app), 0);
//! ```

use crate::context::NetContext;
use crate::core::codec::NetCodec;
use crate::core::serialization::parse_envelope;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{Message, NetData, Tag};
use crate::protocol::registry::MessageRegistry;
use crate::protocol::session::{DataHandler, Session};
use crate::utils::metrics::{DropReason, Metrics, Timer};
use crate::utils::pool::{NetDataPool, Pooled};
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// A decoded message waiting for the next tick
#[derive(Debug)]
pub struct PendingMessage {
    pub session: Arc<Session>,
    pub data: Pooled,
}

/// Receive side of the engine: decodes frames and queues them
pub struct Inbox {
    pool: NetDataPool,
    queue: Mutex<VecDeque<PendingMessage>>,
    max_pending: Option<usize>,
    metrics: Arc<Metrics>,
}

impl Inbox {
    fn new(ctx: &NetContext) -> Self {
        let dispatch = &ctx.config().dispatch;
        Self {
            pool: NetDataPool::with_max_idle(ctx.registry(), dispatch.max_idle_per_tag),
            queue: Mutex::new(VecDeque::new()),
            max_pending: dispatch.max_pending,
            metrics: ctx.metrics().clone(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<PendingMessage>>> {
        self.queue
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.into()))
    }

    /// Messages waiting for the next tick
    pub fn len(&self) -> usize {
        self.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pool(&self) -> &NetDataPool {
        &self.pool
    }

    fn acquire(&self, session: &Session, tag: Tag) -> Result<Pooled> {
        self.pool.acquire(tag).inspect_err(|_| {
            self.metrics.message_dropped(DropReason::UnknownTag);
            warn!(tag, session = session.id(), "Unknown message tag, frame dropped");
        })
    }

    fn decode_failed(&self, session: &Session, tag: Option<Tag>, error: &ProtocolError) {
        self.metrics.message_dropped(DropReason::DecodeError);
        warn!(?tag, session = session.id(), error = %error, "Malformed frame dropped");
    }

    fn enqueue(&self, session: &Arc<Session>, data: Pooled) -> Result<()> {
        let mut queue = self.lock()?;
        if let Some(max) = self.max_pending {
            if queue.len() >= max {
                drop(queue);
                self.metrics.message_dropped(DropReason::QueueFull);
                warn!(
                    tag = data.tag(),
                    session = session.id(),
                    max_pending = max,
                    "Dispatch queue full, message dropped"
                );
                return Err(ProtocolError::QueueFull(max));
            }
        }
        queue.push_back(PendingMessage {
            session: session.clone(),
            data,
        });
        self.metrics.message_decoded();
        Ok(())
    }

    /// Oldest queued message
    fn pop(&self) -> Option<PendingMessage> {
        self.lock().ok().and_then(|mut queue| queue.pop_front())
    }
}

impl DataHandler for Inbox {
    fn on_binary(&self, session: &Arc<Session>, data: Bytes) -> Result<()> {
        self.metrics.frame_received(data.len() as u64);

        let mut codec = NetCodec::reader(data);
        let tag = codec
            .read_tag()
            .inspect_err(|e| self.decode_failed(session, None, e))?;
        let mut instance = self.acquire(session, tag)?;
        codec
            .decode_message(&mut *instance)
            .inspect_err(|e| self.decode_failed(session, Some(tag), e))?;

        self.enqueue(session, instance)
    }

    fn on_text(&self, session: &Arc<Session>, text: &str) -> Result<()> {
        self.metrics.frame_received(text.len() as u64);

        let (tag, payload) =
            parse_envelope(text).inspect_err(|e| self.decode_failed(session, None, e))?;
        let mut instance = self.acquire(session, tag)?;
        instance
            .read_json(payload)
            .inspect_err(|e| self.decode_failed(session, Some(tag), e))?;

        self.enqueue(session, instance)
    }
}

impl fmt::Debug for Inbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox")
            .field("pending", &self.len())
            .field("max_pending", &self.max_pending)
            .finish()
    }
}

type ErasedHandler<O> = dyn Fn(&mut O, &Arc<Session>, &dyn NetData) -> Result<()> + Send;

struct Binding<O> {
    variant: &'static str,
    call: Box<ErasedHandler<O>>,
}

/// Tag-to-handler table plus the queue feeding it
pub struct Dispatcher<O> {
    inbox: Arc<Inbox>,
    handlers: HashMap<Tag, Binding<O>>,
    registry: Arc<MessageRegistry>,
    metrics: Arc<Metrics>,
}

impl<O: 'static> Dispatcher<O> {
    pub fn new(ctx: &NetContext) -> Self {
        Self {
            inbox: Arc::new(Inbox::new(ctx)),
            handlers: HashMap::new(),
            registry: ctx.registry().clone(),
            metrics: ctx.metrics().clone(),
        }
    }

    /// Bind `handler` to `M::TAG`. A later binding for the same tag replaces
    /// the earlier one.
    pub fn bind<M, F>(&mut self, handler: F) -> &mut Self
    where
        M: Message,
        F: Fn(&mut O, &Arc<Session>, &M) -> Result<()> + Send + 'static,
    {
        match self.registry.lookup(M::TAG) {
            Ok(proto) if !proto.is::<M>() => warn!(
                tag = M::TAG,
                registered = proto.type_name(),
                bound = std::any::type_name::<M>(),
                "Handler bound for a variant the registry does not decode under this tag"
            ),
            Err(_) => warn!(
                tag = M::TAG,
                bound = std::any::type_name::<M>(),
                "Handler bound for an unregistered tag, it will never run"
            ),
            Ok(_) => {}
        }

        let call = move |owner: &mut O, session: &Arc<Session>, data: &dyn NetData| {
            let message = data.downcast_ref::<M>().ok_or_else(|| {
                ProtocolError::Custom(format!(
                    "{}: expected {}, got {}",
                    constants::ERR_TYPE_MISMATCH,
                    std::any::type_name::<M>(),
                    data.type_name()
                ))
            })?;
            handler(owner, session, message)
        };
        self.insert(M::TAG, std::any::type_name::<M>(), Box::new(call));
        self
    }

    /// Bind a handler that receives the instance untyped
    pub fn bind_raw<F>(&mut self, tag: Tag, handler: F) -> &mut Self
    where
        F: Fn(&mut O, &Arc<Session>, &dyn NetData) -> Result<()> + Send + 'static,
    {
        let variant = self
            .registry
            .lookup(tag)
            .map(|p| p.type_name())
            .unwrap_or("<unregistered>");
        self.insert(tag, variant, Box::new(handler));
        self
    }

    fn insert(&mut self, tag: Tag, variant: &'static str, call: Box<ErasedHandler<O>>) {
        if let Some(previous) = self.handlers.insert(tag, Binding { variant, call }) {
            warn!(
                tag,
                replaced = previous.variant,
                by = variant,
                "Handler binding collision, later binding wins"
            );
        } else {
            debug!(tag, variant, "Bound handler");
        }
    }

    pub fn is_bound(&self, tag: Tag) -> bool {
        self.handlers.contains_key(&tag)
    }

    /// Bound tags in ascending order
    pub fn bound_tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Shared receive side to hand to every session
    pub fn data_handler(&self) -> Arc<dyn DataHandler> {
        self.inbox.clone()
    }

    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    /// Decode a binary frame and queue it
    pub fn on_binary(&self, session: &Arc<Session>, data: impl Into<Bytes>) -> Result<()> {
        self.inbox.on_binary(session, data.into())
    }

    /// Decode a text envelope and queue it
    pub fn on_text(&self, session: &Arc<Session>, text: &str) -> Result<()> {
        self.inbox.on_text(session, text)
    }

    /// Messages waiting for the next tick
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Variant name of the handler bound to `tag`
    pub fn bound_variant(&self, tag: Tag) -> Result<&'static str> {
        self.binding(tag).map(|b| b.variant)
    }

    fn binding(&self, tag: Tag) -> Result<&Binding<O>> {
        self.handlers.get(&tag).ok_or(ProtocolError::NoHandlerBound(tag))
    }

    /// Run the bound handler for every message queued at call time.
    ///
    /// Returns how many handlers ran. Messages arriving during the tick wait
    /// for the next one. A handler that errors or panics is logged and
    /// counted, and the rest of the batch still runs. Every instance goes
    /// back to the pool afterwards.
    pub fn tick(&self, owner: &mut O) -> usize {
        let budget = self.inbox.len();
        if budget == 0 {
            return 0;
        }
        let _timer = Timer::start("dispatch_tick");

        let mut invoked = 0;
        for _ in 0..budget {
            let Some(PendingMessage { session, data }) = self.inbox.pop() else {
                break;
            };
            let tag = data.tag();
            let binding = match self.binding(tag) {
                Ok(binding) => binding,
                Err(e) => {
                    self.metrics.message_dropped(DropReason::NoHandler);
                    warn!(
                        tag,
                        session = session.id(),
                        variant = data.type_name(),
                        error = %e,
                        "Message dropped"
                    );
                    continue;
                }
            };

            invoked += 1;
            self.metrics.message_dispatched();
            let call = &binding.call;
            match catch_unwind(AssertUnwindSafe(|| call(&mut *owner, &session, &*data))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.metrics.handler_error();
                    warn!(tag, session = session.id(), error = %e, "Handler returned an error");
                }
                Err(_) => {
                    self.metrics.handler_error();
                    error!(
                        tag,
                        session = session.id(),
                        variant = binding.variant,
                        "Handler panicked"
                    );
                }
            }
        }
        invoked
    }
}

impl<O: 'static> fmt::Debug for Dispatcher<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bound", &self.bound_tags())
            .field("inbox", &self.inbox)
            .finish()
    }
}
