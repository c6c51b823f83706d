//! # Message Instance Pool
//!
//! Per-tag pool of reusable message instances for the receive path. The
//! network thread acquires an instance, decodes into it and queues it; the
//! tick thread hands it to a handler and returns it.
//!
//! ## Ownership
//! [`NetDataPool::acquire`] returns a [`Pooled`] handle that owns the
//! instance exclusively. Dropping the handle releases the instance back to
//! its tag's pool, so a decode failure or a missing handler can never leak
//! pooled capacity. Moving the handle transfers ownership.
//!
//! ## Reset
//! Instances are reset lazily: exactly once per `acquire` of a reused
//! instance, never on release.
//!
//! ## Usage
//! ```rust
//! use net_dispatch::protocol::messages::DemoMessage;
//! use net_dispatch::protocol::registry::MessageRegistry;
//! use net_dispatch::utils::pool::NetDataPool;
//!
//! let registry = MessageRegistry::register_all();
//! let pool = NetDataPool::new(&registry);
//!
//! let mut msg = pool.acquire(10)?;
//! msg.downcast_mut::<DemoMessage>().unwrap().message = "hello".into();
//! drop(msg); // back to the pool
//!
//! let msg = pool.acquire(10)?;
//! assert_eq!(msg.downcast_ref::<DemoMessage>().unwrap().message, "");
//! # Ok::<(), net_dispatch::error::ProtocolError>(())
//! ```

use crate::error::{ProtocolError, Result};
use crate::protocol::message::{NetData, Tag};
use crate::protocol::registry::MessageRegistry;
use std::collections::HashMap;
use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

/// Maximum idle instances retained per tag
pub const DEFAULT_MAX_IDLE_PER_TAG: usize = 256;

struct TypePool {
    prototype: Box<dyn NetData>,
    idle: Mutex<Vec<Box<dyn NetData>>>,
}

struct PoolInner {
    pools: HashMap<Tag, TypePool>,
    max_idle: usize,
}

impl PoolInner {
    fn release(&self, data: Box<dyn NetData>) {
        let Some(pool) = self.pools.get(&data.tag()) else {
            // Not ours; let it be deallocated
            return;
        };
        if let Ok(mut idle) = pool.idle.lock() {
            if idle.len() < self.max_idle {
                idle.push(data);
            }
        }
    }
}

/// A pooled message instance that returns itself to the pool when dropped
pub struct Pooled {
    data: ManuallyDrop<Box<dyn NetData>>,
    pool: Arc<PoolInner>,
}

impl Pooled {
    fn new(data: Box<dyn NetData>, pool: Arc<PoolInner>) -> Self {
        Self {
            data: ManuallyDrop::new(data),
            pool,
        }
    }

    /// Take the instance out of the pool's custody for good
    pub fn detach(self) -> Box<dyn NetData> {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so each field is moved out
        // exactly once and never touched again.
        unsafe {
            drop(std::ptr::read(&this.pool));
            ManuallyDrop::take(&mut this.data)
        }
    }
}

impl Drop for Pooled {
    fn drop(&mut self) {
        // SAFETY: `data` is not accessed after this point.
        let data = unsafe { ManuallyDrop::take(&mut self.data) };
        self.pool.release(data);
    }
}

impl std::ops::Deref for Pooled {
    type Target = dyn NetData;

    fn deref(&self) -> &Self::Target {
        &**self.data
    }
}

impl std::ops::DerefMut for Pooled {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.data
    }
}

impl fmt::Debug for Pooled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&&**self.data).finish()
    }
}

/// Thread-safe pool of message instances keyed by tag
#[derive(Clone)]
pub struct NetDataPool {
    inner: Arc<PoolInner>,
}

impl NetDataPool {
    /// One pool per tag known to `registry`
    pub fn new(registry: &MessageRegistry) -> Self {
        Self::with_max_idle(registry, DEFAULT_MAX_IDLE_PER_TAG)
    }

    pub fn with_max_idle(registry: &MessageRegistry, max_idle: usize) -> Self {
        let pools = registry
            .prototypes()
            .map(|proto| {
                (
                    proto.tag(),
                    TypePool {
                        prototype: proto.new_default(),
                        idle: Mutex::new(Vec::new()),
                    },
                )
            })
            .collect();

        Self {
            inner: Arc::new(PoolInner { pools, max_idle }),
        }
    }

    /// Acquire a zero-valued instance for `tag`, reusing an idle one when
    /// available
    pub fn acquire(&self, tag: Tag) -> Result<Pooled> {
        let pool = self
            .inner
            .pools
            .get(&tag)
            .ok_or(ProtocolError::UnknownTag(tag))?;

        let reused = pool.idle.lock().ok().and_then(|mut idle| idle.pop());
        let data = match reused {
            Some(mut data) => {
                data.reset();
                data
            }
            None => pool.prototype.new_default(),
        };

        Ok(Pooled::new(data, self.inner.clone()))
    }

    /// Return a detached instance. Instances of unknown tags are dropped.
    pub fn release(&self, data: Box<dyn NetData>) {
        self.inner.release(data);
    }

    /// Number of idle instances for `tag`
    pub fn available(&self, tag: Tag) -> usize {
        self.inner
            .pools
            .get(&tag)
            .and_then(|p| p.idle.lock().ok().map(|idle| idle.len()))
            .unwrap_or(0)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.inner.pools.contains_key(&tag)
    }

    /// Debug view of idle instances, exactly as they were released
    #[cfg(test)]
    fn idle_snapshot(&self, tag: Tag) -> Vec<Box<dyn NetData>> {
        self.inner
            .pools
            .get(&tag)
            .and_then(|p| {
                p.idle
                    .lock()
                    .ok()
                    .map(|idle| idle.iter().map(|d| d.clone_boxed()).collect())
            })
            .unwrap_or_default()
    }
}

impl fmt::Debug for NetDataPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetDataPool")
            .field("tags", &self.inner.pools.len())
            .field("max_idle", &self.inner.max_idle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::protocol::messages::{DemoMessage, HeartBeat};

    fn pool() -> NetDataPool {
        NetDataPool::new(&MessageRegistry::register_all())
    }

    #[test]
    fn test_acquire_unknown_tag() {
        assert!(matches!(
            pool().acquire(255),
            Err(ProtocolError::UnknownTag(255))
        ));
    }

    #[test]
    fn test_drop_returns_to_pool() {
        let pool = pool();
        assert_eq!(pool.available(10), 0);
        let msg = pool.acquire(10).unwrap();
        drop(msg);
        assert_eq!(pool.available(10), 1);
        let _again = pool.acquire(10).unwrap();
        assert_eq!(pool.available(10), 0);
    }

    #[test]
    fn test_reuse_is_reset_on_acquire_not_release() {
        let pool = pool();
        {
            let mut msg = pool.acquire(10).unwrap();
            msg.downcast_mut::<DemoMessage>().unwrap().message = "stale".into();
        }

        // Still populated while idle
        let idle = pool.idle_snapshot(10);
        assert_eq!(
            idle[0].downcast_ref::<DemoMessage>().unwrap().message,
            "stale"
        );

        let msg = pool.acquire(10).unwrap();
        assert_eq!(msg.downcast_ref::<DemoMessage>(), Some(&DemoMessage::default()));
    }

    #[test]
    fn test_detach_and_release() {
        let pool = pool();
        let mut msg = pool.acquire(9).unwrap();
        msg.downcast_mut::<HeartBeat>().unwrap().status = true;
        let owned = msg.detach();
        assert_eq!(pool.available(9), 0);

        pool.release(owned);
        assert_eq!(pool.available(9), 1);
        assert_eq!(
            pool.acquire(9).unwrap().downcast_ref::<HeartBeat>(),
            Some(&HeartBeat { status: false })
        );
    }

    #[test]
    fn test_detach_skips_release_on_drop() {
        let pool = pool();
        let kept = pool.acquire(9).unwrap();
        let detached = pool.acquire(9).unwrap().detach();
        assert_eq!(detached.tag(), 9);

        drop(kept);
        drop(detached);
        assert_eq!(pool.available(9), 1);
        assert_eq!(
            format!("{:?}", pool.acquire(9).unwrap()),
            "Pooled(HeartBeat { status: false })"
        );
    }

    #[test]
    fn test_max_idle_limit() {
        let pool = NetDataPool::with_max_idle(&MessageRegistry::register_all(), 1);
        let a = pool.acquire(10).unwrap();
        let b = pool.acquire(10).unwrap();
        drop(a);
        drop(b);
        assert_eq!(pool.available(10), 1);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = pool();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        let mut msg = pool.acquire(10).unwrap();
                        let demo = msg.downcast_mut::<DemoMessage>().unwrap();
                        assert!(demo.message.is_empty());
                        demo.message = i.to_string();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.available(10) <= 8);
    }
}
