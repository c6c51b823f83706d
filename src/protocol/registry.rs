//! # Message Registry
//!
//! Immutable `Tag -> prototype` table built once at startup from an explicit
//! list of variants. A prototype is a zero-valued instance used to create
//! fresh instances of its variant.
//!
//! Two variants registered under the same tag keep last-write-wins
//! semantics, but the collision is logged and recorded so it can be reported
//! (or rejected with [`RegistryBuilder::try_build`]).
//!
//! ```rust
//! use net_dispatch::protocol::registry::MessageRegistry;
//! use net_dispatch::protocol::messages::{DemoMessage, register_all};
//!
//! let registry = register_all(MessageRegistry::builder()).build();
//! let proto = registry.lookup(10).expect("registered");
//! assert_eq!(proto.downcast_ref::<DemoMessage>(), Some(&DemoMessage::default()));
//! assert!(registry.lookup(255).is_err());
//! ```

use crate::error::{ProtocolError, Result};
use crate::protocol::message::{Message, NetData, Tag};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A tag claimed by more than one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCollision {
    pub tag: Tag,
    /// Variant that was overwritten
    pub replaced: &'static str,
    /// Variant that now owns the tag
    pub by: &'static str,
}

/// Collects variants before the registry is frozen
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    prototypes: BTreeMap<Tag, Box<dyn NetData>>,
    collisions: Vec<TagCollision>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register variant `M` under `M::TAG`
    pub fn register<M: Message>(self) -> Self {
        self.register_prototype(Box::new(M::default()))
    }

    /// Register an already boxed prototype under its own tag
    pub fn register_prototype(mut self, mut prototype: Box<dyn NetData>) -> Self {
        prototype.reset();
        let tag = prototype.tag();
        let name = prototype.type_name();
        if let Some(previous) = self.prototypes.insert(tag, prototype) {
            warn!(
                tag,
                replaced = previous.type_name(),
                by = name,
                "Message tag collision, later registration wins"
            );
            self.collisions.push(TagCollision {
                tag,
                replaced: previous.type_name(),
                by: name,
            });
        } else {
            debug!(tag, variant = name, "Registered message variant");
        }
        self
    }

    /// Collisions seen so far
    pub fn collisions(&self) -> &[TagCollision] {
        &self.collisions
    }

    /// Freeze the registry, keeping last-write-wins on collisions
    pub fn build(self) -> MessageRegistry {
        MessageRegistry {
            prototypes: self.prototypes,
            collisions: self.collisions,
        }
    }

    /// Freeze the registry, rejecting any tag collision
    pub fn try_build(self) -> Result<MessageRegistry> {
        if let Some(first) = self.collisions.first() {
            return Err(ProtocolError::ConfigError(format!(
                "Tag {} registered by both {} and {} ({} collision(s) total)",
                first.tag,
                first.replaced,
                first.by,
                self.collisions.len()
            )));
        }
        Ok(self.build())
    }
}

/// Immutable table of every known message variant
#[derive(Debug)]
pub struct MessageRegistry {
    prototypes: BTreeMap<Tag, Box<dyn NetData>>,
    collisions: Vec<TagCollision>,
}

impl MessageRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry holding every variant from [`crate::protocol::messages`]
    pub fn register_all() -> Self {
        crate::protocol::messages::register_all(Self::builder()).build()
    }

    /// Zero-valued prototype for `tag`
    pub fn lookup(&self, tag: Tag) -> Result<&dyn NetData> {
        self.prototypes
            .get(&tag)
            .map(|p| p.as_ref())
            .ok_or(ProtocolError::UnknownTag(tag))
    }

    /// Fresh zero-valued instance for `tag`
    pub fn instantiate(&self, tag: Tag) -> Result<Box<dyn NetData>> {
        self.lookup(tag).map(|p| p.new_default())
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.prototypes.contains_key(&tag)
    }

    /// Registered tags in ascending order
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.prototypes.keys().copied()
    }

    pub fn prototypes(&self) -> impl Iterator<Item = &dyn NetData> + '_ {
        self.prototypes.values().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// Tag collisions detected while building
    pub fn collisions(&self) -> &[TagCollision] {
        &self.collisions
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Alpha {
        a: i32,
    }

    impl Message for Alpha {
        const TAG: Tag = 1;
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Beta {
        b: String,
    }

    impl Message for Beta {
        const TAG: Tag = 1;
    }

    #[test]
    fn test_lookup_returns_zero_valued_prototype() {
        let registry = MessageRegistry::builder().register::<Alpha>().build();
        let proto = registry.lookup(1).unwrap();
        assert_eq!(proto.downcast_ref::<Alpha>(), Some(&Alpha { a: 0 }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_tag_is_recoverable() {
        let registry = MessageRegistry::builder().register::<Alpha>().build();
        let err = registry.lookup(255).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(255)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_collision_last_write_wins_and_is_reported() {
        let builder = MessageRegistry::builder()
            .register::<Alpha>()
            .register::<Beta>();
        assert_eq!(builder.collisions().len(), 1);

        let registry = builder.build();
        assert!(registry.lookup(1).unwrap().is::<Beta>());
        let collision = &registry.collisions()[0];
        assert_eq!(collision.tag, 1);
        assert!(collision.replaced.ends_with("Alpha"));
        assert!(collision.by.ends_with("Beta"));
    }

    #[test]
    fn test_try_build_rejects_collisions() {
        let result = MessageRegistry::builder()
            .register::<Alpha>()
            .register::<Beta>()
            .try_build();
        assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
    }

    #[test]
    fn test_register_prototype_resets_fields() {
        let registry = MessageRegistry::builder()
            .register_prototype(Box::new(Alpha { a: 99 }))
            .build();
        assert_eq!(
            registry.lookup(1).unwrap().downcast_ref::<Alpha>(),
            Some(&Alpha::default())
        );
    }

    #[test]
    fn test_register_all_contains_builtins() {
        let registry = MessageRegistry::register_all();
        let tags: Vec<Tag> = registry.tags().collect();
        assert_eq!(tags, vec![5, 6, 9, 10, 11, 13, 16, 20]);
        assert!(registry.collisions().is_empty());
        let fresh = registry.instantiate(6).unwrap();
        assert_eq!(fresh.tag(), 6);
    }
}
