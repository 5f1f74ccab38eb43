//! Turns a human-chosen `(identity, label)` pair into a root CID that
//! changes over time — the naming layer the tree engine and exchange
//! coordinator never depend on directly, but the application layer needs
//! to find anything at all.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use tree_core::Cid;

/// Build the resolver key for `(identity, label)`. Labels are arbitrary
/// UTF-8 and neither trimmed nor case-folded.
#[must_use]
pub fn resolver_key(identity: &str, label: &str) -> String {
    format!("{identity}/{label}")
}

/// Who can read a published mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    /// Anyone can resolve the key.
    Public,
    /// Only holders of the wrapped key material published alongside it.
    LinkVisible,
}

/// Options for [`NameResolver::publish`].
#[derive(Clone, Debug, Default)]
pub struct PublishOptions {
    /// Visibility of the new mapping. `None` keeps the resolver's default.
    pub visibility: Option<Visibility>,
    /// Key material wrapped for a link-visible share, opaque to the
    /// resolver itself.
    pub wrapped_key: Option<Vec<u8>>,
}

/// One entry from [`NameResolver::list`].
#[derive(Clone, Debug)]
pub struct ListedName {
    /// The label under the listed identity.
    pub label: String,
    /// The CID currently published at that label.
    pub cid: Cid,
    /// Visibility, if the resolver tracks it.
    pub visibility: Option<Visibility>,
}

/// A callback invoked with each observed value for a subscribed key,
/// including the first.
pub type ResolveCallback = Box<dyn Fn(Option<Cid>) + Send + Sync>;

/// A callback invoked with the current listing for a subscribed identity,
/// each time it changes.
pub type ListCallback = Box<dyn Fn(Vec<ListedName>) + Send + Sync>;

/// Name resolution the application layer consumes; transport is out of
/// scope, so the tree engine and exchange layer never depend on it.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// One-shot lookup; may be slow.
    async fn resolve(&self, key: &str) -> Option<Cid>;

    /// Streaming lookup: `callback` fires on every observed value for
    /// `key`, including the first.
    async fn subscribe(&self, key: &str, callback: ResolveCallback);

    /// Streaming list of every label published under `identity`.
    async fn list(&self, identity: &str, callback: ListCallback);

    /// Publish a new mapping. Returns `false` if the resolver rejected the
    /// write (e.g. the caller does not own `identity`).
    async fn publish(&self, key: &str, cid: Cid, options: PublishOptions) -> bool;
}
