//! Hook points for observing resolutions and releases.
//!
//! Every class lookup, member lookup, promotion, thread attach and reference
//! release reports `attempt`, then either `success` or `failure`, to the
//! [`Observer`] injected into the [`EnvAccessor`](crate::EnvAccessor). The
//! default is [`NoopObserver`]. [`TracingObserver`] turns every hook into a
//! `tracing` event.
//!
//! Cache hits do not fire hooks; only real native work does.

use std::fmt;

use crate::class::{ClassName, MemberDescriptor, MemberKind};
use crate::error::BridgeError;

/// Which kind of reference a release hook is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Global,
    Local,
}

/// The operation a hook fired for.
#[derive(Debug, Clone, Copy)]
pub enum Hook<'a> {
    /// Attaching the calling thread.
    Attach,
    /// Resolving a class by name.
    Class(&'a ClassName),
    /// Resolving a method or field id.
    Member {
        class: &'a ClassName,
        member: &'a MemberDescriptor,
        kind: MemberKind,
    },
    /// Promoting a reference to a global reference.
    Promote,
    /// Deleting a reference.
    Release(RefKind),
}

impl fmt::Display for Hook<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Attach => f.write_str("attach"),
            Hook::Class(name) => write!(f, "class {name}"),
            Hook::Member { class, member, kind } => write!(f, "{kind} {class}.{member}"),
            Hook::Promote => f.write_str("promote"),
            Hook::Release(RefKind::Global) => f.write_str("release global"),
            Hook::Release(RefKind::Local) => f.write_str("release local"),
        }
    }
}

/// Receives hook notifications. All methods default to doing nothing.
///
/// Hooks may fire while the metadata cache lock is held; implementations must
/// not call back into the cache.
pub trait Observer: Send + Sync {
    fn attempt(&self, _hook: &Hook<'_>) {}

    fn success(&self, _hook: &Hook<'_>) {}

    fn failure(&self, _hook: &Hook<'_>, _error: &BridgeError) {}
}

/// The default observer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Forwards hooks to `tracing`: attempts and successes at `trace`/`debug`,
/// failures at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn attempt(&self, hook: &Hook<'_>) {
        tracing::trace!(target: "jni_bridge::hooks", hook = %hook, "attempt");
    }

    fn success(&self, hook: &Hook<'_>) {
        tracing::debug!(target: "jni_bridge::hooks", hook = %hook, "success");
    }

    fn failure(&self, hook: &Hook<'_>, error: &BridgeError) {
        tracing::warn!(target: "jni_bridge::hooks", hook = %hook, error = %error, "failure");
    }
}
