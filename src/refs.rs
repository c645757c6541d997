//! RAII reference guards.
//!
//! - [`LocalRef`]: deletes a local reference when dropped. Tied to the
//!   [`Env`] (and therefore the thread) it was created on.
//! - [`GlobalRef`]: owns a global reference and deletes it exactly once when
//!   dropped, on whichever thread drops it.
//!
//! ```rust,ignore
//! let env = accessor.current()?;
//! let local = LocalRef::new(env, env.find_class("java/lang/String").unwrap());
//! let global = GlobalRef::promote(env, local.get())?;
//! // `local` is deleted here; `global` lives on until dropped
//! ```

use std::sync::Arc;

use crate::env::{Env, EnvAccessor};
use crate::error::{BridgeError, Result};
use crate::observer::{Hook, RefKind};
use crate::sys::jobject;

/// A guard that deletes a local reference when dropped.
pub struct LocalRef<'a> {
    env: Env<'a>,
    obj: jobject,
}

impl<'a> LocalRef<'a> {
    /// Takes ownership of `obj`. A null reference is accepted and never deleted.
    pub fn new(env: Env<'a>, obj: jobject) -> Self {
        LocalRef { env, obj }
    }

    /// Returns the underlying local reference.
    pub fn get(&self) -> jobject {
        self.obj
    }

    pub fn is_null(&self) -> bool {
        self.obj.is_null()
    }

    /// Gives up ownership without deleting the reference.
    pub fn into_raw(self) -> jobject {
        let obj = self.obj;
        std::mem::forget(self);
        obj
    }
}

impl Drop for LocalRef<'_> {
    fn drop(&mut self) {
        if !self.obj.is_null() {
            self.env.delete_local_ref(self.obj);
        }
    }
}

/// An owned global reference.
///
/// Created only by promotion, so a `GlobalRef` never holds null. Dropping it
/// deletes the reference through the dropping thread's environment; if that
/// thread cannot be attached the reference is leaked and the leak is reported
/// through `tracing` and the observer's failure hook.
pub struct GlobalRef {
    obj: jobject,
    accessor: Arc<EnvAccessor>,
}

// Global references stay valid on every thread until deleted, and deletion
// goes through the dropping thread's own environment.
unsafe impl Send for GlobalRef {}
unsafe impl Sync for GlobalRef {}

impl GlobalRef {
    /// Creates a new global reference to `obj`.
    ///
    /// The input reference is left untouched; its owner still has to release it.
    pub fn promote(env: Env<'_>, obj: jobject) -> Result<Self> {
        let observer = env.accessor().observer();
        let hook = Hook::Promote;
        observer.attempt(&hook);
        let global = if obj.is_null() { None } else { env.new_global_ref(obj) };
        match global {
            Some(global) if !global.is_null() => {
                observer.success(&hook);
                Ok(GlobalRef {
                    obj: global,
                    accessor: Arc::clone(env.accessor()),
                })
            }
            _ => {
                let err = BridgeError::ReferencePromotionFailed;
                observer.failure(&hook, &err);
                Err(err)
            }
        }
    }

    /// Creates another, independently owned global reference to the same object.
    pub fn try_clone(&self) -> Result<Self> {
        let env = self.accessor.current()?;
        GlobalRef::promote(env, self.obj)
    }

    /// Returns the underlying global reference.
    pub fn as_raw(&self) -> jobject {
        self.obj
    }

    pub fn accessor(&self) -> &Arc<EnvAccessor> {
        &self.accessor
    }
}

impl Drop for GlobalRef {
    fn drop(&mut self) {
        release(&self.accessor, self.obj, RefKind::Global);
    }
}

impl std::fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GlobalRef").field(&self.obj).finish()
    }
}

/// Deletes `obj` through the calling thread's environment.
pub(crate) fn release(accessor: &Arc<EnvAccessor>, obj: jobject, kind: RefKind) {
    let hook = Hook::Release(kind);
    let observer = accessor.observer();
    observer.attempt(&hook);
    match accessor.current() {
        Ok(env) => {
            match kind {
                RefKind::Global => env.delete_global_ref(obj),
                RefKind::Local => env.delete_local_ref(obj),
            }
            observer.success(&hook);
        }
        Err(err) => {
            tracing::warn!(?kind, error = %err, "no environment on this thread, reference leaked");
            observer.failure(&hook, &err);
        }
    }
}
