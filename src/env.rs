//! Thread-affine access to the native bridge.
//!
//! Each [`EnvAccessor`] remembers, per OS thread, the environment pointer the
//! bridge handed out when that thread was first attached. The memo lives in
//! thread-local storage keyed by the accessor's identity, so independent
//! accessors (one per test, say) never see each other's environments.
//!
//! An [`Env`] is only valid on the thread that produced it; the type is
//! `!Send` to keep it there.
//!
//! ```rust,ignore
//! let env = accessor.current()?;
//! let class = env.find_class("java/lang/String");
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::bridge::{EnvPtr, NativeBridge};
use crate::error::{BridgeError, Result};
use crate::observer::{Hook, NoopObserver, Observer};
use crate::refs::LocalRef;
use crate::sys::{jbyte, jbyteArray, jclass, jfieldID, jint, jmethodID, jobject, jsize, jstring, jvalue};

static NEXT_ACCESSOR_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    /// accessor id -> environment of this thread
    static ATTACHED: RefCell<FxHashMap<usize, EnvPtr>> = RefCell::new(FxHashMap::default());
}

/// Hands out the calling thread's [`Env`], attaching the thread on first use.
///
/// Owns the injected [`NativeBridge`] and the [`Observer`] that receives
/// attach, resolution and release hooks.
pub struct EnvAccessor {
    id: usize,
    bridge: Arc<dyn NativeBridge>,
    observer: Arc<dyn Observer>,
}

impl EnvAccessor {
    /// Creates an accessor with the no-op observer.
    pub fn new(bridge: Arc<dyn NativeBridge>) -> Self {
        Self::with_observer(bridge, Arc::new(NoopObserver))
    }

    pub fn with_observer(bridge: Arc<dyn NativeBridge>, observer: Arc<dyn Observer>) -> Self {
        EnvAccessor {
            id: NEXT_ACCESSOR_ID.fetch_add(1, Ordering::Relaxed),
            bridge,
            observer,
        }
    }

    pub fn bridge(&self) -> &dyn NativeBridge {
        &*self.bridge
    }

    pub fn observer(&self) -> &dyn Observer {
        &*self.observer
    }

    /// Returns the environment of the calling thread.
    ///
    /// The first call on a thread attaches it through the bridge. Later calls
    /// confirm with [`NativeBridge::get_env`] that the thread is still attached
    /// and attach it again if the host detached it in the meantime. A failed
    /// attach is not remembered, so the next call retries.
    ///
    /// Inside thread-local destructors the memo may already be gone; the
    /// thread is then attached for this one call.
    pub fn current(self: &Arc<Self>) -> Result<Env<'_>> {
        let memo = ATTACHED
            .try_with(|attached| attached.borrow().get(&self.id).copied())
            .ok()
            .flatten();
        if let Some(memo) = memo {
            match self.bridge.get_env() {
                Ok(raw) => {
                    if raw != memo {
                        self.remember(raw);
                    }
                    return Ok(Env::new(self, raw));
                }
                Err(code) => {
                    tracing::debug!(accessor = self.id, code, "thread was detached by the host");
                    self.forget();
                }
            }
        }

        let hook = Hook::Attach;
        self.observer.attempt(&hook);
        match self.bridge.attach_current_thread() {
            Ok(raw) => {
                self.remember(raw);
                tracing::debug!(accessor = self.id, "attached current thread");
                self.observer.success(&hook);
                Ok(Env::new(self, raw))
            }
            Err(code) => {
                let err = BridgeError::ThreadAttachFailed(code);
                tracing::warn!(accessor = self.id, code, "failed to attach current thread");
                self.observer.failure(&hook, &err);
                Err(err)
            }
        }
    }

    /// Whether the calling thread already holds a memoized environment.
    pub fn is_attached(&self) -> bool {
        ATTACHED
            .try_with(|attached| attached.borrow().contains_key(&self.id))
            .unwrap_or(false)
    }

    /// Detaches the calling thread and forgets its environment.
    ///
    /// Never called implicitly: when threads detach is the host's decision.
    /// Global references owned by this thread's wrappers attach it again when
    /// they are released.
    ///
    /// # Safety
    ///
    /// No [`Env`], [`LocalRef`] or local [`ClassHandle`](crate::ClassHandle)
    /// obtained on this thread may be used or dropped afterwards. Local
    /// references die with the detach and deleting them later is undefined
    /// behavior in the JVM.
    pub unsafe fn detach_current(&self) -> Result<()> {
        self.forget();
        self.bridge
            .detach_current_thread()
            .map_err(BridgeError::ThreadDetachFailed)?;
        tracing::debug!(accessor = self.id, "detached current thread");
        Ok(())
    }

    fn remember(&self, raw: EnvPtr) {
        // the slot is gone while thread-local destructors run
        let _ = ATTACHED.try_with(|attached| attached.borrow_mut().insert(self.id, raw));
    }

    fn forget(&self) {
        let _ = ATTACHED.try_with(|attached| attached.borrow_mut().remove(&self.id));
    }
}

/// Removes the calling thread's memo. Other threads keep their entry until
/// they exit; accessor ids are never reused, so a stale entry is never read.
impl Drop for EnvAccessor {
    fn drop(&mut self) {
        self.forget();
    }
}

impl std::fmt::Debug for EnvAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvAccessor").field("id", &self.id).finish_non_exhaustive()
    }
}

/// The calling thread's handle onto the native bridge.
///
/// Every method delegates straight to the bridge with this thread's
/// environment pointer. Nothing is cached at this layer.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    accessor: &'a Arc<EnvAccessor>,
    raw: EnvPtr,
    _thread_bound: PhantomData<*const ()>,
}

impl<'a> Env<'a> {
    fn new(accessor: &'a Arc<EnvAccessor>, raw: EnvPtr) -> Self {
        Env {
            accessor,
            raw,
            _thread_bound: PhantomData,
        }
    }

    /// The accessor this environment came from.
    pub fn accessor(&self) -> &'a Arc<EnvAccessor> {
        self.accessor
    }

    /// Returns the raw environment pointer.
    pub fn raw(&self) -> EnvPtr {
        self.raw
    }

    fn bridge(&self) -> &'a dyn NativeBridge {
        &*self.accessor.bridge
    }

    // =========================================================================
    // Classes and members
    // =========================================================================

    pub fn find_class(&self, name: &str) -> Option<jclass> {
        self.bridge().find_class(self.raw, name)
    }

    pub fn get_method_id(&self, class: jclass, name: &str, sig: &str) -> Option<jmethodID> {
        self.bridge().get_method_id(self.raw, class, name, sig)
    }

    pub fn get_static_method_id(&self, class: jclass, name: &str, sig: &str) -> Option<jmethodID> {
        self.bridge().get_static_method_id(self.raw, class, name, sig)
    }

    pub fn get_field_id(&self, class: jclass, name: &str, sig: &str) -> Option<jfieldID> {
        self.bridge().get_field_id(self.raw, class, name, sig)
    }

    pub fn get_static_field_id(&self, class: jclass, name: &str, sig: &str) -> Option<jfieldID> {
        self.bridge().get_static_field_id(self.raw, class, name, sig)
    }

    pub fn get_object_class(&self, obj: jobject) -> Option<jclass> {
        self.bridge().get_object_class(self.raw, obj)
    }

    // =========================================================================
    // References
    // =========================================================================

    pub fn new_global_ref(&self, obj: jobject) -> Option<jobject> {
        self.bridge().new_global_ref(self.raw, obj)
    }

    pub fn delete_global_ref(&self, obj: jobject) {
        self.bridge().delete_global_ref(self.raw, obj)
    }

    pub fn delete_local_ref(&self, obj: jobject) {
        self.bridge().delete_local_ref(self.raw, obj)
    }

    pub fn is_same_object(&self, a: jobject, b: jobject) -> bool {
        self.bridge().is_same_object(self.raw, a, b)
    }

    // =========================================================================
    // Objects and invocation
    // =========================================================================

    pub fn new_object(&self, class: jclass, ctor: jmethodID, args: &[jvalue]) -> Option<jobject> {
        self.bridge().new_object(self.raw, class, ctor, args)
    }

    pub fn call_object_method(&self, obj: jobject, method: jmethodID, args: &[jvalue]) -> jobject {
        self.bridge().call_object_method(self.raw, obj, method, args)
    }

    pub fn call_int_method(&self, obj: jobject, method: jmethodID, args: &[jvalue]) -> jint {
        self.bridge().call_int_method(self.raw, obj, method, args)
    }

    pub fn call_void_method(&self, obj: jobject, method: jmethodID, args: &[jvalue]) {
        self.bridge().call_void_method(self.raw, obj, method, args)
    }

    pub fn call_static_object_method(&self, class: jclass, method: jmethodID, args: &[jvalue]) -> jobject {
        self.bridge().call_static_object_method(self.raw, class, method, args)
    }

    pub fn call_static_int_method(&self, class: jclass, method: jmethodID, args: &[jvalue]) -> jint {
        self.bridge().call_static_int_method(self.raw, class, method, args)
    }

    pub fn call_static_void_method(&self, class: jclass, method: jmethodID, args: &[jvalue]) {
        self.bridge().call_static_void_method(self.raw, class, method, args)
    }

    pub fn get_object_field(&self, obj: jobject, field: jfieldID) -> jobject {
        self.bridge().get_object_field(self.raw, obj, field)
    }

    pub fn get_int_field(&self, obj: jobject, field: jfieldID) -> jint {
        self.bridge().get_int_field(self.raw, obj, field)
    }

    pub fn set_int_field(&self, obj: jobject, field: jfieldID, value: jint) {
        self.bridge().set_int_field(self.raw, obj, field, value)
    }

    pub fn get_static_object_field(&self, class: jclass, field: jfieldID) -> jobject {
        self.bridge().get_static_object_field(self.raw, class, field)
    }

    // =========================================================================
    // Exceptions
    // =========================================================================

    pub fn exception_check(&self) -> bool {
        self.bridge().exception_check(self.raw)
    }

    pub fn exception_clear(&self) {
        self.bridge().exception_clear(self.raw)
    }

    /// Clears a pending exception, reporting whether there was one.
    pub fn take_exception(&self) -> bool {
        if self.exception_check() {
            tracing::debug!("clearing pending Java exception");
            self.exception_clear();
            true
        } else {
            false
        }
    }

    // =========================================================================
    // Strings and byte arrays
    // =========================================================================

    pub fn new_string_utf(&self, value: &str) -> Option<jstring> {
        self.bridge().new_string_utf(self.raw, value)
    }

    pub fn get_string_utf(&self, value: jstring) -> Option<String> {
        if value.is_null() {
            return None;
        }
        self.bridge().get_string_utf(self.raw, value)
    }

    /// Creates a Java `byte[]` holding a copy of `data`.
    pub fn new_byte_array(&self, data: &[u8]) -> Result<LocalRef<'a>> {
        let len = jsize::try_from(data.len()).map_err(|_| BridgeError::AllocationFailed("byte[]"))?;
        let array = self
            .bridge()
            .new_byte_array(self.raw, len)
            .ok_or(BridgeError::AllocationFailed("byte[]"))?;
        let array = LocalRef::new(*self, array);
        if !data.is_empty() {
            let bytes: Vec<jbyte> = data.iter().map(|&b| b as jbyte).collect();
            self.bridge().set_byte_array_region(self.raw, array.get(), 0, &bytes);
        }
        if self.take_exception() {
            return Err(BridgeError::AllocationFailed("byte[]"));
        }
        Ok(array)
    }

    /// Copies the contents of a Java `byte[]` out.
    pub fn byte_array_to_vec(&self, array: jbyteArray) -> Vec<u8> {
        if array.is_null() {
            return Vec::new();
        }
        let len = self.bridge().get_array_length(self.raw, array).max(0) as usize;
        let mut buf: Vec<jbyte> = vec![0; len];
        if len > 0 {
            self.bridge().get_byte_array_region(self.raw, array, 0, &mut buf);
        }
        buf.into_iter().map(|b| b as u8).collect()
    }
}

impl std::fmt::Debug for Env<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env").field("raw", &self.raw.as_raw()).finish()
    }
}
