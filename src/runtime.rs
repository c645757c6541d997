//! The caller-facing entry point.
//!
//! [`JavaRuntime`] bundles an [`EnvAccessor`] and a [`MetadataCache`] built
//! from one injected [`NativeBridge`]. Independent runtimes share nothing, so
//! each test can build its own.
//!
//! ```rust,ignore
//! let runtime = JavaRuntime::builder(Arc::new(bridge))
//!     .observer(Arc::new(TracingObserver))
//!     .build();
//!
//! let list = runtime.new_instance("java/util/ArrayList", "()V", &[])?;
//! runtime.invoke(&list, "add", "(Ljava/lang/Object;)Z", &[JValue::Object(&item)])?;
//! ```

use std::sync::Arc;

use crate::bridge::NativeBridge;
use crate::cache::MetadataCache;
use crate::class::{ClassHandle, ClassName, FieldId, MethodId};
use crate::config::BridgeConfig;
use crate::env::{Env, EnvAccessor};
use crate::error::Result;
use crate::loader::ClassLoader;
use crate::object::{return_type, JValue, ObjectHandle, ReturnType, Value};
use crate::observer::{NoopObserver, Observer};
use crate::sync::LockMode;
use crate::sys::jobject;

/// Builder for [`JavaRuntime`].
pub struct JavaRuntimeBuilder {
    bridge: Arc<dyn NativeBridge>,
    observer: Arc<dyn Observer>,
    class_loader: Option<Arc<dyn ClassLoader>>,
    lock_mode: LockMode,
}

impl JavaRuntimeBuilder {
    /// Receives attach, resolution and release hooks. Defaults to [`NoopObserver`].
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Loader consulted when `FindClass` cannot see a class.
    pub fn class_loader(mut self, loader: Arc<dyn ClassLoader>) -> Self {
        self.class_loader = Some(loader);
        self
    }

    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    /// Takes the lock mode from a [`BridgeConfig`].
    pub fn config(self, config: &BridgeConfig) -> Self {
        self.lock_mode(config.get_lock_mode())
    }

    pub fn build(self) -> JavaRuntime {
        let accessor = Arc::new(EnvAccessor::with_observer(self.bridge, self.observer));
        let cache = MetadataCache::new(accessor, self.class_loader, self.lock_mode);
        JavaRuntime {
            cache: Arc::new(cache),
        }
    }
}

/// Class loading, member resolution, construction and invocation.
#[derive(Debug, Clone)]
pub struct JavaRuntime {
    cache: Arc<MetadataCache>,
}

impl JavaRuntime {
    pub fn builder(bridge: Arc<dyn NativeBridge>) -> JavaRuntimeBuilder {
        JavaRuntimeBuilder {
            bridge,
            observer: Arc::new(NoopObserver),
            class_loader: None,
            lock_mode: LockMode::default(),
        }
    }

    /// A runtime with the default observer, no class loader and a recursive lock.
    pub fn new(bridge: Arc<dyn NativeBridge>) -> Self {
        Self::builder(bridge).build()
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn accessor(&self) -> &Arc<EnvAccessor> {
        self.cache.accessor()
    }

    /// The calling thread's environment, attaching on first use.
    pub fn current_env(&self) -> Result<Env<'_>> {
        self.cache.accessor().current()
    }

    /// Detaches the calling thread. Only the host decides when to call this.
    ///
    /// # Safety
    ///
    /// Same contract as [`EnvAccessor::detach_current`]: nothing local to this
    /// thread may outlive the call.
    pub unsafe fn detach_current_thread(&self) -> Result<()> {
        self.cache.accessor().detach_current()
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    pub fn load_class(&self, name: impl Into<ClassName>, loader: Option<&dyn ClassLoader>) -> Result<ClassHandle> {
        self.cache.get_class(&name.into(), loader)
    }

    pub fn resolve_method(
        &self,
        class: &ClassHandle,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> Result<MethodId> {
        if is_static {
            self.cache.static_method_id(class, name, signature)
        } else {
            self.cache.method_id(class, name, signature)
        }
    }

    pub fn resolve_field(
        &self,
        class: &ClassHandle,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> Result<FieldId> {
        if is_static {
            self.cache.static_field_id(class, name, signature)
        } else {
            self.cache.field_id(class, name, signature)
        }
    }

    // =========================================================================
    // Objects
    // =========================================================================

    pub fn new_instance(
        &self,
        class: impl Into<ClassName>,
        ctor_signature: &str,
        args: &[JValue<'_>],
    ) -> Result<ObjectHandle> {
        ObjectHandle::new_instance(&self.cache, class, ctor_signature, args)
    }

    /// Wraps a raw object of unknown class, discovering the class by reflection.
    pub fn wrap_object(&self, obj: jobject) -> Result<ObjectHandle> {
        ObjectHandle::discover(&self.cache, obj)
    }

    /// Calls an instance method, dispatching on the descriptor's return type.
    ///
    /// Supports `V`, `I` and object/array returns; anything else fails with
    /// [`BridgeError::UnsupportedReturnType`](crate::BridgeError::UnsupportedReturnType)
    /// before any lookup happens.
    pub fn invoke(&self, object: &ObjectHandle, name: &str, signature: &str, args: &[JValue<'_>]) -> Result<Value> {
        match return_type(signature)? {
            ReturnType::Void => object.call_void_method(name, signature, args).map(|()| Value::Void),
            ReturnType::Int => object.call_int_method(name, signature, args).map(Value::Int),
            ReturnType::Object => object.call_object_method(name, signature, args).map(Value::Object),
        }
    }

    /// Calls a static method on a class, dispatching like [`invoke`](Self::invoke).
    pub fn invoke_static(&self, class: &ClassHandle, name: &str, signature: &str, args: &[JValue<'_>]) -> Result<Value> {
        match return_type(signature)? {
            ReturnType::Void => class
                .call_static_void_method(&self.cache, name, signature, args)
                .map(|()| Value::Void),
            ReturnType::Int => class
                .call_static_int_method(&self.cache, name, signature, args)
                .map(Value::Int),
            ReturnType::Object => class
                .call_static_object_method(&self.cache, name, signature, args)
                .map(Value::Object),
        }
    }

    pub fn get_static_object_field(&self, class: &ClassHandle, name: &str, signature: &str) -> Result<Option<ObjectHandle>> {
        class.get_static_object_field(&self.cache, name, signature)
    }
}
