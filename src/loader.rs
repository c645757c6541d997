//! Class loader delegates.
//!
//! `FindClass` only sees classes reachable from the loader of the calling
//! native frame. On threads attached from native code that is the bootstrap
//! loader, so application classes need a [`ClassLoader`] delegate.

use std::sync::OnceLock;

use crate::cache::MetadataCache;
use crate::class::{ClassHandle, ClassName, MethodId};
use crate::env::Env;
use crate::error::Result;
use crate::object::ObjectHandle;
use crate::refs::{GlobalRef, LocalRef};
use crate::sys::{jclass, jobject, jvalue};

const CLASS_LOADER: &str = "java/lang/ClassLoader";
const LOAD_CLASS: &str = "loadClass";
const LOAD_CLASS_SIG: &str = "(Ljava/lang/String;)Ljava/lang/Class;";

/// Loads a class the default lookup cannot see.
///
/// Called with the metadata cache lock held. Implementations may resolve
/// other classes and members through `cache` (the lock is recursive by
/// default) but must not ask for `name` itself.
pub trait ClassLoader: Send + Sync {
    /// Returns a local reference to the class, owned by the caller, or `None`.
    fn load_class(&self, cache: &MetadataCache, env: Env<'_>, name: &ClassName) -> Option<jclass>;
}

/// A delegate backed by a `java.lang.ClassLoader` instance.
///
/// Calls `loader.loadClass(binaryName)`. The `loadClass` method id is
/// resolved through the cache on first use.
pub struct JavaClassLoader {
    loader: GlobalRef,
    load_class: OnceLock<(ClassHandle, MethodId)>,
}

impl JavaClassLoader {
    /// Holds a new global reference to `loader`. `loader` itself is not consumed.
    pub fn new(env: Env<'_>, loader: jobject) -> Result<Self> {
        Ok(JavaClassLoader {
            loader: GlobalRef::promote(env, loader)?,
            load_class: OnceLock::new(),
        })
    }

    /// Uses a loader object already wrapped in an [`ObjectHandle`].
    pub fn from_object(loader: &ObjectHandle) -> Result<Self> {
        Ok(JavaClassLoader {
            loader: loader.global().try_clone()?,
            load_class: OnceLock::new(),
        })
    }

    pub fn as_raw(&self) -> jobject {
        self.loader.as_raw()
    }

    fn load_method(&self, cache: &MetadataCache) -> Option<MethodId> {
        if let Some((_, id)) = self.load_class.get() {
            return Some(*id);
        }
        let class = cache.get_class(&ClassName::new(CLASS_LOADER), None).ok()?;
        let id = class.method_id(cache, LOAD_CLASS, LOAD_CLASS_SIG).ok()?;
        Some(self.load_class.get_or_init(|| (class, id)).1)
    }
}

impl ClassLoader for JavaClassLoader {
    fn load_class(&self, cache: &MetadataCache, env: Env<'_>, name: &ClassName) -> Option<jclass> {
        // Resolving loadClass needs this class, so it can't come from loadClass.
        if name.as_str() == CLASS_LOADER {
            return env.find_class(CLASS_LOADER);
        }
        let method = self.load_method(cache)?;
        let binary_name = LocalRef::new(env, env.new_string_utf(&name.binary_name())?);
        let args = [jvalue { l: binary_name.get() }];
        let class = LocalRef::new(
            env,
            env.call_object_method(self.loader.as_raw(), method.as_raw(), &args),
        );
        if env.take_exception() {
            tracing::debug!(class = %name, "loadClass threw");
            return None;
        }
        if class.is_null() {
            None
        } else {
            Some(class.into_raw())
        }
    }
}

impl std::fmt::Debug for JavaClassLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JavaClassLoader").field("loader", &self.loader).finish()
    }
}
