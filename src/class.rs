//! Class names, member descriptors, member ids and the class reference wrapper.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::MetadataCache;
use crate::env::{Env, EnvAccessor};
use crate::error::{BridgeError, Result};
use crate::loader::ClassLoader;
use crate::observer::RefKind;
use crate::refs::{self, GlobalRef};
use crate::sys::{jclass, jfieldID, jmethodID};

// =========================================================================
// Names and descriptors
// =========================================================================

/// A fully qualified class name.
///
/// Accepts either `java/lang/String` or `java.lang.String` and stores the
/// slash-separated form, so both spellings compare equal and share one cache
/// entry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName(Arc<str>);

impl ClassName {
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        if name.contains('.') {
            ClassName(Arc::from(name.replace('.', "/")))
        } else {
            ClassName(Arc::from(name))
        }
    }

    /// The slash-separated form expected by `FindClass`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The dot-separated binary name expected by `ClassLoader.loadClass`.
    pub fn binary_name(&self) -> String {
        self.0.replace('/', ".")
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassName({})", &*self.0)
    }
}

impl From<&str> for ClassName {
    fn from(name: &str) -> Self {
        ClassName::new(name)
    }
}

impl From<String> for ClassName {
    fn from(name: String) -> Self {
        ClassName::new(name)
    }
}

impl From<&ClassName> for ClassName {
    fn from(name: &ClassName) -> Self {
        name.clone()
    }
}

/// A (name, signature) pair identifying a method or field.
///
/// The signature is passed to the JVM verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberDescriptor {
    name: Arc<str>,
    signature: Arc<str>,
}

impl MemberDescriptor {
    pub fn new(name: &str, signature: &str) -> Self {
        MemberDescriptor {
            name: Arc::from(name),
            signature: Arc::from(signature),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Display for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}

/// Instance/static × method/field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    StaticMethod,
    Field,
    StaticField,
}

impl MemberKind {
    pub fn is_static(self) -> bool {
        matches!(self, MemberKind::StaticMethod | MemberKind::StaticField)
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemberKind::Method => "method",
            MemberKind::StaticMethod => "static method",
            MemberKind::Field => "field",
            MemberKind::StaticField => "static field",
        })
    }
}

// =========================================================================
// Member ids
// =========================================================================

/// A resolved method id.
///
/// Method ids are not tied to a thread; they stay valid until their class is
/// unloaded, which cannot happen while the cache holds the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MethodId(jmethodID);

unsafe impl Send for MethodId {}
unsafe impl Sync for MethodId {}

impl MethodId {
    pub(crate) fn new(raw: jmethodID) -> Self {
        MethodId(raw)
    }

    pub fn as_raw(&self) -> jmethodID {
        self.0
    }
}

/// A resolved field id. Same validity rules as [`MethodId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FieldId(jfieldID);

unsafe impl Send for FieldId {}
unsafe impl Sync for FieldId {}

impl FieldId {
    pub(crate) fn new(raw: jfieldID) -> Self {
        FieldId(raw)
    }

    pub fn as_raw(&self) -> jfieldID {
        self.0
    }
}

// =========================================================================
// Class handles
// =========================================================================

/// A class reference plus its name.
///
/// Cloning shares the same underlying reference; the reference is released
/// exactly once, when the last clone is dropped. Handles returned by the
/// [`MetadataCache`] are always global and share the cache's own copy, so
/// dropping them never releases anything while the cache is alive.
#[derive(Clone)]
pub struct ClassHandle {
    inner: Arc<ClassInner>,
}

static NEXT_CLASS_IDENTITY: AtomicUsize = AtomicUsize::new(1);

struct ClassInner {
    /// Never reused, unlike the raw reference.
    identity: usize,
    name: ClassName,
    reference: ClassRef,
}

impl ClassInner {
    fn new(name: ClassName, reference: ClassRef) -> Arc<Self> {
        Arc::new(ClassInner {
            identity: NEXT_CLASS_IDENTITY.fetch_add(1, Ordering::Relaxed),
            name,
            reference,
        })
    }
}

enum ClassRef {
    Global(GlobalRef),
    Local { obj: jclass, accessor: Arc<EnvAccessor> },
}

// Global class references are valid on every thread. Local ones can only be
// created through `ClassHandle::wrap_local`, whose caller promises to keep the
// handle on its creating thread.
unsafe impl Send for ClassInner {}
unsafe impl Sync for ClassInner {}

impl Drop for ClassInner {
    fn drop(&mut self) {
        if let ClassRef::Local { obj, accessor } = &self.reference {
            refs::release(accessor, *obj, RefKind::Local);
        }
    }
}

impl ClassHandle {
    /// Loads a class through the cache.
    pub fn load(
        cache: &MetadataCache,
        name: impl Into<ClassName>,
        loader: Option<&dyn ClassLoader>,
    ) -> Result<Self> {
        cache.get_class(&name.into(), loader)
    }

    pub(crate) fn from_global(name: ClassName, reference: GlobalRef) -> Self {
        ClassHandle {
            inner: ClassInner::new(name, ClassRef::Global(reference)),
        }
    }

    /// Wraps any reference to a class in a new global reference.
    ///
    /// The handle owns its own global reference, independent of the cache.
    /// `class` is left for its owner to release.
    pub fn wrap_global(env: Env<'_>, name: impl Into<ClassName>, class: jclass) -> Result<Self> {
        let global = GlobalRef::promote(env, class)?;
        Ok(ClassHandle::from_global(name.into(), global))
    }

    /// Takes ownership of a local class reference without promoting it.
    ///
    /// The reference is deleted with `DeleteLocalRef` when the last clone drops.
    ///
    /// # Safety
    ///
    /// `class` must be a local reference created on the calling thread, and
    /// the handle (with all its clones) must be used and dropped on that
    /// thread before the enclosing native frame returns.
    pub unsafe fn wrap_local(env: Env<'_>, name: impl Into<ClassName>, class: jclass) -> Result<Self> {
        let name = name.into();
        if class.is_null() {
            return Err(BridgeError::ClassNotFound(name));
        }
        let reference = ClassRef::Local {
            obj: class,
            accessor: Arc::clone(env.accessor()),
        };
        Ok(ClassHandle {
            inner: ClassInner::new(name, reference),
        })
    }

    pub fn name(&self) -> &ClassName {
        &self.inner.name
    }

    pub fn is_global(&self) -> bool {
        matches!(self.inner.reference, ClassRef::Global(_))
    }

    /// Returns the underlying class reference.
    pub fn as_raw(&self) -> jclass {
        match &self.inner.reference {
            ClassRef::Global(global) => global.as_raw(),
            ClassRef::Local { obj, .. } => *obj,
        }
    }

    /// Whether both handles share one underlying reference.
    pub fn ptr_eq(&self, other: &ClassHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Process-unique id shared by all clones of this handle.
    pub(crate) fn identity(&self) -> usize {
        self.inner.identity
    }

    // =========================================================================
    // Member resolution (through the cache)
    // =========================================================================

    pub fn method_id(&self, cache: &MetadataCache, name: &str, signature: &str) -> Result<MethodId> {
        cache.method_id(self, name, signature)
    }

    pub fn static_method_id(&self, cache: &MetadataCache, name: &str, signature: &str) -> Result<MethodId> {
        cache.static_method_id(self, name, signature)
    }

    pub fn field_id(&self, cache: &MetadataCache, name: &str, signature: &str) -> Result<FieldId> {
        cache.field_id(self, name, signature)
    }

    pub fn static_field_id(&self, cache: &MetadataCache, name: &str, signature: &str) -> Result<FieldId> {
        cache.static_field_id(self, name, signature)
    }
}

impl PartialEq for ClassHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.as_raw() == other.as_raw()
    }
}

impl Eq for ClassHandle {}

impl fmt::Debug for ClassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassHandle")
            .field("name", self.name())
            .field("global", &self.is_global())
            .field("raw", &self.as_raw())
            .finish()
    }
}
