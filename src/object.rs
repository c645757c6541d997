//! Object handles, call arguments and call results.
//!
//! An [`ObjectHandle`] is a global reference bound to its resolved class and
//! to the cache that resolves its members. Every call looks the member id up
//! through the cache, invokes it on the calling thread's environment and
//! checks for a pending Java exception afterwards.
//!
//! ```rust,ignore
//! let sb = ObjectHandle::new_instance(&cache, "java/lang/StringBuilder", "()V", &[])?;
//! sb.call_void_method("setLength", "(I)V", &[JValue::Int(0)])?;
//! let text = sb.call_object_method("toString", "()Ljava/lang/String;", &[])?;
//! ```

use std::sync::Arc;

use crate::cache::MetadataCache;
use crate::class::{ClassHandle, ClassName};
use crate::env::Env;
use crate::error::{BridgeError, Result};
use crate::refs::{GlobalRef, LocalRef};
use crate::sys::{jboolean, jobject, jvalue};

const CONSTRUCTOR: &str = "<init>";
const CLASS_CLASS: &str = "java/lang/Class";
const GET_NAME: &str = "getName";
const GET_NAME_SIG: &str = "()Ljava/lang/String;";

// =========================================================================
// Arguments and results
// =========================================================================

/// A tagged call argument, matched positionally against the signature.
#[derive(Debug, Clone, Copy)]
pub enum JValue<'a> {
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(&'a ObjectHandle),
    Class(&'a ClassHandle),
    Null,
}

impl JValue<'_> {
    pub fn to_raw(&self) -> jvalue {
        match *self {
            JValue::Bool(v) => jvalue { z: jboolean::from(v) },
            JValue::Byte(v) => jvalue { b: v },
            JValue::Char(v) => jvalue { c: v },
            JValue::Short(v) => jvalue { s: v },
            JValue::Int(v) => jvalue { i: v },
            JValue::Long(v) => jvalue { j: v },
            JValue::Float(v) => jvalue { f: v },
            JValue::Double(v) => jvalue { d: v },
            JValue::Object(obj) => jvalue { l: obj.as_raw() },
            JValue::Class(class) => jvalue { l: class.as_raw() },
            JValue::Null => jvalue { l: std::ptr::null_mut() },
        }
    }
}

impl From<bool> for JValue<'_> {
    fn from(value: bool) -> Self {
        JValue::Bool(value)
    }
}

impl From<i32> for JValue<'_> {
    fn from(value: i32) -> Self {
        JValue::Int(value)
    }
}

impl From<i64> for JValue<'_> {
    fn from(value: i64) -> Self {
        JValue::Long(value)
    }
}

impl<'a> From<&'a ObjectHandle> for JValue<'a> {
    fn from(value: &'a ObjectHandle) -> Self {
        JValue::Object(value)
    }
}

pub(crate) fn lower(args: &[JValue<'_>]) -> Vec<jvalue> {
    args.iter().map(JValue::to_raw).collect()
}

/// The result of a dynamically dispatched call.
#[derive(Debug)]
pub enum Value {
    Void,
    Int(i32),
    /// `None` for a Java `null`.
    Object(Option<ObjectHandle>),
}

impl Value {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectHandle> {
        match self {
            Value::Object(obj) => obj,
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }
}

/// The return kinds `invoke` can dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnType {
    Void,
    Int,
    Object,
}

/// Reads the return type off a method descriptor.
pub(crate) fn return_type(signature: &str) -> Result<ReturnType> {
    let unsupported = || BridgeError::UnsupportedReturnType(signature.to_owned());
    let (_, ret) = signature.split_once(')').ok_or_else(unsupported)?;
    match ret.as_bytes() {
        [b'V'] => Ok(ReturnType::Void),
        [b'I'] => Ok(ReturnType::Int),
        [b'L', .., b';'] | [b'[', _, ..] => Ok(ReturnType::Object),
        _ => Err(unsupported()),
    }
}

/// Clears a pending exception left by `name`, turning it into an error.
fn check_exception(env: Env<'_>, name: &str, signature: &str) -> Result<()> {
    if env.take_exception() {
        tracing::debug!(method = name, signature, "call threw");
        Err(BridgeError::invocation(name, signature))
    } else {
        Ok(())
    }
}

/// Wraps an object result, discovering its class. Null maps to `None`.
fn wrap_result(cache: &Arc<MetadataCache>, result: LocalRef<'_>) -> Result<Option<ObjectHandle>> {
    if result.is_null() {
        return Ok(None);
    }
    ObjectHandle::discover(cache, result.get()).map(Some)
}

// =========================================================================
// Object handles
// =========================================================================

/// An owned global reference to a Java object and its class.
///
/// A value of this type always holds a live global reference; construction
/// fails rather than produce one that doesn't.
pub struct ObjectHandle {
    object: GlobalRef,
    class: ClassHandle,
    cache: Arc<MetadataCache>,
}

impl ObjectHandle {
    /// Promotes `obj` to a global reference bound to `class`.
    ///
    /// `obj` is left for its owner to release.
    pub fn from_raw(cache: &Arc<MetadataCache>, class: ClassHandle, obj: jobject) -> Result<Self> {
        let env = cache.accessor().current()?;
        let object = GlobalRef::promote(env, obj)?;
        Ok(ObjectHandle {
            object,
            class,
            cache: Arc::clone(cache),
        })
    }

    /// Runs the constructor with descriptor `ctor_signature` on a new instance
    /// of `class`.
    ///
    /// The intermediate local reference is released on every path.
    pub fn new_instance(
        cache: &Arc<MetadataCache>,
        class: impl Into<ClassName>,
        ctor_signature: &str,
        args: &[JValue<'_>],
    ) -> Result<Self> {
        let class = cache.get_class(&class.into(), None)?;
        let ctor = cache.method_id(&class, CONSTRUCTOR, ctor_signature)?;
        let env = cache.accessor().current()?;
        let raw_args = lower(args);
        let local = env.new_object(class.as_raw(), ctor.as_raw(), &raw_args);
        let local = LocalRef::new(env, local.unwrap_or(std::ptr::null_mut()));
        check_exception(env, CONSTRUCTOR, ctor_signature)?;
        if local.is_null() {
            return Err(BridgeError::invocation(CONSTRUCTOR, ctor_signature));
        }
        ObjectHandle::from_raw(cache, class, local.get())
    }

    /// Wraps an object whose class is unknown.
    ///
    /// The class is found with `GetObjectClass` and named with
    /// `Class.getName()`. The handle is bound to that exact class object: a
    /// cached class of the same name from another loader is not reused.
    pub fn discover(cache: &Arc<MetadataCache>, obj: jobject) -> Result<Self> {
        let env = cache.accessor().current()?;
        let class = LocalRef::new(env, env.get_object_class(obj).unwrap_or(std::ptr::null_mut()));
        if class.is_null() {
            return Err(BridgeError::invocation("getClass", "()Ljava/lang/Class;"));
        }

        let class_class = cache.get_class(&ClassName::new(CLASS_CLASS), None)?;
        let get_name = cache.method_id(&class_class, GET_NAME, GET_NAME_SIG)?;
        let name = LocalRef::new(env, env.call_object_method(class.get(), get_name.as_raw(), &[]));
        check_exception(env, GET_NAME, GET_NAME_SIG)?;
        let name = env
            .get_string_utf(name.get())
            .ok_or_else(|| BridgeError::invocation(GET_NAME, GET_NAME_SIG))?;

        let class = cache.adopt_class(&ClassName::new(name), env, class.get())?;
        ObjectHandle::from_raw(cache, class, obj)
    }

    /// Takes a second, independently owned global reference to the same object.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(ObjectHandle {
            object: self.object.try_clone()?,
            class: self.class.clone(),
            cache: Arc::clone(&self.cache),
        })
    }

    pub fn class(&self) -> &ClassHandle {
        &self.class
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn global(&self) -> &GlobalRef {
        &self.object
    }

    /// Returns the underlying global reference.
    pub fn as_raw(&self) -> jobject {
        self.object.as_raw()
    }

    /// Reads the object as a Java string. `None` if it is not one.
    pub fn as_string(&self) -> Result<Option<String>> {
        let env = self.cache.accessor().current()?;
        Ok(env.get_string_utf(self.as_raw()))
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Calls a method returning an object. A Java `null` gives `Ok(None)`.
    pub fn call_object_method(
        &self,
        name: &str,
        signature: &str,
        args: &[JValue<'_>],
    ) -> Result<Option<ObjectHandle>> {
        let method = self.class.method_id(&self.cache, name, signature)?;
        let env = self.cache.accessor().current()?;
        let raw_args = lower(args);
        let result = LocalRef::new(env, env.call_object_method(self.as_raw(), method.as_raw(), &raw_args));
        check_exception(env, name, signature)?;
        wrap_result(&self.cache, result)
    }

    pub fn call_int_method(&self, name: &str, signature: &str, args: &[JValue<'_>]) -> Result<i32> {
        let method = self.class.method_id(&self.cache, name, signature)?;
        let env = self.cache.accessor().current()?;
        let value = env.call_int_method(self.as_raw(), method.as_raw(), &lower(args));
        check_exception(env, name, signature)?;
        Ok(value)
    }

    pub fn call_void_method(&self, name: &str, signature: &str, args: &[JValue<'_>]) -> Result<()> {
        let method = self.class.method_id(&self.cache, name, signature)?;
        let env = self.cache.accessor().current()?;
        env.call_void_method(self.as_raw(), method.as_raw(), &lower(args));
        check_exception(env, name, signature)
    }

    // =========================================================================
    // Fields
    // =========================================================================

    pub fn get_int_field(&self, name: &str) -> Result<i32> {
        let field = self.class.field_id(&self.cache, name, "I")?;
        let env = self.cache.accessor().current()?;
        Ok(env.get_int_field(self.as_raw(), field.as_raw()))
    }

    pub fn set_int_field(&self, name: &str, value: i32) -> Result<()> {
        let field = self.class.field_id(&self.cache, name, "I")?;
        let env = self.cache.accessor().current()?;
        env.set_int_field(self.as_raw(), field.as_raw(), value);
        Ok(())
    }

    pub fn get_object_field(&self, name: &str, signature: &str) -> Result<Option<ObjectHandle>> {
        let field = self.class.field_id(&self.cache, name, signature)?;
        let env = self.cache.accessor().current()?;
        let value = LocalRef::new(env, env.get_object_field(self.as_raw(), field.as_raw()));
        wrap_result(&self.cache, value)
    }
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("class", self.class.name())
            .field("raw", &self.as_raw())
            .finish()
    }
}

// =========================================================================
// Static members
// =========================================================================

impl ClassHandle {
    /// Calls a static method returning an object. A Java `null` gives `Ok(None)`.
    pub fn call_static_object_method(
        &self,
        cache: &Arc<MetadataCache>,
        name: &str,
        signature: &str,
        args: &[JValue<'_>],
    ) -> Result<Option<ObjectHandle>> {
        let method = self.static_method_id(cache, name, signature)?;
        let env = cache.accessor().current()?;
        let raw_args = lower(args);
        let result = LocalRef::new(env, env.call_static_object_method(self.as_raw(), method.as_raw(), &raw_args));
        check_exception(env, name, signature)?;
        wrap_result(cache, result)
    }

    pub fn call_static_int_method(
        &self,
        cache: &MetadataCache,
        name: &str,
        signature: &str,
        args: &[JValue<'_>],
    ) -> Result<i32> {
        let method = self.static_method_id(cache, name, signature)?;
        let env = cache.accessor().current()?;
        let value = env.call_static_int_method(self.as_raw(), method.as_raw(), &lower(args));
        check_exception(env, name, signature)?;
        Ok(value)
    }

    pub fn call_static_void_method(
        &self,
        cache: &MetadataCache,
        name: &str,
        signature: &str,
        args: &[JValue<'_>],
    ) -> Result<()> {
        let method = self.static_method_id(cache, name, signature)?;
        let env = cache.accessor().current()?;
        env.call_static_void_method(self.as_raw(), method.as_raw(), &lower(args));
        check_exception(env, name, signature)
    }

    pub fn get_static_object_field(
        &self,
        cache: &Arc<MetadataCache>,
        name: &str,
        signature: &str,
    ) -> Result<Option<ObjectHandle>> {
        let field = self.static_field_id(cache, name, signature)?;
        let env = cache.accessor().current()?;
        let value = LocalRef::new(env, env.get_static_object_field(self.as_raw(), field.as_raw()));
        wrap_result(cache, value)
    }
}
