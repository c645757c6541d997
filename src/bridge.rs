//! The native bridge capability.
//!
//! [`NativeBridge`] is the fixed operation table the rest of the crate is
//! written against. [`JniBridge`](crate::JniBridge) implements it over a real
//! `JavaVM*`; [`NoopBridge`] satisfies the same contract on targets where no
//! JVM is present. Tests inject their own implementation.
//!
//! Every method takes the [`EnvPtr`] of the calling thread, obtained through
//! [`EnvAccessor::current`](crate::EnvAccessor::current). Implementations do
//! no caching of their own.

use crate::sys::{
    jbyte, jbyteArray, jclass, jfieldID, jint, jmethodID, jobject, jsize, jstring, jvalue, JNIEnv,
    JNI_EDETACHED, JNI_ERR,
};

/// A `JNIEnv*` belonging to one attached thread.
///
/// Deliberately `!Send`: an environment pointer is only meaningful on the
/// thread it was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvPtr(*mut JNIEnv);

impl EnvPtr {
    /// Wraps a raw environment pointer. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// The pointer must be a valid `JNIEnv*` for the current thread, or the
    /// [`NativeBridge`] it is handed to must never dereference it.
    pub unsafe fn from_raw(raw: *mut JNIEnv) -> Option<Self> {
        if raw.is_null() {
            None
        } else {
            Some(EnvPtr(raw))
        }
    }

    /// Returns the raw `JNIEnv*`.
    pub fn as_raw(self) -> *mut JNIEnv {
        self.0
    }
}

/// The foreign call interface to a managed runtime.
///
/// Lookups return `None` on failure and must not leave a Java exception
/// pending. Invocations may leave one pending; callers check with
/// [`exception_check`](NativeBridge::exception_check).
pub trait NativeBridge: Send + Sync {
    // =========================================================================
    // Threads
    // =========================================================================

    /// Returns the calling thread's environment if it is attached, without
    /// attaching it. `Err(JNI_EDETACHED)` when it is not.
    fn get_env(&self) -> Result<EnvPtr, jint>;

    /// Attaches the calling thread (or returns its existing environment).
    fn attach_current_thread(&self) -> Result<EnvPtr, jint>;

    /// Detaches the calling thread.
    fn detach_current_thread(&self) -> Result<(), jint>;

    // =========================================================================
    // Classes and members
    // =========================================================================

    /// Finds a class by its slash-separated name. Returns a local reference.
    fn find_class(&self, env: EnvPtr, name: &str) -> Option<jclass>;

    fn get_method_id(&self, env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jmethodID>;

    fn get_static_method_id(&self, env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jmethodID>;

    fn get_field_id(&self, env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jfieldID>;

    fn get_static_field_id(&self, env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jfieldID>;

    /// Returns a local reference to the runtime class of `obj`.
    fn get_object_class(&self, env: EnvPtr, obj: jobject) -> Option<jclass>;

    // =========================================================================
    // References
    // =========================================================================

    fn new_global_ref(&self, env: EnvPtr, obj: jobject) -> Option<jobject>;

    fn delete_global_ref(&self, env: EnvPtr, obj: jobject);

    fn delete_local_ref(&self, env: EnvPtr, obj: jobject);

    /// Whether two references point at the same object. Two nulls are the same.
    fn is_same_object(&self, env: EnvPtr, a: jobject, b: jobject) -> bool;

    // =========================================================================
    // Objects and invocation
    // =========================================================================

    /// Runs constructor `ctor` on a fresh instance of `class`. Returns a local reference.
    fn new_object(&self, env: EnvPtr, class: jclass, ctor: jmethodID, args: &[jvalue]) -> Option<jobject>;

    fn call_object_method(&self, env: EnvPtr, obj: jobject, method: jmethodID, args: &[jvalue]) -> jobject;

    fn call_int_method(&self, env: EnvPtr, obj: jobject, method: jmethodID, args: &[jvalue]) -> jint;

    fn call_void_method(&self, env: EnvPtr, obj: jobject, method: jmethodID, args: &[jvalue]);

    fn call_static_object_method(&self, env: EnvPtr, class: jclass, method: jmethodID, args: &[jvalue]) -> jobject;

    fn call_static_int_method(&self, env: EnvPtr, class: jclass, method: jmethodID, args: &[jvalue]) -> jint;

    fn call_static_void_method(&self, env: EnvPtr, class: jclass, method: jmethodID, args: &[jvalue]);

    // =========================================================================
    // Fields
    // =========================================================================

    fn get_object_field(&self, env: EnvPtr, obj: jobject, field: jfieldID) -> jobject;

    fn get_int_field(&self, env: EnvPtr, obj: jobject, field: jfieldID) -> jint;

    fn set_int_field(&self, env: EnvPtr, obj: jobject, field: jfieldID, value: jint);

    fn get_static_object_field(&self, env: EnvPtr, class: jclass, field: jfieldID) -> jobject;

    // =========================================================================
    // Exceptions
    // =========================================================================

    fn exception_check(&self, env: EnvPtr) -> bool;

    fn exception_clear(&self, env: EnvPtr);

    // =========================================================================
    // Strings and byte arrays
    // =========================================================================

    fn new_string_utf(&self, env: EnvPtr, value: &str) -> Option<jstring>;

    /// Copies a Java string out as UTF-8. `None` for null or invalid input.
    fn get_string_utf(&self, env: EnvPtr, value: jstring) -> Option<String>;

    fn new_byte_array(&self, env: EnvPtr, len: jsize) -> Option<jbyteArray>;

    fn get_array_length(&self, env: EnvPtr, array: jbyteArray) -> jsize;

    fn get_byte_array_region(&self, env: EnvPtr, array: jbyteArray, start: jsize, buf: &mut [jbyte]);

    fn set_byte_array_region(&self, env: EnvPtr, array: jbyteArray, start: jsize, buf: &[jbyte]);
}

/// A bridge with no JVM behind it.
///
/// Attaching always fails, so every operation routed through an
/// [`EnvAccessor`](crate::EnvAccessor) reports
/// [`BridgeError::ThreadAttachFailed`](crate::BridgeError::ThreadAttachFailed).
/// The remaining methods are unreachable in practice and return empty values.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBridge;

impl NativeBridge for NoopBridge {
    fn get_env(&self) -> Result<EnvPtr, jint> {
        Err(JNI_EDETACHED)
    }

    fn attach_current_thread(&self) -> Result<EnvPtr, jint> {
        Err(JNI_ERR)
    }

    fn detach_current_thread(&self) -> Result<(), jint> {
        Ok(())
    }

    fn find_class(&self, _env: EnvPtr, _name: &str) -> Option<jclass> {
        None
    }

    fn get_method_id(&self, _env: EnvPtr, _class: jclass, _name: &str, _sig: &str) -> Option<jmethodID> {
        None
    }

    fn get_static_method_id(&self, _env: EnvPtr, _class: jclass, _name: &str, _sig: &str) -> Option<jmethodID> {
        None
    }

    fn get_field_id(&self, _env: EnvPtr, _class: jclass, _name: &str, _sig: &str) -> Option<jfieldID> {
        None
    }

    fn get_static_field_id(&self, _env: EnvPtr, _class: jclass, _name: &str, _sig: &str) -> Option<jfieldID> {
        None
    }

    fn get_object_class(&self, _env: EnvPtr, _obj: jobject) -> Option<jclass> {
        None
    }

    fn new_global_ref(&self, _env: EnvPtr, _obj: jobject) -> Option<jobject> {
        None
    }

    fn delete_global_ref(&self, _env: EnvPtr, _obj: jobject) {}

    fn delete_local_ref(&self, _env: EnvPtr, _obj: jobject) {}

    fn is_same_object(&self, _env: EnvPtr, a: jobject, b: jobject) -> bool {
        a == b
    }

    fn new_object(&self, _env: EnvPtr, _class: jclass, _ctor: jmethodID, _args: &[jvalue]) -> Option<jobject> {
        None
    }

    fn call_object_method(&self, _env: EnvPtr, _obj: jobject, _method: jmethodID, _args: &[jvalue]) -> jobject {
        std::ptr::null_mut()
    }

    fn call_int_method(&self, _env: EnvPtr, _obj: jobject, _method: jmethodID, _args: &[jvalue]) -> jint {
        0
    }

    fn call_void_method(&self, _env: EnvPtr, _obj: jobject, _method: jmethodID, _args: &[jvalue]) {}

    fn call_static_object_method(&self, _env: EnvPtr, _class: jclass, _method: jmethodID, _args: &[jvalue]) -> jobject {
        std::ptr::null_mut()
    }

    fn call_static_int_method(&self, _env: EnvPtr, _class: jclass, _method: jmethodID, _args: &[jvalue]) -> jint {
        0
    }

    fn call_static_void_method(&self, _env: EnvPtr, _class: jclass, _method: jmethodID, _args: &[jvalue]) {}

    fn get_object_field(&self, _env: EnvPtr, _obj: jobject, _field: jfieldID) -> jobject {
        std::ptr::null_mut()
    }

    fn get_int_field(&self, _env: EnvPtr, _obj: jobject, _field: jfieldID) -> jint {
        0
    }

    fn set_int_field(&self, _env: EnvPtr, _obj: jobject, _field: jfieldID, _value: jint) {}

    fn get_static_object_field(&self, _env: EnvPtr, _class: jclass, _field: jfieldID) -> jobject {
        std::ptr::null_mut()
    }

    fn exception_check(&self, _env: EnvPtr) -> bool {
        false
    }

    fn exception_clear(&self, _env: EnvPtr) {}

    fn new_string_utf(&self, _env: EnvPtr, _value: &str) -> Option<jstring> {
        None
    }

    fn get_string_utf(&self, _env: EnvPtr, _value: jstring) -> Option<String> {
        None
    }

    fn new_byte_array(&self, _env: EnvPtr, _len: jsize) -> Option<jbyteArray> {
        None
    }

    fn get_array_length(&self, _env: EnvPtr, _array: jbyteArray) -> jsize {
        0
    }

    fn get_byte_array_region(&self, _env: EnvPtr, _array: jbyteArray, _start: jsize, _buf: &mut [jbyte]) {}

    fn set_byte_array_region(&self, _env: EnvPtr, _array: jbyteArray, _start: jsize, _buf: &[jbyte]) {}
}
