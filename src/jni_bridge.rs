//! The [`NativeBridge`] over a real `JavaVM*`.
//!
//! # Example
//!
//! ```rust,ignore
//! #[no_mangle]
//! pub extern "system" fn JNI_OnLoad(vm: *mut JavaVM, _reserved: *mut c_void) -> jint {
//!     let bridge = unsafe { JniBridge::from_java_vm(vm) };
//!     let runtime = JavaRuntime::builder(Arc::new(bridge)).build();
//!     // keep `runtime` somewhere global
//!     JNI_VERSION_1_6
//! }
//! ```

use std::borrow::Cow;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::bridge::{EnvPtr, NativeBridge};
use crate::config::BridgeConfig;
use crate::sys::{
    jbyte, jbyteArray, jclass, jfieldID, jint, jmethodID, jobject, jsize, jstring, jvalue,
    JNIEnv, JavaVM, JavaVMAttachArgs, JNI_EDETACHED, JNI_ERR, JNI_OK, JNI_TRUE,
};
use crate::{jni_call, jvm_call};

/// Dispatches every bridge operation through the JNI function tables.
///
/// # Thread Safety
///
/// A `JavaVM*` may be used from any thread. Environment pointers are only
/// used on the thread that [`attach_current_thread`](NativeBridge::attach_current_thread)
/// returned them to.
pub struct JniBridge {
    vm: *mut JavaVM,
    config: BridgeConfig,
    thread_name: Option<CString>,
}

unsafe impl Send for JniBridge {}
unsafe impl Sync for JniBridge {}

impl JniBridge {
    /// Wraps a `JavaVM*` with the default configuration.
    ///
    /// # Safety
    ///
    /// `vm` must be a valid `JavaVM*` that outlives the bridge.
    pub unsafe fn from_java_vm(vm: *mut JavaVM) -> Self {
        JniBridge::with_config(vm, BridgeConfig::default())
    }

    /// Wraps a `JavaVM*` with the given configuration.
    ///
    /// A thread name containing a NUL byte is dropped.
    ///
    /// # Safety
    ///
    /// `vm` must be a valid `JavaVM*` that outlives the bridge.
    pub unsafe fn with_config(vm: *mut JavaVM, config: BridgeConfig) -> Self {
        let thread_name = config.get_thread_name().and_then(|name| CString::new(name).ok());
        JniBridge {
            vm,
            config,
            thread_name,
        }
    }

    /// Finds the `JavaVM` behind an environment handed to a native method.
    ///
    /// # Safety
    ///
    /// `env` must be a valid `JNIEnv*` for the calling thread.
    pub unsafe fn from_env(env: *mut JNIEnv, config: BridgeConfig) -> Result<Self, jint> {
        let mut vm: *mut JavaVM = ptr::null_mut();
        let res = jni_call!(env, GetJavaVM, &mut vm).unwrap_or(JNI_ERR);
        if res != JNI_OK || vm.is_null() {
            return Err(if res == JNI_OK { JNI_ERR } else { res });
        }
        Ok(JniBridge::with_config(vm, config))
    }

    /// Returns the raw `JavaVM*` pointer.
    pub fn java_vm(&self) -> *mut JavaVM {
        self.vm
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl std::fmt::Debug for JniBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JniBridge")
            .field("vm", &self.vm)
            .field("config", &self.config)
            .finish()
    }
}

/// Returns `ptr`, or clears the exception a failed lookup leaves pending.
unsafe fn found<T>(env: *mut JNIEnv, ptr: *mut T) -> Option<*mut T> {
    if !ptr.is_null() {
        return Some(ptr);
    }
    if jni_call!(env, ExceptionCheck) == Some(JNI_TRUE) {
        jni_call!(env, ExceptionClear);
    }
    None
}

impl NativeBridge for JniBridge {
    // =========================================================================
    // Threads
    // =========================================================================

    fn get_env(&self) -> Result<EnvPtr, jint> {
        unsafe {
            let mut env: *mut c_void = ptr::null_mut();
            let res = jvm_call!(self.vm, GetEnv, &mut env, self.config.get_jni_version()).unwrap_or(JNI_ERR);
            if res != JNI_OK {
                return Err(res);
            }
            EnvPtr::from_raw(env as *mut JNIEnv).ok_or(JNI_ERR)
        }
    }

    fn attach_current_thread(&self) -> Result<EnvPtr, jint> {
        match self.get_env() {
            Err(JNI_EDETACHED) => {}
            attached => return attached,
        }
        let version = self.config.get_jni_version();
        unsafe {
            let mut env: *mut c_void = ptr::null_mut();
            let mut args = JavaVMAttachArgs {
                version,
                name: self
                    .thread_name
                    .as_ref()
                    .map_or(ptr::null_mut(), |name| name.as_ptr() as *mut c_char),
                group: ptr::null_mut(),
            };
            let args_ptr = &mut args as *mut JavaVMAttachArgs as *mut c_void;
            let res = if self.config.is_daemon() {
                jvm_call!(self.vm, AttachCurrentThreadAsDaemon, &mut env, args_ptr)
            } else {
                jvm_call!(self.vm, AttachCurrentThread, &mut env, args_ptr)
            }
            .unwrap_or(JNI_ERR);
            if res != JNI_OK {
                return Err(res);
            }
            EnvPtr::from_raw(env as *mut JNIEnv).ok_or(JNI_ERR)
        }
    }

    fn detach_current_thread(&self) -> Result<(), jint> {
        let res = unsafe { jvm_call!(self.vm, DetachCurrentThread).unwrap_or(JNI_ERR) };
        if res == JNI_OK {
            Ok(())
        } else {
            Err(res)
        }
    }

    // =========================================================================
    // Classes and members
    // =========================================================================

    fn find_class(&self, env: EnvPtr, name: &str) -> Option<jclass> {
        let c_name = CString::new(name).ok()?;
        unsafe {
            let cls = jni_call!(env.as_raw(), FindClass, c_name.as_ptr())?;
            found(env.as_raw(), cls)
        }
    }

    fn get_method_id(&self, env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jmethodID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        unsafe {
            let mid = jni_call!(env.as_raw(), GetMethodID, class, c_name.as_ptr(), c_sig.as_ptr())?;
            found(env.as_raw(), mid)
        }
    }

    fn get_static_method_id(&self, env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jmethodID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        unsafe {
            let mid = jni_call!(env.as_raw(), GetStaticMethodID, class, c_name.as_ptr(), c_sig.as_ptr())?;
            found(env.as_raw(), mid)
        }
    }

    fn get_field_id(&self, env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jfieldID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        unsafe {
            let fid = jni_call!(env.as_raw(), GetFieldID, class, c_name.as_ptr(), c_sig.as_ptr())?;
            found(env.as_raw(), fid)
        }
    }

    fn get_static_field_id(&self, env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jfieldID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        unsafe {
            let fid = jni_call!(env.as_raw(), GetStaticFieldID, class, c_name.as_ptr(), c_sig.as_ptr())?;
            found(env.as_raw(), fid)
        }
    }

    fn get_object_class(&self, env: EnvPtr, obj: jobject) -> Option<jclass> {
        if obj.is_null() {
            return None;
        }
        unsafe {
            let cls = jni_call!(env.as_raw(), GetObjectClass, obj)?;
            found(env.as_raw(), cls)
        }
    }

    // =========================================================================
    // References
    // =========================================================================

    fn new_global_ref(&self, env: EnvPtr, obj: jobject) -> Option<jobject> {
        unsafe {
            let global = jni_call!(env.as_raw(), NewGlobalRef, obj)?;
            found(env.as_raw(), global)
        }
    }

    fn delete_global_ref(&self, env: EnvPtr, obj: jobject) {
        unsafe {
            jni_call!(env.as_raw(), DeleteGlobalRef, obj);
        }
    }

    fn delete_local_ref(&self, env: EnvPtr, obj: jobject) {
        unsafe {
            jni_call!(env.as_raw(), DeleteLocalRef, obj);
        }
    }

    fn is_same_object(&self, env: EnvPtr, a: jobject, b: jobject) -> bool {
        unsafe { jni_call!(env.as_raw(), IsSameObject, a, b) == Some(JNI_TRUE) }
    }

    // =========================================================================
    // Objects and invocation
    // =========================================================================

    fn new_object(&self, env: EnvPtr, class: jclass, ctor: jmethodID, args: &[jvalue]) -> Option<jobject> {
        unsafe {
            let obj = jni_call!(env.as_raw(), NewObjectA, class, ctor, args.as_ptr())?;
            if obj.is_null() {
                None
            } else {
                Some(obj)
            }
        }
    }

    fn call_object_method(&self, env: EnvPtr, obj: jobject, method: jmethodID, args: &[jvalue]) -> jobject {
        unsafe {
            jni_call!(env.as_raw(), CallObjectMethodA, obj, method, args.as_ptr()).unwrap_or(ptr::null_mut())
        }
    }

    fn call_int_method(&self, env: EnvPtr, obj: jobject, method: jmethodID, args: &[jvalue]) -> jint {
        unsafe { jni_call!(env.as_raw(), CallIntMethodA, obj, method, args.as_ptr()).unwrap_or(0) }
    }

    fn call_void_method(&self, env: EnvPtr, obj: jobject, method: jmethodID, args: &[jvalue]) {
        unsafe {
            jni_call!(env.as_raw(), CallVoidMethodA, obj, method, args.as_ptr());
        }
    }

    fn call_static_object_method(&self, env: EnvPtr, class: jclass, method: jmethodID, args: &[jvalue]) -> jobject {
        unsafe {
            jni_call!(env.as_raw(), CallStaticObjectMethodA, class, method, args.as_ptr())
                .unwrap_or(ptr::null_mut())
        }
    }

    fn call_static_int_method(&self, env: EnvPtr, class: jclass, method: jmethodID, args: &[jvalue]) -> jint {
        unsafe { jni_call!(env.as_raw(), CallStaticIntMethodA, class, method, args.as_ptr()).unwrap_or(0) }
    }

    fn call_static_void_method(&self, env: EnvPtr, class: jclass, method: jmethodID, args: &[jvalue]) {
        unsafe {
            jni_call!(env.as_raw(), CallStaticVoidMethodA, class, method, args.as_ptr());
        }
    }

    // =========================================================================
    // Fields
    // =========================================================================

    fn get_object_field(&self, env: EnvPtr, obj: jobject, field: jfieldID) -> jobject {
        unsafe { jni_call!(env.as_raw(), GetObjectField, obj, field).unwrap_or(ptr::null_mut()) }
    }

    fn get_int_field(&self, env: EnvPtr, obj: jobject, field: jfieldID) -> jint {
        unsafe { jni_call!(env.as_raw(), GetIntField, obj, field).unwrap_or(0) }
    }

    fn set_int_field(&self, env: EnvPtr, obj: jobject, field: jfieldID, value: jint) {
        unsafe {
            jni_call!(env.as_raw(), SetIntField, obj, field, value);
        }
    }

    fn get_static_object_field(&self, env: EnvPtr, class: jclass, field: jfieldID) -> jobject {
        unsafe { jni_call!(env.as_raw(), GetStaticObjectField, class, field).unwrap_or(ptr::null_mut()) }
    }

    // =========================================================================
    // Exceptions
    // =========================================================================

    fn exception_check(&self, env: EnvPtr) -> bool {
        unsafe { jni_call!(env.as_raw(), ExceptionCheck) == Some(JNI_TRUE) }
    }

    fn exception_clear(&self, env: EnvPtr) {
        unsafe {
            jni_call!(env.as_raw(), ExceptionClear);
        }
    }

    // =========================================================================
    // Strings and byte arrays
    // =========================================================================

    fn new_string_utf(&self, env: EnvPtr, value: &str) -> Option<jstring> {
        let c_str = to_java_string(value)?;
        unsafe {
            let jstr = jni_call!(env.as_raw(), NewStringUTF, c_str.as_ptr())?;
            found(env.as_raw(), jstr)
        }
    }

    fn get_string_utf(&self, env: EnvPtr, value: jstring) -> Option<String> {
        if value.is_null() {
            return None;
        }
        unsafe {
            let chars = jni_call!(env.as_raw(), GetStringUTFChars, value, ptr::null_mut())?;
            if chars.is_null() {
                return None;
            }
            let result = from_java_string(CStr::from_ptr(chars).to_bytes());
            jni_call!(env.as_raw(), ReleaseStringUTFChars, value, chars);
            result
        }
    }

    fn new_byte_array(&self, env: EnvPtr, len: jsize) -> Option<jbyteArray> {
        unsafe {
            let array = jni_call!(env.as_raw(), NewByteArray, len)?;
            if array.is_null() {
                None
            } else {
                Some(array)
            }
        }
    }

    fn get_array_length(&self, env: EnvPtr, array: jbyteArray) -> jsize {
        unsafe { jni_call!(env.as_raw(), GetArrayLength, array).unwrap_or(0) }
    }

    fn get_byte_array_region(&self, env: EnvPtr, array: jbyteArray, start: jsize, buf: &mut [jbyte]) {
        let Ok(len) = jsize::try_from(buf.len()) else {
            return;
        };
        unsafe {
            jni_call!(env.as_raw(), GetByteArrayRegion, array, start, len, buf.as_mut_ptr());
        }
    }

    fn set_byte_array_region(&self, env: EnvPtr, array: jbyteArray, start: jsize, buf: &[jbyte]) {
        let Ok(len) = jsize::try_from(buf.len()) else {
            return;
        };
        unsafe {
            jni_call!(env.as_raw(), SetByteArrayRegion, array, start, len, buf.as_ptr());
        }
    }
}

// =============================================================================
// Modified UTF-8
// =============================================================================
//
// JNI strings use the JVM's modified UTF-8: U+0000 is the two bytes `C0 80`
// and characters outside the BMP are a surrogate pair, each half encoded as
// three bytes.

fn to_java_string(value: &str) -> Option<CString> {
    CString::new(cesu8::to_java_cesu8(value).into_owned()).ok()
}

/// `None` for malformed input or unpaired surrogates.
fn from_java_string(bytes: &[u8]) -> Option<String> {
    cesu8::from_java_cesu8(bytes).ok().map(Cow::into_owned)
}
