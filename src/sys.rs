// jni-bridge/src/sys.rs
//
// Raw JNI bindings.
//
// Primitive types, reference types and the two function tables (JNIEnv and
// JavaVM) come from `jni-sys`. Every slot in those tables is an
// `Option<unsafe extern "system" fn ...>`: a JVM that predates a function
// leaves it empty. The macros below turn an empty slot into `None` so callers
// can treat it like any other failed call.

pub use jni_sys::*;

/// Calls a JNI function through the `JNIEnv` vtable.
///
/// `env_ptr: *mut JNIEnv = *mut *const JNINativeInterface_`, so `**env_ptr`
/// is the vtable itself. Evaluates to `Some(result)`, or `None` when the slot
/// is empty. Must be used inside an `unsafe` block.
///
/// Usage: `jni_call!(env, FindClass, name.as_ptr())`
#[macro_export]
macro_rules! jni_call {
    ($env:expr, $func:ident $(, $args:expr)*) => {{
        let env_ptr: *mut $crate::sys::JNIEnv = $env;
        match (**env_ptr).$func {
            Some(func) => Some(func(env_ptr $(, $args)*)),
            None => None,
        }
    }};
}

/// Calls a JavaVM function through the invocation vtable.
///
/// Same shape as [`jni_call!`], for `*mut JavaVM`.
#[macro_export]
macro_rules! jvm_call {
    ($vm:expr, $func:ident $(, $args:expr)*) => {{
        let vm_ptr: *mut $crate::sys::JavaVM = $vm;
        match (**vm_ptr).$func {
            Some(func) => Some(func(vm_ptr $(, $args)*)),
            None => None,
        }
    }};
}
