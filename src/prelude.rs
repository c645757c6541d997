//! Common imports for native code calling into a JVM.
//!
//! Covers the runtime entry point, the handle types and the raw JNI types a
//! native method signature needs.

pub use crate::sys::{jclass, jint, jobject, jstring, JNIEnv, JavaVM};
pub use crate::{
    BridgeConfig, BridgeError, ClassHandle, ClassLoader, ClassName, JValue, JavaClassLoader,
    JavaRuntime, JniBridge, NativeBridge, ObjectHandle, TracingObserver, Value,
};
