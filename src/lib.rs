//! # jni-bridge
//!
//! A safety layer over JNI for native code that calls into a JVM.
//!
//! This crate takes care of the parts of JNI that are easy to get wrong:
//! - **Thread-affine environments**: every thread gets its own `JNIEnv*`,
//!   attached on first use and memoized in thread-local storage
//! - **Resolve-once caching**: class and member lookups go to the JVM at most
//!   once per key, however many threads ask concurrently
//! - **Exactly-once release**: global and local references are owned by RAII
//!   types and deleted exactly once, on whichever thread drops them
//! - **Typed failures**: every fallible call returns [`Result`] with a
//!   [`BridgeError`] saying what went wrong
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jni_bridge::prelude::*;
//!
//! fn builder_length(env: *mut JNIEnv) -> Result<Option<i32>, BridgeError> {
//!     let bridge = unsafe { JniBridge::from_env(env, BridgeConfig::default()) }
//!         .map_err(BridgeError::ThreadAttachFailed)?;
//!     let runtime = JavaRuntime::builder(Arc::new(bridge))
//!         .observer(Arc::new(TracingObserver))
//!         .build();
//!
//!     let sb = runtime.new_instance("java/lang/StringBuilder", "()V", &[])?;
//!     Ok(runtime.invoke(&sb, "length", "()I", &[])?.as_int())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Your Native Code                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                 JavaRuntime (runtime)                    │
//! │   load_class, resolve_method/field, new_instance, invoke │
//! ├─────────────────────────────────────────────────────────┤
//! │          Reference wrappers (class, object, refs)        │
//! │   ClassHandle, ObjectHandle, GlobalRef, LocalRef         │
//! ├─────────────────────────────────────────────────────────┤
//! │        MetadataCache (cache) + CacheMutex (sync)         │
//! │   class / method id / field id maps, recursive lock      │
//! ├─────────────────────────────────────────────────────────┤
//! │              EnvAccessor / Env (env)                     │
//! │   per-thread attach, memoized JNIEnv*                    │
//! ├─────────────────────────────────────────────────────────┤
//! │              NativeBridge (bridge)                       │
//! │   JniBridge over JavaVM*, NoopBridge, test doubles       │
//! ├─────────────────────────────────────────────────────────┤
//! │              Raw FFI (sys, via jni-sys)                  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sys`] | Raw JNI types and the `jni_call!`/`jvm_call!` macros |
//! | [`bridge`] | The [`NativeBridge`] trait and [`NoopBridge`] |
//! | [`jni_bridge`] | [`JniBridge`], the bridge over a real JVM |
//! | [`env`] | [`EnvAccessor`] and the per-thread [`Env`] |
//! | [`cache`] | [`MetadataCache`] |
//! | [`class`] | [`ClassName`], [`ClassHandle`], member ids |
//! | [`object`] | [`ObjectHandle`], [`JValue`], [`Value`] |
//! | [`loader`] | [`ClassLoader`] delegates |
//! | [`observer`] | Hook points ([`Observer`], [`TracingObserver`]) |
//! | [`runtime`] | [`JavaRuntime`], the entry point |
//!
//! ## Class Loaders
//!
//! Threads attached from native code only see bootstrap classes through
//! `FindClass`. Pass a [`ClassLoader`] per call, or install a default one
//! with [`JavaRuntimeBuilder::class_loader`]:
//!
//! ```rust,ignore
//! let env = runtime.current_env()?;
//! let loader = JavaClassLoader::new(env, app_class_loader)?;
//! let runtime = JavaRuntime::builder(bridge)
//!     .class_loader(Arc::new(loader))
//!     .build();
//! let activity = runtime.load_class("com.example.MainActivity", None)?;
//! ```
//!
//! ## Threads
//!
//! Handles are `Send + Sync` and may be dropped on any thread; the release
//! happens through the dropping thread's environment, attaching it if
//! needed. The crate never detaches a thread on its own. Call
//! [`JavaRuntime::detach_current_thread`] when the host says so; it is
//! `unsafe` because local references of that thread die with the detach.
//! A thread the host detached behind the crate's back is noticed on the
//! next call and attached again.

pub mod sys;

pub mod bridge;
pub mod cache;
pub mod class;
pub mod config;
pub mod env;
pub mod error;
pub mod jni_bridge;
pub mod loader;
pub mod object;
pub mod observer;
pub mod prelude;
pub mod refs;
pub mod runtime;
pub mod sync;

pub use bridge::{EnvPtr, NativeBridge, NoopBridge};
pub use cache::MetadataCache;
pub use class::{ClassHandle, ClassName, FieldId, MemberDescriptor, MemberKind, MethodId};
pub use config::BridgeConfig;
pub use env::{Env, EnvAccessor};
pub use error::{BridgeError, Result};
pub use jni_bridge::JniBridge;
pub use loader::{ClassLoader, JavaClassLoader};
pub use object::{JValue, ObjectHandle, Value};
pub use observer::{Hook, NoopObserver, Observer, RefKind, TracingObserver};
pub use refs::{GlobalRef, LocalRef};
pub use runtime::{JavaRuntime, JavaRuntimeBuilder};
pub use sync::{CacheGuard, CacheMutex, LockMode};
