//! Bridge configuration.

use crate::sync::LockMode;
use crate::sys::{jint, JNI_VERSION_1_6};

/// Settings for attaching threads and guarding the metadata cache.
///
/// ```rust,ignore
/// let config = BridgeConfig::new()
///     .jni_version(JNI_VERSION_1_8)
///     .thread_name("bridge-worker")
///     .daemon(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    jni_version: jint,
    thread_name: Option<String>,
    daemon: bool,
    lock_mode: LockMode,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            jni_version: JNI_VERSION_1_6,
            thread_name: None,
            daemon: false,
            lock_mode: LockMode::Recursive,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// JNI version passed to `GetEnv` and `AttachCurrentThread`.
    pub fn jni_version(mut self, version: jint) -> Self {
        self.jni_version = version;
        self
    }

    /// Name given to threads attached by the bridge.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Attach threads as daemon threads, so they don't keep the JVM alive.
    pub fn daemon(mut self, value: bool) -> Self {
        self.daemon = value;
        self
    }

    /// How the metadata cache lock behaves on reentry.
    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    pub fn get_jni_version(&self) -> jint {
        self.jni_version
    }

    pub fn get_thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    pub fn is_daemon(&self) -> bool {
        self.daemon
    }

    pub fn get_lock_mode(&self) -> LockMode {
        self.lock_mode
    }
}
