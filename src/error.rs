//! Error taxonomy shared by every layer of the bridge.

use crate::class::{ClassName, MemberKind};
use crate::sys::jint;

/// Why a bridge operation produced no value.
///
/// Every fallible operation in this crate returns `Result<T, BridgeError>`.
/// A failed resolution never leaves anything behind in the metadata cache, so
/// the same call may be retried once the underlying condition changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// The class could not be found by `FindClass` or by the class loader.
    #[error("class not found: {0}")]
    ClassNotFound(ClassName),

    /// The method or field does not exist on the class.
    #[error("{kind} not found: {class}.{name}{signature}")]
    MemberNotFound {
        class: ClassName,
        name: String,
        signature: String,
        kind: MemberKind,
    },

    /// `NewGlobalRef` returned null (out of memory, or an invalid input reference).
    #[error("failed to promote reference to a global reference")]
    ReferencePromotionFailed,

    /// The current thread could not be attached to the JVM.
    #[error("failed to attach current thread to the JVM (code {0})")]
    ThreadAttachFailed(jint),

    /// The current thread could not be detached from the JVM.
    #[error("failed to detach current thread from the JVM (code {0})")]
    ThreadDetachFailed(jint),

    /// The native call was aborted or left a Java exception pending.
    #[error("invocation of {name}{signature} failed")]
    InvocationFailed { name: String, signature: String },

    /// `invoke` was given a descriptor whose return type it cannot dispatch.
    #[error("unsupported return type in descriptor {0}")]
    UnsupportedReturnType(String),

    /// The JVM could not allocate a new array or string.
    #[error("allocation of {0} failed")]
    AllocationFailed(&'static str),
}

impl BridgeError {
    pub(crate) fn invocation(name: &str, signature: &str) -> Self {
        BridgeError::InvocationFailed {
            name: name.to_string(),
            signature: signature.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
