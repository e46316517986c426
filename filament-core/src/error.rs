//! Error Types
//!
//! Every fallible operation in the crate returns [`ReactiveError`]. Failures
//! inside computation bodies are panics caught at the computation boundary;
//! error handlers receive them as a [`ComputationError`].

use std::any::Any;

use thiserror::Error;

use crate::graph::NodeId;

/// Errors produced by the reactive runtime and the store layer.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A signal, memo or trigger was used after its owner disposed it.
    #[error("reactive node {0} was read after it was disposed")]
    StaleRead(NodeId),

    /// A memo was read while its own body was still running.
    #[error("computation {0} was read while it was running")]
    Cycle(NodeId),

    /// A memo was read before its body ever completed successfully.
    #[error("computation {0} has not produced a value")]
    NoValue(NodeId),

    /// Stores wrap records and lists only.
    #[error("store values must be records or lists, got {0}")]
    NotWrappable(&'static str),

    /// A store path could not be applied to the current store shape.
    #[error("invalid store path `{path}`: {reason}")]
    InvalidPath {
        /// The path as written.
        path: String,
        /// Why it could not be applied.
        reason: &'static str,
    },

    /// Effects kept re-queueing each other past the configured limit.
    #[error("propagation did not settle after {0} rounds")]
    RunawayPropagation(usize),

    /// A value could not be converted to JSON.
    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A graph snapshot could not be encoded as MessagePack.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// A failure raised inside a computation body or a cleanup callback.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ComputationError {
    message: String,
    node: Option<NodeId>,
}

impl ComputationError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            node: None,
        }
    }

    /// Build an error from a caught panic payload.
    pub(crate) fn from_panic(payload: &(dyn Any + Send), node: Option<NodeId>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else if let Some(error) = payload.downcast_ref::<ReactiveError>() {
            error.to_string()
        } else if let Some(error) = payload.downcast_ref::<ComputationError>() {
            error.message.clone()
        } else {
            "computation panicked with a non-string payload".to_string()
        };

        Self { message, node }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The computation whose body failed, if the failure came from one.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(ComputationError::from_panic(&*payload, None).message(), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(
            ComputationError::from_panic(&*payload, None).message(),
            "owned boom"
        );

        let payload: Box<dyn Any + Send> = Box::new(ReactiveError::RunawayPropagation(3));
        assert_eq!(
            ComputationError::from_panic(&*payload, None).message(),
            "propagation did not settle after 3 rounds"
        );
    }

    #[test]
    fn unknown_payloads_get_a_generic_message() {
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        let error = ComputationError::from_panic(&*payload, None);
        assert!(error.message().contains("non-string payload"));
        assert!(error.node().is_none());
    }
}
