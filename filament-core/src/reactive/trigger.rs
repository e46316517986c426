//! Triggers
//!
//! A trigger is a signal without a value. Reading it subscribes, notifying
//! it marks every subscriber, and there is no equality check to skip a
//! notification. The store keeps one per property.

use super::runtime::{try_with_runtime, with_runtime};
use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;

/// A value-less reactive source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Trigger {
    id: NodeId,
}

impl Trigger {
    /// Create a trigger owned by the current owner.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            id: with_runtime(|rt| rt.create_source(None, None, true)),
        }
    }

    /// Create a trigger no owner will dispose. The creator must call
    /// [`Trigger::release`].
    pub(crate) fn unowned(label: Option<String>) -> Self {
        Self {
            id: with_runtime(|rt| rt.create_source(None, label, false)),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Subscribe the running computation to this trigger.
    pub fn track(&self) {
        if let Err(error) = self.try_track() {
            panic!("{error}");
        }
    }

    pub fn try_track(&self) -> Result<()> {
        with_runtime(|rt| {
            if !rt.contains(self.id) {
                return Err(ReactiveError::StaleRead(self.id));
            }
            rt.track(self.id);
            Ok(())
        })
    }

    /// Mark every subscriber. A disposed trigger has none.
    pub fn notify(&self) {
        with_runtime(|rt| rt.notify(self.id));
    }

    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_node(self.id));
    }

    pub fn is_disposed(&self) -> bool {
        !with_runtime(|rt| rt.contains(self.id))
    }

    /// Remove an unowned trigger. Safe to call from `Drop`, including
    /// during thread teardown.
    pub(crate) fn release(&self) {
        let _ = try_with_runtime(|rt| rt.release_source(self.id));
    }
}
