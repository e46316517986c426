//! Filament Core
//!
//! This crate provides the runtime for Filament, a fine-grained reactive
//! engine. It implements:
//!
//! - An ownership tree that scopes cleanup, context and error handling
//! - Reactive primitives (signals, triggers, memos, effects)
//! - A push-pull scheduler with batching and glitch-free updates
//! - A reactive store over JSON-shaped data with path mutation
//! - Serializable graph snapshots for diagnostics
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Owners, primitives and the thread-local runtime
//! - `graph`: Dependency graph nodes and the mark phase
//! - `store`: Nested reactive state with per-property subscriptions
//! - `debug`: Graph snapshots and value hashing
//! - `config`: Runtime limits
//! - `error`: Error types shared by every module
//!
//! # Example
//!
//! ```rust
//! use filament_core::reactive::{create_root, Effect, Memo, Signal};
//!
//! create_root(|_owner| {
//!     // Create a signal
//!     let count = Signal::new(0);
//!
//!     // Create a derived value
//!     let doubled = Memo::new(move || count.get() * 2);
//!
//!     // Create an effect
//!     Effect::new(move || {
//!         println!("Count: {}, Doubled: {}", count.get(), doubled.get());
//!     });
//!
//!     // Update the signal
//!     count.set(5);
//!     // Effect runs again and prints: "Count: 5, Doubled: 10"
//! });
//! ```

pub mod config;
pub mod debug;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod store;

pub use config::{configure, RuntimeConfig};
pub use error::{ComputationError, ReactiveError, Result};
