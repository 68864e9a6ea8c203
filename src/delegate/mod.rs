//! Delegate registry for pluggable handlers.
//!
//! Feature modules register [`Handler`] implementations against a
//! [`DelegateRegistry`]; the registry asynchronously determines which handlers
//! are enabled per context and republishes the sorted result as a replay-one
//! stream.
//!
//! ## Key Components
//!
//! - [`Handler`] - Trait implemented by pluggable feature units
//! - [`DelegateRegistry`] - The registry itself
//! - [`StaticHandler`] - Built-in handler with fixed enablement/display
//! - [`ContextKey`] - Opaque evaluation scope
//! - [`HandlerDisplay`] - One entry of the emitted list
//!
//! ## Example
//!
//! ```rust,ignore
//! use plugboard::delegate::{ContextKey, DelegateRegistry, StaticHandler};
//! use std::sync::Arc;
//!
//! let registry = DelegateRegistry::new("UserMenu");
//! registry.register(Arc::new(StaticHandler::new("grades", 10))).await;
//!
//! let ctx = ContextKey::new("account");
//! let stream = registry.handlers_for(user, &ctx).await;
//! registry.wait_for_ready(&ctx).await;
//! ```

mod fixed;
mod registry;
mod traits;
mod types;

pub use fixed::StaticHandler;
pub use registry::DelegateRegistry;
pub use traits::{Handler, HandlerError};
pub use types::{ContextKey, ContextStatus, DisplayData, HandlerDisplay};
