//! Property bindings.
//!
//! A binding is the explicit replacement for a refresh-scoped, injected
//! configuration field: the host creates it from the store it owns, reads it
//! with `get()`, and optionally listens for changes.

pub mod coerce;
pub mod property;

pub use coerce::{BindingError, FromConfigValue};
pub use property::PropertyBinding;
