//! Pluggable perception-model capability.
//!
//! This crate provides:
//! - The [`Perceptor`] / [`PerceptorLoader`] traits wrapping an opaque async
//!   detection model
//! - A scope-owned [`ModelRegistry`] that lazily loads one model instance
//!   per family and hands out shared [`ModelHandle`]s
//! - [`Scope`], the lifetime boundary that turns late async completions
//!   into no-ops

pub mod error;
pub mod perceptor;
pub mod registry;
pub mod scope;

pub use error::{PerceptionError, PerceptionResult};
pub use perceptor::{Perceptor, PerceptorLoader};
pub use registry::{ModelHandle, ModelRegistry, ModelState};
pub use scope::Scope;
