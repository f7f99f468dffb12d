//! Perceptor traits wrapping an opaque async detection model.
//!
//! These traits give the detection loop a uniform interface over any
//! model backend; loading and inference are the only suspension points.

use async_trait::async_trait;

use sightline_models::RawDetection;

use crate::error::PerceptionResult;

/// A loaded perception model.
#[async_trait]
pub trait Perceptor: Send + Sync + 'static {
    /// The media handle type this model can consume.
    type Media: Send + Sync;

    /// Run one detection pass over the given media.
    ///
    /// # Returns
    /// Raw detections in model output order.
    async fn detect(&self, media: &Self::Media) -> PerceptionResult<Vec<RawDetection>>;

    /// Model name for logging.
    fn name(&self) -> &'static str;
}

/// Loader for a perception model family.
///
/// Configuration is baked into the loader instance; it is consumed when the
/// load starts and cannot change afterwards.
#[async_trait]
pub trait PerceptorLoader: Send + Sync + 'static {
    /// The model this loader produces.
    type Model: Perceptor;

    /// Stable model-family key. One instance is loaded per family within a
    /// registry's scope.
    fn family(&self) -> &'static str;

    /// Perform the asynchronous load.
    async fn load(self) -> PerceptionResult<Self::Model>;
}
