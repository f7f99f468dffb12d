//! Media element and source traits.
//!
//! A [`MediaSource`] is the live, possibly-changing binding (the host's
//! "current element" reference); a [`MediaElement`] is a cheap handle to one
//! renderable element. Implementations wrap whatever the host renders.

use async_trait::async_trait;

use sightline_models::{ContentId, MediaKind, ReadyState};

/// A renderable media element.
///
/// Handles are cheap to clone and all clones observe the same element.
#[async_trait]
pub trait MediaElement: Clone + Send + Sync + 'static {
    /// What kind of element this is.
    fn kind(&self) -> MediaKind;

    /// Source locator for still images; `None` otherwise.
    fn source_url(&self) -> Option<String>;

    /// Current readiness ordinal. Only meaningful for videos; images and
    /// other elements are ready once referenced.
    fn ready_state(&self) -> ReadyState;

    /// Wait for the element's next "data loaded" signal.
    ///
    /// One-shot: resolves at the next signal after the call. Readiness must
    /// be re-checked afterwards; the signal alone does not imply it.
    async fn loaded_data(&self);

    /// Content identity of this element's current state.
    fn content_id(&self) -> ContentId {
        match self.kind() {
            MediaKind::Image => ContentId {
                kind: MediaKind::Image,
                source: self.source_url(),
            },
            MediaKind::Video => ContentId::video(),
            MediaKind::Other => ContentId::other(),
        }
    }
}

/// The live binding to whatever the host currently renders.
pub trait MediaSource: Send + Sync + 'static {
    type Element: MediaElement;

    /// Resolve the currently-bound element, if any.
    ///
    /// A momentarily-absent element is normal (the host may not have
    /// rendered yet); it does not end observation.
    fn resolve(&self) -> Option<Self::Element>;
}
