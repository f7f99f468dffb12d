//! Media kinds, video readiness ordinals, and content identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a bound media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still image. Identity is its source locator string.
    Image,
    /// Video. Identity is positional/content-based; readiness gates publishing.
    Video,
    /// Anything else renderable. Always considered ready.
    Other,
}

impl MediaKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Other => "other",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a readiness ordinal out of range.
#[derive(Debug, Error)]
#[error("invalid readiness ordinal: {0} (expected 0..=4)")]
pub struct ReadyStateError(pub u8);

/// Video readiness ordinal.
///
/// Mirrors the standard media-element readiness scale. A video holds
/// decodable frame data once it reaches [`ReadyState::HaveCurrentData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    /// No information about the media is available.
    HaveNothing,
    /// Metadata (duration, dimensions) is available, no frame data.
    HaveMetadata,
    /// Data for the current playback position is available.
    HaveCurrentData,
    /// Data for the current and at least the next frame is available.
    HaveFutureData,
    /// Enough data to play through without stalling.
    HaveEnoughData,
}

impl ReadyState {
    /// The ordinal at which a video holds a decodable current frame.
    pub const HAS_DATA_THRESHOLD: ReadyState = ReadyState::HaveCurrentData;

    /// Returns the numeric ordinal (0..=4).
    pub fn ordinal(&self) -> u8 {
        match self {
            ReadyState::HaveNothing => 0,
            ReadyState::HaveMetadata => 1,
            ReadyState::HaveCurrentData => 2,
            ReadyState::HaveFutureData => 3,
            ReadyState::HaveEnoughData => 4,
        }
    }

    /// Build from a numeric ordinal.
    pub fn from_ordinal(ordinal: u8) -> Result<Self, ReadyStateError> {
        match ordinal {
            0 => Ok(ReadyState::HaveNothing),
            1 => Ok(ReadyState::HaveMetadata),
            2 => Ok(ReadyState::HaveCurrentData),
            3 => Ok(ReadyState::HaveFutureData),
            4 => Ok(ReadyState::HaveEnoughData),
            other => Err(ReadyStateError(other)),
        }
    }

    /// Whether the current playback position has decodable data.
    pub fn has_current_data(&self) -> bool {
        *self >= Self::HAS_DATA_THRESHOLD
    }
}

/// Content identity: the value used to decide whether a media source
/// represents the same thing as the last observation.
///
/// Still images carry their source locator; video and other elements have
/// no portable identity beyond their kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId {
    pub kind: MediaKind,
    /// Source locator for still images; `None` for video and other kinds.
    pub source: Option<String>,
}

impl ContentId {
    /// Identity of a still image with the given source locator.
    pub fn image(source: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            source: Some(source.into()),
        }
    }

    /// Identity of a video element.
    pub fn video() -> Self {
        Self {
            kind: MediaKind::Video,
            source: None,
        }
    }

    /// Identity of an other-kind element.
    pub fn other() -> Self {
        Self {
            kind: MediaKind::Other,
            source: None,
        }
    }

    /// Whether this identity names the same still image as `last`.
    ///
    /// Only still images de-duplicate; video and other kinds are never
    /// "the same" for skip purposes.
    pub fn is_same_image(&self, last: &ContentId) -> bool {
        self.kind == MediaKind::Image && self.source.is_some() && self == last
    }
}
