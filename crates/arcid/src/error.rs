//! Error types.
//!
//! Nothing here reaches the frame loop as a failure: a missing anchor or an
//! unresolvable start value is expressed as `Visibility { is_visible: false }`,
//! not as an `Err`. These types describe what collaborators hand back
//! (platform anchors, assets, records) and what configuration loading reports.

use std::path::PathBuf;

use crate::cid::Cid;

/// A CID string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CidError {
    #[error("content identifier is empty")]
    Empty,
    #[error("content identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Why the AR platform refused or lost a platform anchor request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformAnchorError {
    #[error("platform rejected anchor creation: {0}")]
    Rejected(String),
    #[error("AR session ended before the anchor was created")]
    SessionEnded,
    #[error("platform anchors are not supported by this session")]
    Unsupported,
}

/// Why a visual asset failed to load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("asset {0} not found")]
    NotFound(Cid),
    #[error("asset could not be decoded: {0}")]
    Decode(String),
}

/// Why an entity record could not be turned into an entity.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record is not valid JSON for an entity: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record {0} not found in the content store")]
    NotFound(Cid),
    #[error(transparent)]
    InvalidCid(#[from] CidError),
}

/// Configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
