//! Content identifiers.
//!
//! A [`Cid`] is the stable name of an immutable entity record. Entities never
//! hold live references to each other; they hold the CID of the record they
//! point at, and the [`World`](crate::ecs::World) resolves it to whichever
//! entity currently carries that [`Identity`](crate::components::Identity).
//! A lookup that finds nothing is an ordinary outcome (the record simply hasn't
//! arrived yet).
//!
//! The core never hashes records itself; the content store does. A CID is
//! treated as an opaque, case-sensitive token of multibase characters.
//!
//! ## Wire Forms
//!
//! Records link to other records either with a bare string or with the
//! dag-json link form:
//!
//! ```text
//! "bafyreib…"            ← bare
//! { "/": "bafyreib…" }   ← dag-json link
//! ```
//!
//! Both deserialize to the same [`Cid`]. Serialization always emits the link
//! form.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CidError;

/// A content identifier naming an entity record (or an asset).
///
/// Cheap to clone: the text is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(Arc<str>);

impl Cid {
    /// Parse a CID from its textual form.
    ///
    /// Accepts any non-empty run of ASCII alphanumerics, which covers the
    /// base32 and base58btc encodings used by content stores.
    pub fn parse(text: &str) -> Result<Self, CidError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CidError::Empty);
        }
        if let Some(bad) = text.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(CidError::InvalidCharacter(bad));
        }
        Ok(Self(Arc::from(text)))
    }

    /// The textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Cid {
    type Err = CidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.0)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("/", self.as_str())?;
        map.end()
    }
}

/// Either wire form of a link.
#[derive(Deserialize)]
#[serde(untagged)]
enum LinkRepr {
    Bare(String),
    Link {
        #[serde(rename = "/")]
        target: String,
    },
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = match LinkRepr::deserialize(deserializer)? {
            LinkRepr::Bare(text) => text,
            LinkRepr::Link { target } => target,
        };
        Cid::parse(&text).map_err(serde::de::Error::custom)
    }
}
