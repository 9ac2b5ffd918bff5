//! Identity of the session that produced a piece of registry state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Where a piece of registry state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Registered by this process.
    Local,
    /// Copied from a peer registry server.
    Replicated,
    /// Delivered through an interest subscription.
    Interested,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => write!(f, "local"),
            Origin::Replicated => write!(f, "replicated"),
            Origin::Interested => write!(f, "interested"),
        }
    }
}

/// Opaque identifier of one connection generation.
///
/// Two sources are equal only if origin, name and id all match, so a channel
/// that reconnects to the same server still yields a distinct source.
///
/// # Examples
///
/// ```rust
/// use registry_interest::model::{Origin, Source};
///
/// let first = Source::new(Origin::Interested, Some("registry-1"));
/// let second = Source::new(Origin::Interested, Some("registry-1"));
/// assert_ne!(first, second);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Source {
    origin: Origin,
    name: Option<String>,
    id: u64,
}

impl Source {
    /// Create a source with a process-unique id.
    pub fn new(origin: Origin, name: Option<impl Into<String>>) -> Self {
        Self {
            origin,
            name: name.map(Into::into),
            id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Create a source with an explicit id.
    pub fn with_id(origin: Origin, name: Option<impl Into<String>>, id: u64) -> Self {
        Self {
            origin,
            name: name.map(Into::into),
            id,
        }
    }

    /// Origin of the state tagged with this source.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Name of the peer, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Generation id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{}#{}", self.origin, name, self.id),
            None => write!(f, "{}#{}", self.origin, self.id),
        }
    }
}
