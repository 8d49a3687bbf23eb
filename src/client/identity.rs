//! Per-session client identity used for echo suppression.

use std::fmt;

/// Opaque tag distinguishing this editor session from every other one.
///
/// Generated once per session and never persisted: a restarted editor is
/// a new client. It is not an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing tag (used when replaying notifications in tests
    /// or when a frontend supplies its own tag).
    pub fn from_tag(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `tag` (as carried by a save notification) is this client.
    pub fn matches(&self, tag: &str) -> bool {
        self.0 == tag
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
