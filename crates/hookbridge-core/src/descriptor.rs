//! Plugin metadata reported to the host.

use serde::{Deserialize, Serialize};

/// Owned metadata extracted from a plugin's `set_info` hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Plugin name. Required, there is no default.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Plugin version string.
    #[serde(default = "default_version")]
    pub version: String,

    /// Plugin author.
    #[serde(default = "default_author")]
    pub author: String,
}

fn default_version() -> String {
    PluginDescriptor::DEFAULT_VERSION.to_string()
}

fn default_author() -> String {
    PluginDescriptor::DEFAULT_AUTHOR.to_string()
}

impl PluginDescriptor {
    /// Fallback for a missing `description`.
    pub const DEFAULT_DESCRIPTION: &'static str = "";
    /// Fallback for a missing `version`.
    pub const DEFAULT_VERSION: &'static str = "Unspecified";
    /// Fallback for a missing `author`.
    pub const DEFAULT_AUTHOR: &'static str = "Anonymous";

    /// Create a descriptor with only a name; the other fields take their defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Self::DEFAULT_DESCRIPTION.to_string(),
            version: Self::DEFAULT_VERSION.to_string(),
            author: Self::DEFAULT_AUTHOR.to_string(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Borrow the four strings for the host.
    pub fn as_info(&self) -> PluginInfo<'_> {
        PluginInfo {
            name: &self.name,
            description: &self.description,
            version: &self.version,
            author: &self.author,
        }
    }
}

/// Borrowed view of a [`PluginDescriptor`] handed to the host.
///
/// The strings live as long as the plugin that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PluginInfo<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub version: &'a str,
    pub author: &'a str,
}

impl std::fmt::Display for PluginInfo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} by {}", self.name, self.version, self.author)
    }
}
