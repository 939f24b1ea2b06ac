//! Single-slot last-error holder.

use crate::error::BridgeError;

/// Holds the text of the most recent failure.
///
/// There is no history and no error code: each `set` overwrites the slot and
/// an empty slot means "no error".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorChannel {
    message: String,
}

impl ErrorChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot with `message`.
    ///
    /// Setting an empty message is the same as [`clear`](Self::clear).
    pub fn set(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// Store the display text of `error`.
    pub fn set_error(&mut self, error: &BridgeError) {
        self.message = error.to_string();
    }

    /// Empty the slot.
    pub fn clear(&mut self) {
        self.message.clear();
    }

    /// Whether the slot holds a message.
    pub fn has_error(&self) -> bool {
        !self.message.is_empty()
    }

    /// Current message, empty when there is no error.
    pub fn get(&self) -> &str {
        &self.message
    }
}
