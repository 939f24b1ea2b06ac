//! Error types for bridge operations.

use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while loading or driving a plugin.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    // ==================== Construction ====================
    /// The scripting runtime refused to create a sub-context.
    #[error("Failed to create a new sub-context for plugin: {message}")]
    ContextCreation { message: String },

    /// Another sub-context is active where the main context is required.
    #[error("Main context is not active (a plugin sub-context is still entered)")]
    ContextBusy,

    /// The plugin module could not be imported.
    #[error("Failed to import the plugin's module '{module}': {message}")]
    Import { module: String, message: String },

    /// A required hook is missing from the module.
    #[error("Unable to locate function '{hook}' in plugin's module")]
    HookNotFound { hook: &'static str },

    /// A required hook exists but cannot be called.
    #[error("The plugin's '{hook}' function is not callable")]
    HookNotCallable { hook: &'static str },

    /// Bridge configuration could not be read or is invalid.
    #[error("Invalid bridge configuration: {message}")]
    InvalidConfig { message: String },

    /// Metadata extraction failed while creating the plugin.
    #[error("Plugin metadata is invalid: {0}")]
    Metadata(Box<BridgeError>),

    // ==================== Contract violations ====================
    /// A resolved hook is no longer callable at call time.
    #[error("Plugin's '{hook}' function is not callable")]
    NotCallable { hook: &'static str },

    /// The host and the bridge disagree on the ABI version.
    #[error("Mismatched host ABI versions (expected {expected}, got {got})")]
    AbiMismatch { expected: i32, got: i32 },

    /// `version_check` returned something other than a number.
    #[error("Return value of 'version_check' is not a number (got {type_name})")]
    NotANumber { type_name: &'static str },

    /// `version_check` returned a number with a fractional part.
    #[error("Return value of 'version_check' is not an integer (value {value})")]
    NotAnInteger { value: f64 },

    /// `version_check` returned an integer the host cannot represent.
    #[error(
        "Return value of 'version_check' is out of range (value {value}, expected {}-{})",
        i32::MIN,
        i32::MAX
    )]
    OutOfRange { value: String },

    /// `set_info` returned something other than a table.
    #[error("Plugin's 'set_info' function returned a non-mapping object (got {type_name})")]
    NotAMapping { type_name: &'static str },

    /// `set_info` did not provide a usable `name`.
    #[error("Plugin failed to provide required 'name' info")]
    MissingName,

    // ==================== Invocation ====================
    /// The hook raised an error while running.
    #[error("Failed calling plugin's '{hook}' function: {message}")]
    Invocation { hook: &'static str, message: String },

    // ==================== Not implemented ====================
    /// The operation has no implementation in the current contract.
    #[error("{operation} is not implemented")]
    NotImplemented { operation: &'static str },
}

/// Broad classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Fatal; construction is fully unwound.
    Construction,
    /// The plugin broke the hook contract; the plugin stays usable.
    ContractViolation,
    /// The hook itself failed while running.
    Invocation,
    /// The operation is deliberately unimplemented.
    NotImplemented,
}

impl BridgeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContextCreation { .. }
            | Self::ContextBusy
            | Self::Import { .. }
            | Self::HookNotFound { .. }
            | Self::HookNotCallable { .. }
            | Self::InvalidConfig { .. }
            | Self::Metadata(_) => ErrorKind::Construction,
            Self::NotCallable { .. }
            | Self::AbiMismatch { .. }
            | Self::NotANumber { .. }
            | Self::NotAnInteger { .. }
            | Self::OutOfRange { .. }
            | Self::NotAMapping { .. }
            | Self::MissingName => ErrorKind::ContractViolation,
            Self::Invocation { .. } => ErrorKind::Invocation,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
        }
    }

    /// Whether this error aborts plugin construction.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Construction
    }
}
