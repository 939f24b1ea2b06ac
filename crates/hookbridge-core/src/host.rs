//! The fixed plugin interface the host application programs against.

use crate::descriptor::PluginInfo;

/// Opaque data the host hands to a plugin's `init`.
///
/// The bridge forwards it as a marker only; nothing in it reaches plugin code.
#[derive(Debug, Clone, Default)]
pub struct HostData {
    /// Name of the host application.
    pub app_name: String,
    /// Version of the host application.
    pub app_version: String,
}

impl HostData {
    /// Create host data for the named application.
    pub fn new(app_name: impl Into<String>, app_version: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_version: app_version.into(),
        }
    }
}

/// Handle to a host-owned configuration dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialogHandle(pub usize);

/// Handle to a widget a plugin returns for its configuration page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetHandle(pub usize);

/// The statically known plugin interface.
///
/// Every method reports failure through a sentinel (`-1`, `None`, or nothing)
/// and the error slot; callers check [`has_error`](Self::has_error) after each
/// call.
pub trait HostPlugin {
    /// Negotiate the API version. Returns `-1` on failure.
    fn version_check(&mut self, abi_version: i32) -> i32;

    /// Fetch the plugin's metadata.
    fn set_info(&mut self) -> Option<PluginInfo<'_>>;

    /// Initialize the plugin.
    fn init(&mut self, data: &HostData);

    /// Release whatever the plugin set up in `init`.
    fn cleanup(&mut self);

    /// Build the plugin's configuration page.
    fn configure(&mut self, dialog: &DialogHandle) -> Option<WidgetHandle>;

    /// Show the plugin's help.
    fn help(&mut self);

    /// Whether the last call failed.
    fn has_error(&self) -> bool;

    /// Forget the last failure.
    fn clear_error(&mut self);

    /// Text of the last failure, empty if none.
    fn error(&self) -> &str;
}
