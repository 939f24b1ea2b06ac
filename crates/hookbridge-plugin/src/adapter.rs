//! Adapter exposing a [`PluginState`] through the host's [`HostPlugin`] interface.

use std::path::Path;

use hookbridge_core::{
    BridgeConfig, BridgeError, BridgeResult, DialogHandle, HostData, HostPlugin, PluginInfo,
    WidgetHandle,
};

use crate::context::MainContext;
use crate::state::PluginState;

/// One loaded Lua plugin as the host sees it.
///
/// Creation also extracts the plugin's metadata, so a plugin without a usable
/// `name` never loads. Every failing call is reported at `error` level in
/// addition to being kept in the error slot.
#[derive(Debug)]
pub struct ScriptPlugin<'h> {
    state: PluginState<'h>,
}

impl<'h> ScriptPlugin<'h> {
    /// Load `module_name` and read its metadata.
    pub fn create(
        main: &'h MainContext,
        module_name: &str,
        search_path: Option<&Path>,
        config: &BridgeConfig,
    ) -> BridgeResult<Self> {
        let mut state = PluginState::create(main, module_name, search_path, config).map_err(|err| {
            tracing::error!(module = module_name, error = %err, "Failed to initialize plugin");
            err
        })?;

        if let Err(err) = state.extract_info() {
            tracing::error!(module = module_name, error = %err, "Failed to read plugin metadata");
            return Err(BridgeError::Metadata(Box::new(err)));
        }

        Ok(Self { state })
    }

    /// The wrapped plugin state.
    pub fn state(&self) -> &PluginState<'h> {
        &self.state
    }

    /// Unwrap the plugin state.
    pub fn into_state(self) -> PluginState<'h> {
        self.state
    }

    /// Tear the plugin down.
    pub fn destroy(self) {
        self.state.destroy();
    }

    fn report(&self, op: &str) {
        if self.state.has_error() {
            tracing::error!(module = self.state.module_name(), op, "{}", self.state.error());
        }
    }
}

impl HostPlugin for ScriptPlugin<'_> {
    fn version_check(&mut self, abi_version: i32) -> i32 {
        let api_version = self.state.version_check(abi_version);
        if api_version < 0 {
            self.report("version_check");
        }
        api_version
    }

    fn set_info(&mut self) -> Option<PluginInfo<'_>> {
        // Metadata is read once, at creation; later calls hand out the same strings.
        if self.state.descriptor().is_none() {
            if self.state.extract_info().is_err() {
                self.report("set_info");
                return None;
            }
        } else {
            self.state.clear_error();
        }
        self.state.descriptor().map(|d| d.as_info())
    }

    fn init(&mut self, data: &HostData) {
        self.state.init(data);
        self.report("init");
    }

    fn cleanup(&mut self) {
        self.state.cleanup();
        self.report("cleanup");
    }

    fn configure(&mut self, dialog: &DialogHandle) -> Option<WidgetHandle> {
        let widget = self.state.configure(dialog);
        if widget.is_none() {
            self.report("configure");
        }
        widget
    }

    fn help(&mut self) {
        self.state.help();
        self.report("help");
    }

    fn has_error(&self) -> bool {
        self.state.has_error()
    }

    fn clear_error(&mut self) {
        self.state.clear_error();
    }

    fn error(&self) -> &str {
        self.state.error()
    }
}
