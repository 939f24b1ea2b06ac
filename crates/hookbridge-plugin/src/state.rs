//! Per-plugin state: construction and teardown.

use std::path::Path;

use hookbridge_core::{BridgeConfig, BridgeResult, ErrorChannel, PluginDescriptor};

use crate::bindings;
use crate::context::{ContextGuard, ContextId, InterpreterContext, MainContext};
use crate::hooks::{HookName, HookTable};
use crate::module::{self, ModulePlugin};

/// Everything one loaded plugin owns.
///
/// A value of this type only exists fully constructed: a failed
/// [`create`](Self::create) unwinds what it built and returns an error.
/// Dropping it (or calling [`destroy`](Self::destroy)) releases the hooks and
/// module inside the sub-context, then closes the sub-context once.
pub struct PluginState<'h> {
    pub(crate) context: InterpreterContext<'h>,
    pub(crate) plugin: ModulePlugin,
    pub(crate) error: ErrorChannel,
    pub(crate) descriptor: Option<PluginDescriptor>,
}

impl<'h> PluginState<'h> {
    /// Create a sub-context, import `module_name` into it and resolve its hooks.
    ///
    /// `search_path`, when given, is searched for the module before the
    /// configured search paths.
    pub fn create(
        main: &'h MainContext,
        module_name: &str,
        search_path: Option<&Path>,
        config: &BridgeConfig,
    ) -> BridgeResult<Self> {
        let context = InterpreterContext::new(main, config)?;

        let plugin = {
            let guard = context.enter();
            bindings::prepare(&guard, module_name, config)?;
            let paths = module::search_paths(search_path, &config.search_paths);
            ModulePlugin::load(&guard, module_name, &paths)?
        };

        tracing::debug!(module = module_name, context = %context.id(), "plugin ready");

        Ok(Self {
            context,
            plugin,
            error: ErrorChannel::new(),
            descriptor: None,
        })
    }

    /// Tear the plugin down.
    pub fn destroy(self) {
        drop(self);
    }

    /// Module name the plugin was loaded from.
    pub fn module_name(&self) -> &str {
        self.plugin.name()
    }

    /// ID of the plugin's sub-context.
    pub fn context_id(&self) -> ContextId {
        self.context.id()
    }

    /// The main context this plugin was created under.
    pub fn main_context(&self) -> &'h MainContext {
        self.context.main()
    }

    /// The resolved hooks.
    pub fn hooks(&self) -> &HookTable {
        self.plugin.hooks()
    }

    /// Whether the module exposes a callable `hook`.
    pub fn has_hook(&self, hook: HookName) -> bool {
        self.plugin.hooks().contains(hook)
    }

    /// Metadata from the last successful `set_info`.
    pub fn descriptor(&self) -> Option<&PluginDescriptor> {
        self.descriptor.as_ref()
    }

    /// Whether the last operation failed.
    pub fn has_error(&self) -> bool {
        self.error.has_error()
    }

    /// Forget the last failure.
    pub fn clear_error(&mut self) {
        self.error.clear();
    }

    /// Text of the last failure, empty if none.
    pub fn error(&self) -> &str {
        self.error.get()
    }

    /// Enter the sub-context for host code that needs the plugin's Lua state.
    pub fn enter(&self) -> ContextGuard<'_> {
        self.context.enter()
    }
}

impl Drop for PluginState<'_> {
    fn drop(&mut self) {
        let guard = self.context.enter();
        self.plugin.release(&guard);
        guard.leave();
        tracing::debug!(module = self.plugin.name(), "plugin destroyed");
    }
}

impl std::fmt::Debug for PluginState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginState")
            .field("module", &self.plugin.name())
            .field("context", &self.context)
            .field("error", &self.error.get())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
