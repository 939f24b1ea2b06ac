//! Lua plugin hosting for hookbridge.
//!
//! Each plugin lives in its own Lua sub-context, created under the host's
//! [`MainContext`]. Loading a plugin imports its module with `require`,
//! resolves the six hook names once, and keeps them in a [`HookTable`]. The
//! host then drives the plugin through [`PluginState`] (or the
//! [`ScriptPlugin`] adapter implementing [`HostPlugin`]), which switches into
//! the sub-context around every call and reports failures through a
//! single-slot error channel.
//!
//! # Plugin module contract
//!
//! | Hook            | Required | Return value                  |
//! |-----------------|----------|-------------------------------|
//! | `version_check` | no       | integer API version           |
//! | `set_info`      | yes      | table with a string `name`    |
//! | `init`          | yes      | ignored                       |
//! | `cleanup`       | no       | ignored                       |
//! | `configure`     | no       | currently never called        |
//! | `help`          | no       | ignored                       |
//!
//! # Example
//!
//! ```ignore
//! use hookbridge_core::{BridgeConfig, HOST_ABI_VERSION, HostData};
//! use hookbridge_plugin::{MainContext, PluginState};
//!
//! let main = MainContext::new()?;
//! let mut plugin = PluginState::create(&main, "myplugin", Some(dir), &BridgeConfig::default())?;
//!
//! let api = plugin.version_check(HOST_ABI_VERSION);
//! if let Some(info) = plugin.set_info() {
//!     println!("{} {}", info.name, info.version);
//! }
//! plugin.init(&HostData::new("editor", "1.0"));
//! plugin.destroy();
//! ```
//!
//! [`HostPlugin`]: hookbridge_core::HostPlugin

mod adapter;
mod bindings;
mod context;
mod dispatcher;
mod hooks;
mod module;
mod state;

pub use adapter::ScriptPlugin;
pub use context::{ContextGuard, ContextId, InterpreterContext, MainContext};
pub use hooks::{Callable, HookName, HookTable, is_callable};
pub use module::{ModulePlugin, import, resolve};
pub use state::PluginState;
