//! Core types for hookbridge.
//!
//! This crate holds the runtime-agnostic pieces of the plugin adapter: the
//! single-slot error channel, the plugin descriptor loaned to the host, the
//! error taxonomy, the bridge configuration, and the fixed interface a host
//! application programs against.

mod channel;
mod config;
mod descriptor;
mod error;
mod host;

pub use channel::ErrorChannel;
pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use descriptor::{PluginDescriptor, PluginInfo};
pub use error::{BridgeError, BridgeResult, ErrorKind};
pub use host::{DialogHandle, HostData, HostPlugin, WidgetHandle};

/// ABI version the host was compiled against.
///
/// A plugin negotiating any other ABI version is rejected outright.
pub const HOST_ABI_VERSION: i32 = 69;

/// Minimum (and default) API version reported for a plugin.
pub const MIN_API_VERSION: i32 = 211;
