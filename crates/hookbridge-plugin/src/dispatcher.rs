//! The six plugin operations.
//!
//! Each operation enters the plugin's sub-context for its whole duration,
//! clears the error channel, and on failure leaves a description there and
//! returns a sentinel (`-1`, `None`, or nothing).

use mlua::{Table, Value as LuaValue};

use hookbridge_core::{
    BridgeError, BridgeResult, DialogHandle, HOST_ABI_VERSION, HostData, MIN_API_VERSION,
    PluginDescriptor, PluginInfo, WidgetHandle,
};

use crate::context::ContextGuard;
use crate::hooks::{HookName, HookTable};
use crate::state::PluginState;

impl PluginState<'_> {
    fn dispatch<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&ContextGuard<'_>, &HookTable, &mut Option<PluginDescriptor>) -> BridgeResult<T>,
    ) -> BridgeResult<T> {
        let guard = self.context.enter();
        self.error.clear();

        let result = f(&guard, self.plugin.hooks(), &mut self.descriptor);
        guard.leave();

        if let Err(err) = &result {
            tracing::debug!(module = self.plugin.name(), op, error = %err, "plugin operation failed");
            self.error.set_error(err);
        }
        result
    }

    /// Negotiate the API version.
    ///
    /// Returns the plugin's API version, [`MIN_API_VERSION`] when the plugin
    /// has no `version_check` or asks for a negative one, and `-1` on failure.
    pub fn version_check(&mut self, abi_version: i32) -> i32 {
        self.dispatch("version_check", |guard, hooks, _| {
            if abi_version != HOST_ABI_VERSION {
                return Err(BridgeError::AbiMismatch {
                    expected: HOST_ABI_VERSION,
                    got: abi_version,
                });
            }

            let Some(hook) = hooks.get(HookName::VersionCheck) else {
                return Ok(MIN_API_VERSION);
            };

            let value = hook.invoke(guard, HookName::VersionCheck)?;
            let version = coerce_version(&value)?;
            Ok(if version < 0 { MIN_API_VERSION } else { version })
        })
        .unwrap_or(-1)
    }

    /// Call `set_info` and store the resulting metadata.
    ///
    /// The returned strings borrow this plugin. On failure the previously
    /// stored descriptor, if any, is left untouched and `None` is returned.
    pub fn set_info(&mut self) -> Option<PluginInfo<'_>> {
        self.extract_info().ok()?;
        self.descriptor.as_ref().map(PluginDescriptor::as_info)
    }

    pub(crate) fn extract_info(&mut self) -> BridgeResult<()> {
        self.dispatch("set_info", |guard, hooks, descriptor| {
            let hook = hooks.get(HookName::SetInfo).ok_or(BridgeError::HookNotFound {
                hook: HookName::SetInfo.as_str(),
            })?;

            let table = match hook.invoke(guard, HookName::SetInfo)? {
                LuaValue::Table(table) => table,
                other => {
                    return Err(BridgeError::NotAMapping {
                        type_name: other.type_name(),
                    });
                }
            };

            *descriptor = Some(read_descriptor(&table)?);
            Ok(())
        })
    }

    /// Call `init`.
    ///
    /// `data` is not passed to the plugin. A failure is only recorded; the
    /// plugin stays loaded and the host decides what to do with it.
    pub fn init(&mut self, data: &HostData) {
        tracing::debug!(module = self.plugin.name(), host = %data.app_name, "initializing plugin");
        let _ = self.dispatch("init", |guard, hooks, _| {
            let hook = hooks.get(HookName::Init).ok_or(BridgeError::HookNotFound {
                hook: HookName::Init.as_str(),
            })?;
            hook.invoke(guard, HookName::Init).map(drop)
        });
    }

    /// Call `cleanup` if the plugin has one.
    pub fn cleanup(&mut self) {
        let _ = self.dispatch("cleanup", |guard, hooks, _| {
            call_optional(guard, hooks, HookName::Cleanup)
        });
    }

    /// Call `help` if the plugin has one.
    pub fn help(&mut self) {
        let _ = self.dispatch("help", |guard, hooks, _| {
            call_optional(guard, hooks, HookName::Help)
        });
    }

    /// Build the plugin's configuration page.
    ///
    /// Not part of the current contract: always records a "not implemented"
    /// error and returns `None`, whether or not the plugin has a `configure`
    /// hook.
    pub fn configure(&mut self, _dialog: &DialogHandle) -> Option<WidgetHandle> {
        self.dispatch("configure", |_, _, _| {
            Err::<WidgetHandle, _>(BridgeError::NotImplemented {
                operation: "configure",
            })
        })
        .ok()
    }
}

fn call_optional(guard: &ContextGuard<'_>, hooks: &HookTable, hook: HookName) -> BridgeResult<()> {
    match hooks.get(hook) {
        Some(callable) => callable.invoke(guard, hook).map(drop),
        None => Ok(()),
    }
}

/// Convert a `version_check` result to a host integer.
///
/// Floats are accepted only when they hold an exact integer value.
pub(crate) fn coerce_version(value: &LuaValue) -> BridgeResult<i32> {
    match value {
        LuaValue::Integer(i) => i32::try_from(*i).map_err(|_| BridgeError::OutOfRange {
            value: i.to_string(),
        }),
        LuaValue::Number(n) => {
            if n.is_infinite() {
                return Err(BridgeError::OutOfRange {
                    value: format!("{n:e}"),
                });
            }
            if n.fract() != 0.0 || n.is_nan() {
                return Err(BridgeError::NotAnInteger { value: *n });
            }
            if *n < f64::from(i32::MIN) || *n > f64::from(i32::MAX) {
                return Err(BridgeError::OutOfRange {
                    value: format!("{n:e}"),
                });
            }
            Ok(*n as i32)
        }
        other => Err(BridgeError::NotANumber {
            type_name: other.type_name(),
        }),
    }
}

const NAME_KEY: &str = "name";

/// Build a descriptor from a `set_info` table.
///
/// `name` must be a string. The other fields fall back to their defaults with
/// a warning.
pub(crate) fn read_descriptor(table: &Table) -> BridgeResult<PluginDescriptor> {
    let name = string_field(table, NAME_KEY).map_err(|reason| {
        tracing::debug!(%reason, "set_info returned no usable name");
        BridgeError::MissingName
    })?;

    let optional = |key: &str, default: &str| {
        string_field(table, key).unwrap_or_else(|reason| {
            tracing::warn!(plugin = %name, key, %reason, "Plugin did not provide '{key}' info, which it should");
            default.to_string()
        })
    };

    Ok(PluginDescriptor {
        description: optional("description", PluginDescriptor::DEFAULT_DESCRIPTION),
        version: optional("version", PluginDescriptor::DEFAULT_VERSION),
        author: optional("author", PluginDescriptor::DEFAULT_AUTHOR),
        name,
    })
}

fn string_field(table: &Table, key: &str) -> Result<String, String> {
    match table.get::<LuaValue>(key) {
        Ok(LuaValue::String(s)) => s
            .to_str()
            .map(|s| s.to_string())
            .map_err(|e| format!("Failed to encode value for key '{key}' as a UTF-8 string: {e}")),
        Ok(LuaValue::Nil) => Err(format!("Failed to retrieve value for '{key}' key")),
        Ok(other) => Err(format!(
            "Value for key '{key}' was not a string (got {})",
            other.type_name()
        )),
        Err(e) => Err(format!("Failed to retrieve value for '{key}' key: {e}")),
    }
}
