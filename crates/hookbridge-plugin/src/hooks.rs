//! The closed set of plugin hooks and their resolved handles.

use mlua::{Function, Lua, RegistryKey, Value as LuaValue};
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator, IntoStaticStr};

use hookbridge_core::{BridgeError, BridgeResult};

use crate::context::ContextGuard;

/// Entry points a plugin module may expose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum HookName {
    /// Reports the API version the plugin needs.
    VersionCheck,
    /// Returns the plugin's metadata table.
    SetInfo,
    /// Called when the plugin is activated.
    Init,
    /// Called when the plugin is deactivated.
    Cleanup,
    /// Builds the configuration page.
    Configure,
    /// Shows the plugin's documentation.
    Help,
}

impl HookName {
    /// Name of the module attribute holding this hook.
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Whether a module without this hook is rejected.
    pub fn is_required(self) -> bool {
        matches!(self, Self::SetInfo | Self::Init)
    }

    /// All hooks, required ones first.
    pub fn resolution_order() -> impl Iterator<Item = HookName> {
        Self::iter()
            .filter(|h| h.is_required())
            .chain(Self::iter().filter(|h| !h.is_required()))
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Whether `value` can be called like a function.
///
/// Functions qualify, as do tables whose metatable has a `__call` function.
pub fn is_callable(value: &LuaValue) -> bool {
    match value {
        LuaValue::Function(_) => true,
        LuaValue::Table(t) => t
            .metatable()
            .is_some_and(|mt| matches!(mt.raw_get::<LuaValue>("__call"), Ok(LuaValue::Function(_)))),
        _ => false,
    }
}

fn call_value(value: LuaValue) -> mlua::Result<LuaValue> {
    match value {
        LuaValue::Function(f) => f.call(()),
        LuaValue::Table(t) => {
            let call: Function = t
                .metatable()
                .ok_or_else(|| mlua::Error::runtime("table has no metatable"))?
                .raw_get("__call")?;
            call.call(t)
        }
        other => Err(mlua::Error::runtime(format!(
            "attempt to call a {} value",
            other.type_name()
        ))),
    }
}

/// A resolved hook, anchored in its sub-context's registry.
#[derive(Debug)]
pub struct Callable {
    key: RegistryKey,
}

impl Callable {
    pub(crate) fn new(lua: &Lua, value: LuaValue) -> mlua::Result<Self> {
        Ok(Self {
            key: lua.create_registry_value(value)?,
        })
    }

    /// Call the hook with no arguments.
    ///
    /// Callability is checked again first, since plugin code may have changed
    /// a callable table's metatable since resolution. Lua errors are logged in
    /// full before being translated.
    pub fn invoke(&self, guard: &ContextGuard<'_>, hook: HookName) -> BridgeResult<LuaValue> {
        let value: LuaValue = guard
            .lua()
            .registry_value(&self.key)
            .map_err(|e| BridgeError::Invocation {
                hook: hook.as_str(),
                message: e.to_string(),
            })?;

        if !is_callable(&value) {
            return Err(BridgeError::NotCallable {
                hook: hook.as_str(),
            });
        }

        call_value(value).map_err(|e| {
            tracing::error!(context = %guard.id(), %hook, error = %e, "plugin hook raised an error");
            BridgeError::Invocation {
                hook: hook.as_str(),
                message: e.to_string(),
            }
        })
    }

    pub(crate) fn release(self, lua: &Lua) {
        if let Err(e) = lua.remove_registry_value(self.key) {
            tracing::warn!(error = %e, "failed to release hook handle");
        }
    }
}

/// Resolved hooks of one plugin, keyed by [`HookName`].
#[derive(Debug)]
pub struct HookTable {
    slots: [Option<Callable>; HookName::COUNT],
}

impl HookTable {
    /// Create a table with no hooks.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Get a resolved hook.
    pub fn get(&self, hook: HookName) -> Option<&Callable> {
        self.slots[hook.index()].as_ref()
    }

    /// Check if a hook was resolved.
    pub fn contains(&self, hook: HookName) -> bool {
        self.get(hook).is_some()
    }

    /// Store the resolution result for a hook.
    pub(crate) fn insert(&mut self, hook: HookName, callable: Option<Callable>) {
        self.slots[hook.index()] = callable;
    }

    /// Hooks that were resolved, in declaration order.
    pub fn present(&self) -> impl Iterator<Item = HookName> + '_ {
        HookName::iter().filter(|h| self.contains(*h))
    }

    /// Release every handle. Must run inside the owning sub-context.
    pub(crate) fn release(&mut self, lua: &Lua) {
        for slot in &mut self.slots {
            if let Some(callable) = slot.take() {
                callable.release(lua);
            }
        }
    }
}

impl Default for HookTable {
    fn default() -> Self {
        Self::new()
    }
}
