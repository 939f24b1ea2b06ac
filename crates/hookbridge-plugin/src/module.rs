//! Importing a plugin module and resolving its hooks.

use std::path::{Path, PathBuf};

use mlua::{Function, RegistryKey, Table, Value as LuaValue};

use hookbridge_core::{BridgeError, BridgeResult};

use crate::context::ContextGuard;
use crate::hooks::{Callable, HookName, HookTable, is_callable};

/// Import `module_name` into the entered sub-context.
///
/// Each search directory is put in front of `package.path` (in the given
/// order) before `require` runs. The module must evaluate to a table.
pub fn import(
    guard: &ContextGuard<'_>,
    module_name: &str,
    search_paths: &[PathBuf],
) -> BridgeResult<Table> {
    let import_error = |message: String| BridgeError::Import {
        module: module_name.to_string(),
        message,
    };

    if module_name.is_empty() {
        return Err(import_error("module name is empty".to_string()));
    }

    let lua = guard.lua();
    let globals = lua.globals();

    if !search_paths.is_empty() {
        let package: Table = globals
            .get("package")
            .map_err(|e| import_error(format!("Failed to retrieve package table: {e}")))?;
        let current: String = package
            .get("path")
            .map_err(|e| import_error(format!("Failed to retrieve package.path: {e}")))?;
        package
            .set("path", prepend_search_paths(&current, search_paths))
            .map_err(|e| import_error(e.to_string()))?;
    }

    let require: Function = globals
        .get("require")
        .map_err(|e| import_error(format!("require is unavailable: {e}")))?;

    let module: LuaValue = require.call(module_name).map_err(|e| {
        tracing::error!(context = %guard.id(), module = module_name, error = %e, "module import failed");
        import_error(e.to_string())
    })?;

    match module {
        LuaValue::Table(table) => Ok(table),
        other => Err(import_error(format!(
            "module returned a value of type {} instead of a table",
            other.type_name()
        ))),
    }
}

fn prepend_search_paths(current: &str, dirs: &[PathBuf]) -> String {
    let mut path = String::new();
    for dir in dirs {
        let dir = dir.to_string_lossy();
        path.push_str(&format!("{dir}/?.lua;{dir}/?/init.lua;"));
    }
    path.push_str(current);
    path
}

/// Look up one hook on an imported module.
///
/// A missing or uncallable hook is an error only when `required`; otherwise
/// it resolves to `None` and the uncallable value is dropped.
pub fn resolve(
    guard: &ContextGuard<'_>,
    module: &Table,
    hook: HookName,
    required: bool,
) -> BridgeResult<Option<Callable>> {
    let value: LuaValue = match module.get(hook.as_str()) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(context = %guard.id(), %hook, error = %e, "hook lookup raised an error");
            LuaValue::Nil
        }
    };

    if value.is_nil() {
        if required {
            return Err(BridgeError::HookNotFound {
                hook: hook.as_str(),
            });
        }
        return Ok(None);
    }

    if !is_callable(&value) {
        if required {
            return Err(BridgeError::HookNotCallable {
                hook: hook.as_str(),
            });
        }
        tracing::debug!(
            context = %guard.id(),
            %hook,
            type_name = value.type_name(),
            "ignoring uncallable optional hook"
        );
        return Ok(None);
    }

    Callable::new(guard.lua(), value)
        .map(Some)
        .map_err(|e| BridgeError::ContextCreation {
            message: format!("Failed to anchor hook '{hook}': {e}"),
        })
}

/// An imported plugin module together with its resolved hooks.
#[derive(Debug)]
pub struct ModulePlugin {
    name: String,
    module: Option<RegistryKey>,
    hooks: HookTable,
}

impl ModulePlugin {
    /// Import the module and resolve every hook once.
    ///
    /// On failure, whatever was resolved so far is released before returning.
    pub fn load(
        guard: &ContextGuard<'_>,
        module_name: &str,
        search_paths: &[PathBuf],
    ) -> BridgeResult<Self> {
        let lua = guard.lua();
        let table = import(guard, module_name, search_paths)?;

        let mut hooks = HookTable::new();
        for hook in HookName::resolution_order() {
            match resolve(guard, &table, hook, hook.is_required()) {
                Ok(callable) => hooks.insert(hook, callable),
                Err(err) => {
                    hooks.release(lua);
                    return Err(err);
                }
            }
        }

        let module = match lua.create_registry_value(table) {
            Ok(key) => key,
            Err(e) => {
                hooks.release(lua);
                return Err(BridgeError::ContextCreation {
                    message: format!("Failed to anchor module '{module_name}': {e}"),
                });
            }
        };

        tracing::debug!(
            context = %guard.id(),
            module = module_name,
            hooks = ?hooks.present().collect::<Vec<_>>(),
            "plugin module loaded"
        );

        Ok(Self {
            name: module_name.to_string(),
            module: Some(module),
            hooks,
        })
    }

    /// Module name as passed to `require`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved hooks.
    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// Release the module and hook handles. Must run inside the owning
    /// sub-context; calling it twice is a no-op.
    pub(crate) fn release(&mut self, guard: &ContextGuard<'_>) {
        let lua = guard.lua();
        self.hooks.release(lua);
        if let Some(key) = self.module.take() {
            if let Err(e) = lua.remove_registry_value(key) {
                tracing::warn!(module = %self.name, error = %e, "failed to release module handle");
            }
        }
    }
}

/// Module search path for a plugin: its own directory first, then the
/// configured ones.
pub(crate) fn search_paths(own: Option<&Path>, configured: &[PathBuf]) -> Vec<PathBuf> {
    own.map(Path::to_path_buf)
        .into_iter()
        .chain(configured.iter().cloned())
        .collect()
}
