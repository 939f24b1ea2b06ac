//! Globals installed in every plugin sub-context.

use mlua::{Function, Lua, Table, Value as LuaValue};
use tracing::Level;

use hookbridge_core::{BridgeConfig, BridgeError, BridgeResult, HOST_ABI_VERSION, MIN_API_VERSION};

use crate::context::ContextGuard;

/// Globals removed when sandboxing is on.
const SANDBOXED_GLOBALS: [&str; 3] = ["loadfile", "dofile", "load"];

fn setup_error(e: mlua::Error) -> BridgeError {
    BridgeError::ContextCreation {
        message: e.to_string(),
    }
}

/// Apply the sandbox and install the `host` table, as configured.
pub(crate) fn prepare(
    guard: &ContextGuard<'_>,
    plugin: &str,
    config: &BridgeConfig,
) -> BridgeResult<()> {
    let lua = guard.lua();
    let globals = lua.globals();

    if config.sandbox {
        for name in SANDBOXED_GLOBALS {
            globals.set(name, LuaValue::Nil).map_err(setup_error)?;
        }
    }

    if config.host_api {
        let host = create_host_api(lua, plugin).map_err(setup_error)?;
        globals.set("host", host).map_err(setup_error)?;
    }

    Ok(())
}

/// Create the `host` namespace.
fn create_host_api(lua: &Lua, plugin: &str) -> mlua::Result<Table> {
    let host = lua.create_table()?;

    host.set("api_version", MIN_API_VERSION)?;
    host.set("abi_version", HOST_ABI_VERSION)?;
    host.set("version", env!("CARGO_PKG_VERSION"))?;
    host.set("plugin", plugin)?;

    host.set("log_info", log_function(lua, plugin, Level::INFO)?)?;
    host.set("log_warn", log_function(lua, plugin, Level::WARN)?)?;
    host.set("log_error", log_function(lua, plugin, Level::ERROR)?)?;

    Ok(host)
}

fn log_function(lua: &Lua, plugin: &str, level: Level) -> mlua::Result<Function> {
    let plugin = plugin.to_string();
    lua.create_function(move |_, msg: String| {
        if level == Level::ERROR {
            tracing::error!(target: "plugin", plugin = %plugin, "{}", msg);
        } else if level == Level::WARN {
            tracing::warn!(target: "plugin", plugin = %plugin, "{}", msg);
        } else {
            tracing::info!(target: "plugin", plugin = %plugin, "{}", msg);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InterpreterContext, MainContext};

    #[test]
    fn test_prepare_installs_host_table() {
        let main = MainContext::new().unwrap();
        let ctx = InterpreterContext::new(&main, &BridgeConfig::default()).unwrap();
        let guard = ctx.enter();
        prepare(&guard, "demo", &BridgeConfig::default()).unwrap();

        let lua = guard.lua();
        let api: i32 = lua.load("return host.api_version").eval().unwrap();
        let name: String = lua.load("return host.plugin").eval().unwrap();
        assert_eq!(api, MIN_API_VERSION);
        assert_eq!(name, "demo");
        lua.load("host.log_info('hello from plugin')").exec().unwrap();
    }

    #[test]
    fn test_prepare_sandbox() {
        let main = MainContext::new().unwrap();
        let ctx = InterpreterContext::new(&main, &BridgeConfig::default()).unwrap();
        let guard = ctx.enter();
        prepare(&guard, "demo", &BridgeConfig::default()).unwrap();

        let globals = guard.lua().globals();
        for name in SANDBOXED_GLOBALS {
            assert!(globals.get::<LuaValue>(name).unwrap().is_nil(), "{name} survived");
        }
        assert!(!globals.get::<LuaValue>("require").unwrap().is_nil());
    }

    #[test]
    fn test_prepare_disabled() {
        let main = MainContext::new().unwrap();
        let config = BridgeConfig::builder()
            .sandbox(false)
            .host_api(false)
            .build()
            .unwrap();
        let ctx = InterpreterContext::new(&main, &config).unwrap();
        let guard = ctx.enter();
        prepare(&guard, "demo", &config).unwrap();

        let globals = guard.lua().globals();
        assert!(globals.get::<LuaValue>("host").unwrap().is_nil());
        assert!(!globals.get::<LuaValue>("dofile").unwrap().is_nil());
    }
}
