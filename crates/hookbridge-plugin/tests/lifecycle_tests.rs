use std::path::Path;

use hookbridge_core::{
    BridgeConfig, BridgeError, DialogHandle, HOST_ABI_VERSION, HostData, HostPlugin,
    MIN_API_VERSION, PluginDescriptor,
};
use hookbridge_plugin::{HookName, MainContext, PluginState, ScriptPlugin};
use tempfile::TempDir;

const MINIMAL: &str = r#"
local M = {}
function M.set_info() return { name = "Demo" } end
function M.init() end
return M
"#;

fn plugin_dir(modules: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, source) in modules {
        std::fs::write(dir.path().join(format!("{name}.lua")), source).unwrap();
    }
    dir
}

fn with_version_check(body: &str) -> String {
    format!(
        r#"
local M = {{}}
function M.set_info() return {{ name = "Versioned" }} end
function M.init() end
function M.version_check() {body} end
return M
"#
    )
}

fn create<'h>(main: &'h MainContext, dir: &Path, module: &str) -> PluginState<'h> {
    PluginState::create(main, module, Some(dir), &BridgeConfig::default()).unwrap()
}

fn host_data() -> HostData {
    HostData::new("test-host", "1.0")
}

// ==================== Version negotiation ====================

#[test]
fn test_version_check_defaults_without_hook() {
    let dir = plugin_dir(&[("minimal", MINIMAL)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "minimal");

    assert!(!plugin.has_hook(HookName::VersionCheck));
    assert_eq!(plugin.version_check(HOST_ABI_VERSION), MIN_API_VERSION);
    assert!(!plugin.has_error());
}

#[test]
fn test_version_check_returns_plugin_value() {
    let dir = plugin_dir(&[("v", &with_version_check("return 215"))]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "v");

    assert_eq!(plugin.version_check(HOST_ABI_VERSION), 215);
    assert!(!plugin.has_error());
}

#[test]
fn test_abi_mismatch_fails_regardless_of_hook() {
    let dir = plugin_dir(&[
        ("minimal", MINIMAL),
        ("v", &with_version_check("return 215")),
    ]);
    let main = MainContext::new().unwrap();

    for module in ["minimal", "v"] {
        let mut plugin = create(&main, dir.path(), module);
        assert_eq!(plugin.version_check(HOST_ABI_VERSION + 1), -1);
        assert!(plugin.has_error());
        assert!(plugin.error().contains("Mismatched host ABI versions"));
    }
}

#[test]
fn test_version_check_out_of_range() {
    let dir = plugin_dir(&[("big", &with_version_check("return 9999999999999"))]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "big");

    assert_eq!(plugin.version_check(HOST_ABI_VERSION), -1);
    assert!(plugin.has_error());
    assert!(plugin.error().contains("out of range"));
    assert!(plugin.error().contains("9999999999999"));
}

#[test]
fn test_version_check_negative_uses_default() {
    let dir = plugin_dir(&[("neg", &with_version_check("return -1"))]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "neg");

    assert_eq!(plugin.version_check(HOST_ABI_VERSION), MIN_API_VERSION);
    assert!(!plugin.has_error());
}

#[test]
fn test_version_check_non_number() {
    let dir = plugin_dir(&[
        ("str", &with_version_check("return '211'")),
        ("frac", &with_version_check("return 211.5")),
        ("whole", &with_version_check("return 212.0")),
    ]);
    let main = MainContext::new().unwrap();

    let mut plugin = create(&main, dir.path(), "str");
    assert_eq!(plugin.version_check(HOST_ABI_VERSION), -1);
    assert!(plugin.error().contains("not a number"));

    let mut plugin = create(&main, dir.path(), "frac");
    assert_eq!(plugin.version_check(HOST_ABI_VERSION), -1);
    assert!(plugin.error().contains("not an integer"));

    let mut plugin = create(&main, dir.path(), "whole");
    assert_eq!(plugin.version_check(HOST_ABI_VERSION), 212);
}

#[test]
fn test_version_check_raising_hook() {
    let dir = plugin_dir(&[("boom", &with_version_check("error('no version for you')"))]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "boom");

    assert_eq!(plugin.version_check(HOST_ABI_VERSION), -1);
    assert!(plugin.error().contains("Failed calling plugin's 'version_check' function"));
    assert!(plugin.error().contains("no version for you"));
}

// ==================== Metadata ====================

#[test]
fn test_set_info_defaults() {
    let dir = plugin_dir(&[("minimal", MINIMAL)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "minimal");

    let info = plugin.set_info().unwrap();
    assert_eq!(info.name, "Demo");
    assert_eq!(info.description, "");
    assert_eq!(info.version, "Unspecified");
    assert_eq!(info.author, "Anonymous");
    assert!(!plugin.has_error());
    assert_eq!(plugin.descriptor(), Some(&PluginDescriptor::new("Demo")));
}

#[test]
fn test_set_info_full() {
    let source = r#"
return {
    set_info = function()
        return { name = "Full", description = "Does things", version = "2.1", author = "Jo" }
    end,
    init = function() end,
}
"#;
    let dir = plugin_dir(&[("full", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "full");

    let info = plugin.set_info().unwrap();
    assert_eq!(info.to_string(), "Full 2.1 by Jo");
    assert_eq!(info.description, "Does things");
}

#[test]
fn test_set_info_without_name() {
    let source = r#"
return {
    set_info = function() return { author = "Jo" } end,
    init = function() end,
}
"#;
    let dir = plugin_dir(&[("noname", source)]);
    let main = MainContext::new().unwrap();

    let err = ScriptPlugin::create(&main, "noname", Some(dir.path()), &BridgeConfig::default())
        .unwrap_err();
    assert_eq!(err, BridgeError::Metadata(Box::new(BridgeError::MissingName)));
    assert_eq!(main.live_sub_contexts(), 0);
    assert!(main.is_main_active());

    let mut plugin = create(&main, dir.path(), "noname");
    assert!(plugin.set_info().is_none());
    assert!(plugin.has_error());
    assert!(plugin.descriptor().is_none());
}

#[test]
fn test_set_info_non_mapping() {
    let source = r#"
return {
    set_info = function() return "Demo" end,
    init = function() end,
}
"#;
    let dir = plugin_dir(&[("scalar", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "scalar");

    assert!(plugin.set_info().is_none());
    assert!(plugin.error().contains("non-mapping"));
}

#[test]
fn test_failed_set_info_keeps_previous_descriptor() {
    let source = r#"
local M = { broken = false }
function M.set_info()
    if M.broken then return {} end
    return { name = "Stable" }
end
function M.init() M.broken = true end
return M
"#;
    let dir = plugin_dir(&[("flaky", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "flaky");

    assert!(plugin.set_info().is_some());
    plugin.init(&host_data());
    assert!(plugin.set_info().is_none());
    assert_eq!(plugin.descriptor().map(|d| d.name.as_str()), Some("Stable"));
}

// ==================== Error channel ====================

#[test]
fn test_every_call_clears_previous_error() {
    let dir = plugin_dir(&[("minimal", MINIMAL)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "minimal");

    assert_eq!(plugin.version_check(0), -1);
    assert!(plugin.has_error());

    plugin.help();
    assert!(!plugin.has_error());

    assert!(plugin.configure(&DialogHandle(1)).is_none());
    assert!(plugin.has_error());
    plugin.cleanup();
    assert!(!plugin.has_error());

    plugin.configure(&DialogHandle(1));
    plugin.clear_error();
    assert_eq!(plugin.error(), "");
}

// ==================== Lifecycle hooks ====================

#[test]
fn test_init_cleanup_help_run_in_plugin_context() {
    let source = r#"
calls = {}
local M = {}
function M.set_info() return { name = "Tracker" } end
function M.init() table.insert(calls, "init") end
function M.help() table.insert(calls, "help") end
function M.cleanup() table.insert(calls, "cleanup") end
return M
"#;
    let dir = plugin_dir(&[("tracker", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "tracker");

    plugin.init(&host_data());
    plugin.help();
    plugin.cleanup();
    assert!(!plugin.has_error());
    assert!(main.is_main_active());

    let guard = plugin.enter();
    let calls: Vec<String> = guard.lua().load("return calls").eval().unwrap();
    assert_eq!(calls, vec!["init", "help", "cleanup"]);
}

#[test]
fn test_init_failure_leaves_plugin_usable() {
    let source = r#"
return {
    set_info = function() return { name = "Broken" } end,
    init = function() error("init exploded") end,
    help = function() end,
}
"#;
    let dir = plugin_dir(&[("broken", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "broken");

    plugin.init(&host_data());
    assert!(plugin.has_error());
    assert!(plugin.error().contains("init exploded"));
    assert!(main.is_main_active());

    plugin.help();
    assert!(!plugin.has_error());
}

#[test]
fn test_optional_hooks_absent_are_noops() {
    let dir = plugin_dir(&[("minimal", MINIMAL)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "minimal");

    plugin.cleanup();
    assert!(!plugin.has_error());
    plugin.help();
    assert!(!plugin.has_error());
}

#[test]
fn test_optional_hook_failure_is_reported() {
    let source = r#"
return {
    set_info = function() return { name = "Messy" } end,
    init = function() end,
    cleanup = function() error("cleanup failed") end,
}
"#;
    let dir = plugin_dir(&[("messy", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "messy");

    plugin.cleanup();
    assert!(plugin.error().contains("Failed calling plugin's 'cleanup' function"));
}

#[test]
fn test_callability_rechecked_at_call_time() {
    let source = r#"
local M = {}
M.help = setmetatable({}, { __call = function() end })
function M.set_info() return { name = "Shifty" } end
function M.init() setmetatable(M.help, nil) end
return M
"#;
    let dir = plugin_dir(&[("shifty", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "shifty");
    assert!(plugin.has_hook(HookName::Help));

    plugin.help();
    assert!(!plugin.has_error());

    plugin.init(&host_data());
    plugin.help();
    assert_eq!(plugin.error(), "Plugin's 'help' function is not callable");
}

#[test]
fn test_configure_is_not_implemented() {
    let with_hook = r#"
return {
    set_info = function() return { name = "Cfg" } end,
    init = function() end,
    configure = function() return 1 end,
}
"#;
    let dir = plugin_dir(&[("minimal", MINIMAL), ("cfg", with_hook)]);
    let main = MainContext::new().unwrap();

    for module in ["minimal", "cfg"] {
        let mut plugin = create(&main, dir.path(), module);
        assert!(plugin.configure(&DialogHandle(7)).is_none());
        assert_eq!(plugin.error(), "configure is not implemented");
    }
}

// ==================== Construction and teardown ====================

#[test]
fn test_import_failure_retains_nothing() {
    let dir = plugin_dir(&[]);
    let main = MainContext::new().unwrap();

    let err = PluginState::create(&main, "missing", Some(dir.path()), &BridgeConfig::default())
        .unwrap_err();
    assert!(matches!(err, BridgeError::Import { ref module, .. } if module == "missing"));
    assert_eq!(main.live_sub_contexts(), 0);
    assert!(main.is_main_active());
}

#[test]
fn test_syntax_error_is_import_failure() {
    let dir = plugin_dir(&[("bad", "return {")]);
    let main = MainContext::new().unwrap();

    let err = PluginState::create(&main, "bad", Some(dir.path()), &BridgeConfig::default())
        .unwrap_err();
    assert!(matches!(err, BridgeError::Import { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_missing_required_hook_unwinds() {
    let no_init = r#"return { set_info = function() return { name = "x" } end, help = function() end }"#;
    let bad_init = r#"return { set_info = function() return { name = "x" } end, init = 42 }"#;
    let dir = plugin_dir(&[("noinit", no_init), ("badinit", bad_init)]);
    let main = MainContext::new().unwrap();
    let config = BridgeConfig::default();

    let err = PluginState::create(&main, "noinit", Some(dir.path()), &config).unwrap_err();
    assert_eq!(err, BridgeError::HookNotFound { hook: "init" });

    let err = PluginState::create(&main, "badinit", Some(dir.path()), &config).unwrap_err();
    assert_eq!(err, BridgeError::HookNotCallable { hook: "init" });

    assert_eq!(main.live_sub_contexts(), 0);
    assert!(main.is_main_active());
}

#[test]
fn test_uncallable_optional_hook_is_ignored() {
    let source = r#"
return {
    set_info = function() return { name = "Odd" } end,
    init = function() end,
    version_check = 300,
}
"#;
    let dir = plugin_dir(&[("odd", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "odd");

    assert!(!plugin.has_hook(HookName::VersionCheck));
    assert_eq!(plugin.version_check(HOST_ABI_VERSION), MIN_API_VERSION);
}

#[test]
fn test_destroy_releases_sub_context() {
    let dir = plugin_dir(&[("minimal", MINIMAL)]);
    let main = MainContext::new().unwrap();

    let plugin = create(&main, dir.path(), "minimal");
    assert_eq!(main.live_sub_contexts(), 1);
    plugin.destroy();

    assert_eq!(main.live_sub_contexts(), 0);
    assert!(main.is_main_active());
}

#[test]
fn test_swaps_are_balanced() {
    let dir = plugin_dir(&[("minimal", MINIMAL)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "minimal");

    let before = main.swap_count();
    plugin.version_check(HOST_ABI_VERSION);
    plugin.help();
    assert_eq!(main.swap_count() - before, 4);
    assert!(main.is_main_active());
}

#[test]
fn test_plugins_are_isolated() {
    let a = r#"
counter = 0
return {
    set_info = function() return { name = "A" } end,
    init = function() counter = counter + 1 end,
}
"#;
    let b = r#"
return {
    set_info = function() return { name = "B" } end,
    init = function() assert(counter == nil, "saw A's global") end,
}
"#;
    let dir = plugin_dir(&[("a", a), ("b", b)]);
    let main = MainContext::new().unwrap();
    let mut first = create(&main, dir.path(), "a");
    let mut second = create(&main, dir.path(), "b");
    assert_ne!(first.context_id(), second.context_id());

    first.init(&host_data());
    second.init(&host_data());
    assert!(!first.has_error());
    assert!(!second.has_error(), "{}", second.error());

    second.destroy();
    first.help();
    assert!(!first.has_error());
}

#[test]
fn test_configured_search_path() {
    let dir = plugin_dir(&[("minimal", MINIMAL)]);
    let main = MainContext::new().unwrap();
    let config = BridgeConfig::default().with_search_path(dir.path());

    let mut plugin = PluginState::create(&main, "minimal", None, &config).unwrap();
    assert_eq!(plugin.set_info().map(|i| i.name.to_string()), Some("Demo".into()));
}

#[test]
fn test_sandbox_and_host_api() {
    let source = r#"
return {
    set_info = function() return { name = "Sandboxed", version = tostring(host.api_version) } end,
    init = function()
        host.log_info("init from " .. host.plugin)
        assert(dofile == nil and loadfile == nil and load == nil)
    end,
}
"#;
    let dir = plugin_dir(&[("sandboxed", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin = create(&main, dir.path(), "sandboxed");

    assert_eq!(plugin.set_info().map(|i| i.version.to_string()), Some("211".into()));
    plugin.init(&host_data());
    assert!(!plugin.has_error(), "{}", plugin.error());
}

// ==================== Host adapter ====================

#[test]
fn test_script_plugin_reads_metadata_once() {
    let source = r#"
info_calls = 0
return {
    set_info = function()
        info_calls = info_calls + 1
        return { name = "Once", author = "Jo" }
    end,
    init = function() end,
}
"#;
    let dir = plugin_dir(&[("once", source)]);
    let main = MainContext::new().unwrap();
    let mut plugin =
        ScriptPlugin::create(&main, "once", Some(dir.path()), &BridgeConfig::default()).unwrap();

    assert_eq!(plugin.set_info().map(|i| i.author.to_string()), Some("Jo".into()));
    assert_eq!(plugin.set_info().map(|i| i.name.to_string()), Some("Once".into()));

    let guard = plugin.state().enter();
    let calls: i64 = guard.lua().load("return info_calls").eval().unwrap();
    assert_eq!(calls, 1);
}

#[test]
fn test_script_plugin_host_interface() {
    let dir = plugin_dir(&[("v", &with_version_check("return 230"))]);
    let main = MainContext::new().unwrap();
    let mut plugin =
        ScriptPlugin::create(&main, "v", Some(dir.path()), &BridgeConfig::default()).unwrap();

    let host: &mut dyn HostPlugin = &mut plugin;
    assert_eq!(host.version_check(HOST_ABI_VERSION), 230);
    host.init(&host_data());
    assert!(!host.has_error());
    assert!(host.configure(&DialogHandle(0)).is_none());
    assert!(host.has_error());
    host.clear_error();
    assert!(!host.has_error());
    host.cleanup();
    host.help();
    assert!(!host.has_error());

    plugin.destroy();
    assert_eq!(main.live_sub_contexts(), 0);
}

#[test]
fn test_script_plugin_version_failure_keeps_error() {
    let dir = plugin_dir(&[
        ("minimal", MINIMAL),
        ("bad", &with_version_check("return 'soon'")),
    ]);
    let main = MainContext::new().unwrap();
    let config = BridgeConfig::default();

    let mut plugin = ScriptPlugin::create(&main, "minimal", Some(dir.path()), &config).unwrap();
    assert_eq!(plugin.version_check(HOST_ABI_VERSION - 1), -1);
    assert!(plugin.error().contains("Mismatched host ABI versions"));

    let mut plugin = ScriptPlugin::create(&main, "bad", Some(dir.path()), &config).unwrap();
    assert_eq!(HostPlugin::version_check(&mut plugin, HOST_ABI_VERSION), -1);
    assert!(HostPlugin::has_error(&plugin));
    assert!(HostPlugin::error(&plugin).contains("not a number"));
}

#[test]
fn test_destroy_order_independent_of_load_order() {
    let dir = plugin_dir(&[("minimal", MINIMAL)]);
    let main = MainContext::new().unwrap();

    let first = create(&main, dir.path(), "minimal");
    let second = create(&main, dir.path(), "minimal");
    let guard = second.enter();
    first.destroy();
    assert_eq!(main.active(), second.context_id());
    guard.leave();

    second.destroy();
    assert!(main.is_main_active());
    assert_eq!(main.live_sub_contexts(), 0);
}
