//! hookbridge - Load Lua plugin modules behind a fixed host plugin interface.
//!
//! Usage:
//!   hookbridge inspect MODULE [-p DIR]   Load a plugin and show its metadata
//!   hookbridge run MODULE [-p DIR]       Drive a plugin through its lifecycle
//!   hookbridge --help                    Show help

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use hookbridge_core::{BridgeConfig, HOST_ABI_VERSION, HostData, HostPlugin};
use hookbridge_plugin::{HookName, MainContext, ScriptPlugin};

#[derive(Parser)]
#[command(
    name = "hookbridge",
    version,
    about = "Load Lua plugin modules behind a fixed host plugin interface",
    long_about = "hookbridge loads a Lua module as a plugin, each in its own \
                  interpreter sub-context, and drives it through the host's \
                  plugin hooks.\n\n\
                  Plugin modules are found on the search path given with `-p` \
                  and the `search_paths` of the configuration file."
)]
struct Cli {
    /// Bridge configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a plugin and show its metadata and hooks
    Inspect {
        /// Plugin module name
        module: String,

        /// Directory containing the plugin module
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Load a plugin, initialize it, and clean it up again
    Run {
        /// Plugin module name
        module: String,

        /// Directory containing the plugin module
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Also call the plugin's help hook
        #[arg(long)]
        help_hook: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .wrap_err_with(|| format!("Failed to load config from {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    match cli.command {
        Command::Inspect {
            module,
            path,
            format,
        } => {
            run_inspect(&config, &module, path.as_deref(), format)?;
        }
        Command::Run {
            module,
            path,
            help_hook,
        } => {
            run_lifecycle(&config, &module, path.as_deref(), help_hook)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn load_plugin<'h>(
    main: &'h MainContext,
    config: &BridgeConfig,
    module: &str,
    path: Option<&Path>,
) -> Result<ScriptPlugin<'h>> {
    tracing::debug!(module, path = ?path, search_paths = ?config.search_paths, "loading plugin");
    let plugin = ScriptPlugin::create(main, module, path, config)
        .wrap_err_with(|| format!("Failed to load plugin '{module}'"))?;
    tracing::info!(module, context = %plugin.state().context_id(), "plugin loaded");
    Ok(plugin)
}

/// Load a plugin and print what the host would see.
fn run_inspect(
    config: &BridgeConfig,
    module: &str,
    path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let main = MainContext::new()?;
    let mut plugin = load_plugin(&main, config, module, path)?;

    let context = plugin.state().context_id().to_string();
    let hooks: Vec<&'static str> = plugin
        .state()
        .hooks()
        .present()
        .map(HookName::as_str)
        .collect();

    let api_version = plugin.version_check(HOST_ABI_VERSION);
    let version_error = plugin.has_error().then(|| plugin.error().to_string());

    let Some(info) = plugin.set_info() else {
        bail!("Failed to read plugin metadata");
    };

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(60));
            println!(" {info}");
            if !info.description.is_empty() {
                println!(" {}", info.description);
            }
            println!("{}", "─".repeat(60));
            println!();
            println!(" Module:      {module} ({context})");
            match &version_error {
                Some(err) => println!(" API version: unavailable ({err})"),
                None => println!(" API version: {api_version}"),
            }
            println!(" Hooks:       {}", hooks.join(", "));
            println!();
        }
        OutputFormat::Json => {
            let report = serde_json::json!({
                "module": module,
                "context": context,
                "api_version": api_version,
                "version_error": version_error,
                "info": info,
                "hooks": hooks,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Drive a plugin through version check, init, optional help, and cleanup.
fn run_lifecycle(
    config: &BridgeConfig,
    module: &str,
    path: Option<&Path>,
    help_hook: bool,
) -> Result<()> {
    let main = MainContext::new()?;
    let mut plugin = load_plugin(&main, config, module, path)?;

    let api_version = plugin.version_check(HOST_ABI_VERSION);
    if api_version < 0 {
        bail!("Plugin '{module}' failed version negotiation: {}", plugin.error());
    }
    eprintln!("Loaded {module} (API version {api_version})");

    let mut failures = Vec::new();

    let host = HostData::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    plugin.init(&host);
    report_step(&plugin, "init", &mut failures);

    if help_hook {
        plugin.help();
        report_step(&plugin, "help", &mut failures);
    }

    plugin.cleanup();
    report_step(&plugin, "cleanup", &mut failures);

    plugin.destroy();
    tracing::debug!(module, live = main.live_sub_contexts(), "plugin destroyed");

    if !failures.is_empty() {
        bail!("Plugin '{module}' failed in: {}", failures.join(", "));
    }
    Ok(())
}

fn report_step(plugin: &ScriptPlugin<'_>, name: &'static str, failures: &mut Vec<&'static str>) {
    if plugin.has_error() {
        eprintln!("  {name}: {}", plugin.error());
        failures.push(name);
    } else {
        eprintln!("  {name}: ok");
    }
}
