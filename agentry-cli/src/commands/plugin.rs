//! Plugin management commands

use std::sync::Arc;
use std::time::Duration;

use agentry_core::plugins::{
    FileConfigProvider, FileEnablementStore, Health, LifecycleState, PluginInfo, PluginLoader,
    PluginRegistry, PluginService, TestReport,
};
use agentry_plugin_api::{PluginRequest, Scope};
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde_json::Value;

use crate::config::AgentryConfig;

/// Plugin management arguments
#[derive(Args)]
pub struct PluginArgs {
    #[command(subcommand)]
    pub command: PluginCommands,
}

/// Plugin subcommands
#[derive(Subcommand)]
pub enum PluginCommands {
    /// List enabled plugins visible from a scope
    List {
        /// `system` or `agent:<id>`
        #[arg(long, default_value = "system")]
        scope: Scope,
    },
    /// List plugins that can be enabled
    Available,
    /// Enable a plugin
    Enable {
        /// Plugin name to enable
        name: String,
        #[arg(long, default_value = "system")]
        scope: Scope,
    },
    /// Disable a plugin
    Disable {
        /// Plugin name to disable
        name: String,
        #[arg(long, default_value = "system")]
        scope: Scope,
    },
    /// Show plugin details
    Info {
        /// Plugin name
        name: String,
        #[arg(long, default_value = "system")]
        scope: Scope,
    },
    /// Execute an enabled plugin with ad-hoc parameters
    Test {
        /// Plugin name
        name: String,
        #[arg(long, default_value = "system")]
        scope: Scope,
        /// Request parameter as key=value; the value is parsed as JSON when possible
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Override the execution timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read or write plugin configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show stored configuration
    Get {
        name: String,
        #[arg(long, default_value = "system")]
        scope: Scope,
    },
    /// Set one configuration value
    Set {
        name: String,
        key: String,
        /// Parsed as JSON when possible, otherwise stored as a string
        value: String,
        #[arg(long, default_value = "system")]
        scope: Scope,
    },
}

fn build_service(config: &AgentryConfig) -> PluginService {
    let provider = Arc::new(FileConfigProvider::new(config.plugins.config_dir.clone()));
    let registry = PluginRegistry::new(
        PluginLoader::with_builtins(),
        provider,
        config.runtime_config(),
    );
    let store = Arc::new(FileEnablementStore::new(config.plugins.enabled_path()));
    PluginService::new(Arc::new(registry), store)
}

/// Run plugin command
pub async fn run(args: PluginArgs, config: &AgentryConfig) -> Result<()> {
    let service = build_service(config);

    let result = match args.command {
        PluginCommands::List { scope } => list_plugins(&service, &scope).await,
        PluginCommands::Available => {
            list_available(&service);
            Ok(())
        }
        PluginCommands::Enable { name, scope } => enable_plugin(&service, &name, scope).await,
        PluginCommands::Disable { name, scope } => disable_plugin(&service, &name, scope).await,
        PluginCommands::Info { name, scope } => show_plugin_info(&service, &name, scope).await,
        PluginCommands::Test {
            name,
            scope,
            params,
            timeout_ms,
            json,
        } => test_plugin(&service, &name, scope, &params, timeout_ms, json).await,
        PluginCommands::Config { command } => match command {
            ConfigCommands::Get { name, scope } => get_config(&service, &name, &scope).await,
            ConfigCommands::Set {
                name,
                key,
                value,
                scope,
            } => set_config(&service, &name, &scope, key, &value).await,
        },
    };

    service.shutdown().await;
    result
}

/// Load whatever is persisted as enabled, warning about failures
async fn restore(service: &PluginService) -> Result<()> {
    let report = service.restore().await?;
    for (key, error) in &report.failed {
        eprintln!("Warning: could not load {}: {}", key, error.message);
    }
    Ok(())
}

fn status_symbol(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::Initialized(Health::Healthy) => "✓",
        LifecycleState::Initialized(_) => "✗",
        _ => "○",
    }
}

async fn list_plugins(service: &PluginService, scope: &Scope) -> Result<()> {
    restore(service).await?;
    let plugins = service.list(scope).await;

    if plugins.is_empty() {
        println!("No plugins enabled for {}", scope);
        println!();
        println!("Run 'agentry plugin available' to see what can be enabled.");
        return Ok(());
    }

    for p in plugins {
        println!(
            "{} {} v{} [{}]    {}",
            status_symbol(p.state),
            p.name,
            p.version,
            p.scope,
            p.description
        );
    }
    Ok(())
}

fn list_available(service: &PluginService) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Version").fg(Color::Cyan),
        Cell::new("Description").fg(Color::Cyan),
        Cell::new("Options").fg(Color::Cyan),
    ]);

    for plugin in service.available() {
        let options = plugin
            .descriptor
            .schema
            .options
            .iter()
            .map(|o| format!("{} = {}", o.name, o.default))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(&plugin.implementation),
            Cell::new(&plugin.descriptor.version),
            Cell::new(&plugin.descriptor.description),
            Cell::new(options),
        ]);
    }

    println!("{table}");
}

async fn enable_plugin(service: &PluginService, name: &str, scope: Scope) -> Result<()> {
    let info = service.enable(name, scope).await?;
    println!("Enabled plugin: {} v{} ({})", info.name, info.version, info.scope);
    Ok(())
}

async fn disable_plugin(service: &PluginService, name: &str, scope: Scope) -> Result<()> {
    service.disable(name, scope.clone()).await?;
    println!("Disabled plugin: {} ({})", name, scope);
    Ok(())
}

fn print_info(info: &PluginInfo) {
    println!("Name:           {}", info.name);
    println!("Version:        {}", info.version);
    println!("Scope:          {}", info.scope);
    println!("Implementation: {}", info.implementation);
    println!("Description:    {}", info.description);
    println!("Status:         {}", info.state);
    println!("Loaded at:      {}", info.loaded_at.to_rfc3339());
}

async fn show_plugin_info(service: &PluginService, name: &str, scope: Scope) -> Result<()> {
    restore(service).await?;
    match service.info(name, scope.clone()).await {
        Ok(info) => print_info(&info),
        Err(_) => {
            println!("Plugin '{}' is not enabled for {}", name, scope);
            println!();
            println!("Run 'agentry plugin enable {} --scope {}' first.", name, scope);
        }
    }
    Ok(())
}

/// Parse `key=value`. The value is JSON if it parses, a string otherwise.
pub fn parse_param(param: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = param.split_once('=') else {
        bail!("parameter '{param}' must look like key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("parameter '{param}' has an empty key");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn build_request(params: &[String]) -> Result<PluginRequest> {
    let mut request = PluginRequest::new();
    for param in params {
        let (key, value) = parse_param(param)?;
        request.insert(key, value);
    }
    Ok(request)
}

fn print_report(report: &TestReport) {
    if report.success {
        println!("✓ Success ({} ms)", report.duration_ms);
        if let Some(result) = &report.result {
            for (key, value) in result {
                println!("  {key}: {value}");
            }
        }
    } else if let Some(error) = &report.error {
        println!("✗ {} error ({} ms)", error.kind, report.duration_ms);
        println!("  {}", error.message);
    }
}

async fn test_plugin(
    service: &PluginService,
    name: &str,
    scope: Scope,
    params: &[String],
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<()> {
    let request = build_request(params)?;
    restore(service).await?;

    let report = service
        .test(name, scope, request, timeout_ms.map(Duration::from_millis))
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn get_config(service: &PluginService, name: &str, scope: &Scope) -> Result<()> {
    let config = service.get_config(name, scope).await?;
    if config.is_empty() {
        println!("No configuration stored for {} ({}); defaults apply", name, scope);
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn set_config(
    service: &PluginService,
    name: &str,
    scope: &Scope,
    key: String,
    value: &str,
) -> Result<()> {
    let (key, value) = parse_param(&format!("{key}={value}"))?;

    let declared = service
        .available()
        .into_iter()
        .find(|p| p.implementation == name)
        .map(|p| p.descriptor.schema.get(&key).is_some());
    if declared == Some(false) {
        eprintln!("Warning: '{}' does not declare option '{}'; it will be ignored", name, key);
    }

    let mut config = service.get_config(name, scope).await?;
    config.insert(key.clone(), value.clone());
    service.put_config(name, scope, config).await?;

    println!("Set {} {} = {} ({})", name, key, value, scope);
    println!("Reload or re-enable the plugin to apply the change.");
    Ok(())
}
