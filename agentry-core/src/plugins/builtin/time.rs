//! Time - current time in a timezone, optionally formatted

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use agentry_plugin_api::{
    ConfigSchema, Lifecycle, Payload, Plugin, PluginContext, PluginError, PluginManifest,
    PluginRequest, PluginResult, RequestExt, ValueType, async_trait,
};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: &str = "UTC";

type Clock = fn() -> DateTime<Utc>;

pub struct TimePlugin {
    state: Lifecycle,
    default_tz: OnceLock<Tz>,
    clock: Clock,
}

impl TimePlugin {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// A plugin reading "now" from `clock`
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            state: Lifecycle::new(),
            default_tz: OnceLock::new(),
            clock,
        }
    }

    fn default_timezone(&self) -> Tz {
        self.default_tz.get().copied().unwrap_or(Tz::UTC)
    }
}

impl Default for TimePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimePlugin")
            .field("state", &self.state)
            .field("default_tz", &self.default_tz.get())
            .finish_non_exhaustive()
    }
}

fn parse_timezone(name: &str) -> Result<Tz, PluginError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| PluginError::validation(format!("unknown timezone '{name}'")))
}

fn format_time(now: &DateTime<Tz>, pattern: &str) -> Result<String, PluginError> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(PluginError::validation(format!(
            "invalid format pattern '{pattern}'"
        )));
    }

    let mut formatted = String::new();
    write!(formatted, "{}", now.format_with_items(items.into_iter()))
        .map_err(|_| PluginError::validation(format!("cannot apply format '{pattern}'")))?;
    Ok(formatted)
}

#[async_trait]
impl Plugin for TimePlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("time", "1.0.0", "Reports the current time")
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::empty().option(
            "default_timezone",
            ValueType::String,
            DEFAULT_TIMEZONE,
            "IANA timezone used when the request names none",
        )
    }

    async fn initialize(&self, ctx: Arc<PluginContext>) -> Result<(), PluginError> {
        let configured = ctx.config().get_str("default_timezone", DEFAULT_TIMEZONE);
        let tz = parse_timezone(&configured)
            .map_err(|_| PluginError::config(format!("unknown default timezone '{configured}'")))?;
        // Set before the context so a healthy plugin always has its timezone.
        let _ = self.default_tz.set(tz);

        if !self.state.initialize(ctx.clone()) {
            return Err(PluginError::failed("time is already initialized"));
        }
        ctx.log_debug(&format!("default timezone {tz}"));
        Ok(())
    }

    async fn execute(&self, request: PluginRequest) -> PluginResult {
        let tz = match request.optional_str("timezone")? {
            Some(name) => parse_timezone(name)?,
            None => self.default_timezone(),
        };
        let now = (self.clock)().with_timezone(&tz);

        let mut payload = Payload::new();
        match request.optional_str("format")? {
            Some(pattern) => {
                payload.insert("formatted".to_string(), format_time(&now, pattern)?.into());
            }
            None => {
                payload.insert("iso".to_string(), now.to_rfc3339().into());
                payload.insert("epoch".to_string(), now.timestamp().into());
                payload.insert("timezone".to_string(), tz.name().into());
            }
        }
        Ok(payload)
    }

    fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        self.state.shutdown();
        Ok(())
    }
}
