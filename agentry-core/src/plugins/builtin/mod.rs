//! Built-in plugin variants

mod calculator;
mod echo;
mod time;

pub use calculator::{CalculatorPlugin, evaluate};
pub use echo::EchoPlugin;
pub use time::TimePlugin;

use std::sync::Arc;

use agentry_plugin_api::Plugin;

use super::loader::PluginFactory;

fn factory<P: Plugin + 'static>(make: fn() -> P) -> PluginFactory {
    Arc::new(move || Ok(Box::new(make()) as Box<dyn Plugin>))
}

/// Implementation references and factories of every built-in variant
pub fn factories() -> Vec<(&'static str, PluginFactory)> {
    vec![
        ("echo", factory(EchoPlugin::new)),
        ("time", factory(TimePlugin::new)),
        ("calculator", factory(CalculatorPlugin::new)),
    ]
}
