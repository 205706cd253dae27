use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize logging/tracing for a binary.
///
/// `RUST_LOG` overrides the default filter. `json` switches to one JSON object
/// per line for log shippers.
pub fn init(service_name: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(service_name)));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_ansi(true))
            .try_init()
    };

    installed.map_err(|e| Error::External(format!("failed to install tracing subscriber: {e}")))
}

/// Default: info for our crates and the HTTP trace layer, warn for everything else.
fn default_filter(service_name: &str) -> String {
    let service = service_name.replace('-', "_");
    format!(
        "warn,gruz=info,gruz_core=info,gruz_postgres=info,gruz_http=info,gruz_telegram=info,tower_http=info,{service}=info"
    )
}
