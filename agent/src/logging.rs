use crate::config::AgentConfig;
use anyhow::{anyhow, Result};

/// JSON logs on stdout. Quiet mode keeps only warnings and errors and wins
/// over `RUST_LOG`.
pub fn init_tracing(cfg: &AgentConfig) -> Result<()> {
    let env_filter = if cfg.quiet {
        "warn".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,nut_agent=info".into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .flatten_event(true)
        .try_init()
        .map_err(|e| anyhow!("initializing tracing: {e}"))
}
