use anyhow::Result;
use clap::{ArgAction, Parser};
use nut_agent::config::load_config_with_precedence;
use nut_agent::connection::{ConnectionManager, TcpConnector};
use nut_agent::logging::init_tracing;
use nut_agent::publish::HttpPublisher;
use nut_agent::runner::{stop_channel, PollLoop};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "nut-agent", version, about = "Forward NUT UPS telemetry to a logging endpoint")]
struct Cli {
    /// TOML file layered under the environment variables
    #[arg(short, long, env = "NUT_AGENT_CONFIG")]
    config: Option<PathBuf>,
    /// Run a single poll cycle and exit
    #[arg(long, action = ArgAction::SetTrue)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config_with_precedence(cli.config.as_ref())?;
    init_tracing(&cfg)?;

    let publisher = HttpPublisher::new(&cfg.publish)?;
    let connection = ConnectionManager::new(TcpConnector::new(&cfg.nut));
    let mut agent = PollLoop::new(connection, publisher, cfg.max_watts.clone(), cfg.poll.interval());

    if cli.once {
        let outcome = agent.run_once().await;
        info!(?outcome, "single cycle finished");
        agent.shutdown().await;
        return Ok(());
    }

    let (handle, stop) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            handle.stop();
        }
    });
    agent.run(stop).await;
    Ok(())
}
