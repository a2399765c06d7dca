//! Parley console
//!
//! Runs any demo as a text REPL in the terminal, lists demos and their tool
//! schemas, and initializes the fraud case database.

mod cli;
mod repl;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use parley_core::{conversation::TurnMode, driver::ConversationDriver};
use parley_demos::{
    DemoContext, DemoKind, config::Config, init_fraud_db, open_demo, tool_definitions,
};
use tokio::io::BufReader;
use tracing::{Instrument, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let ctx = DemoContext::from(&config);
    match cli.command {
        Commands::Run { demo } => run(demo, &config, &ctx).await,
        Commands::List => {
            for kind in DemoKind::all() {
                println!(
                    "{:<12} {:<13} {}",
                    kind.as_str(),
                    kind.mode().as_str(),
                    kind.description()
                );
            }
            Ok(())
        }
        Commands::Tools { demo } => {
            println!("{}", serde_json::to_string_pretty(&tool_definitions(demo))?);
            Ok(())
        }
        Commands::InitDb => {
            let seeded = init_fraud_db(&ctx).await?;
            info!(path = %ctx.fraud_db_path.display(), seeded, "Fraud database ready");
            Ok(())
        }
    }
}

async fn run(demo: DemoKind, config: &Config, ctx: &DemoContext) -> anyhow::Result<()> {
    let llm = match config.llm_client() {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "No language model configured");
            None
        }
    };
    if llm.is_none() && demo.mode() == TurnMode::ToolCalling {
        anyhow::bail!("The '{}' demo needs a language model; set the provider API key", demo);
    }

    let mut conversation = open_demo(demo, ctx).await?;
    let mut driver = ConversationDriver::new(llm);
    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let usage = repl::run_session(&mut driver, conversation.as_mut(), input, &mut output)
        .instrument(tracing::info_span!("console_session", demo = %demo))
        .await?;
    println!("Session ended ({}).", usage);
    Ok(())
}
