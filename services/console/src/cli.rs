//! Command-line argument parsing.

use clap::{Parser, Subcommand};
use parley_demos::DemoKind;

/// Parley console: talk to the demo agents from a terminal.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start an interactive text session with a demo
    Run {
        /// Demo to run, e.g. `coffee` or `game-master`
        #[arg(long, short)]
        demo: DemoKind,
    },
    /// List the available demos
    List,
    /// Print the tool schemas a demo exposes, as JSON
    Tools {
        #[arg(long, short)]
        demo: DemoKind,
    },
    /// Create the fraud case database and seed the sample case
    InitDb,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["parley", "run", "--demo", "game-master"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Run {
                demo: DemoKind::GameMaster
            }
        );
    }

    #[test]
    fn test_parse_init_db_and_tools() {
        let cli = Cli::try_parse_from(["parley", "init-db"]).unwrap();
        assert_eq!(cli.command, Commands::InitDb);

        let cli = Cli::try_parse_from(["parley", "tools", "-d", "tutor"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Tools {
                demo: DemoKind::Tutor
            }
        );
    }

    #[test]
    fn test_unknown_demo_is_rejected() {
        assert!(Cli::try_parse_from(["parley", "run", "--demo", "karaoke"]).is_err());
        assert!(Cli::try_parse_from(["parley", "run"]).is_err());
    }
}
