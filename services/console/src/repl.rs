//! Line-oriented text session.

use anyhow::Result;
use parley_core::{
    Command, conversation::Conversation, driver::ConversationDriver, usage::UsageSummary,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

const EXIT_WORDS: [&str; 2] = ["/quit", "/exit"];

/// Runs one conversation over `input`/`output` until the demo completes,
/// the user types `/quit`, or input ends. The session is always shut down.
pub async fn run_session<R, W>(
    driver: &mut ConversationDriver,
    conversation: &mut dyn Conversation,
    input: R,
    output: &mut W,
) -> Result<UsageSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let opening = driver.start(conversation).await?;
    say(output, opening.text()).await?;

    let mut completed = matches!(opening, Command::SessionComplete(_));
    let mut lines = input.lines();
    while !completed {
        output.write_all(b"> ").await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&line) {
            info!("User left the session");
            break;
        }
        match driver.turn(conversation, line).await {
            Ok(command) => {
                say(output, command.text()).await?;
                completed = matches!(command, Command::SessionComplete(_));
            }
            Err(e) => {
                error!(error = ?e, "Turn failed");
                say(output, "Sorry, something went wrong handling that message.").await?;
            }
        }
    }

    driver.finish(conversation).await
}

async fn say<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(format!("{}\n", text).as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_demos::coffee::CoffeeBot;

    async fn run(bot: &mut CoffeeBot, script: &str) -> (UsageSummary, String) {
        let mut driver = ConversationDriver::new(None);
        let mut output = Vec::new();
        let usage = run_session(&mut driver, bot, script.as_bytes(), &mut output)
            .await
            .unwrap();
        (usage, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn test_session_until_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut bot = CoffeeBot::new(dir.path());
        let (usage, transcript) = run(&mut bot, "latte\n\n/quit\nlarge\n").await;
        assert_eq!(usage.turns, 1);
        assert_eq!(usage.llm_calls, 0);
        assert!(transcript.lines().count() >= 2);
        assert!(!dir.path().join("coffee_orders.json").exists());
    }

    #[tokio::test]
    async fn test_session_ends_when_input_runs_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut bot = CoffeeBot::new(dir.path());
        let (usage, _) = run(&mut bot, "latte\nlarge").await;
        assert_eq!(usage.turns, 2);
    }

    #[tokio::test]
    async fn test_session_stops_when_order_is_placed() {
        let dir = tempfile::tempdir().unwrap();
        let mut bot = CoffeeBot::new(dir.path());
        let script = "Oat Latte\nLarge\noat\nvanilla\nPriya\nlooks good\nmocha\n";
        let (usage, transcript) = run(&mut bot, script).await;
        assert_eq!(usage.turns, 6);
        assert!(transcript.contains("for Priya"));
        assert!(dir.path().join("coffee_orders.json").exists());
    }
}
