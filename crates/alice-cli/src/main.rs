use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use alice::memory::{ApplyOutcome, DialogueSummary};
use alice::persistence::StorageConfig;
use alice::{Alice, AliceBuilder};

#[derive(Parser)]
#[command(name = "alice")]
#[command(about = "Chat with Alice, a companion that remembers")]
#[command(version)]
struct Cli {
    /// Agent spec (YAML)
    #[arg(long, short = 'c')]
    config: PathBuf,

    /// SQLite database for chat history and summaries
    #[arg(long, conflicts_with = "persist")]
    db: Option<PathBuf>,

    /// Keep history in the default database under the user's data directory
    #[arg(long)]
    persist: bool,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

enum Command {
    Quit,
    Help,
    Summaries,
    State,
    History(usize),
    Consolidate,
    Say(String),
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if !line.starts_with('/') {
            return Some(Command::Say(line.to_string()));
        }

        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or_default();
        Some(match cmd {
            "/quit" | "/exit" => Command::Quit,
            "/help" => Command::Help,
            "/summaries" => Command::Summaries,
            "/state" => Command::State,
            "/history" => Command::History(parts.next().and_then(|n| n.parse().ok()).unwrap_or(10)),
            "/consolidate" => Command::Consolidate,
            other => Command::Unknown(other.to_string()),
        })
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_db_path() -> Result<PathBuf> {
    let dir = dirs::data_local_dir()
        .context("no local data directory on this platform")?
        .join("alice");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create {}", dir.display()))?;
    Ok(dir.join("alice.db"))
}

fn storage_override(cli: &Cli) -> Result<Option<StorageConfig>> {
    let path = match (&cli.db, cli.persist) {
        (Some(path), _) => path.clone(),
        (None, true) => default_db_path()?,
        (None, false) => return Ok(None),
    };
    let path = path
        .to_str()
        .context("database path is not valid UTF-8")?
        .to_string();
    Ok(Some(StorageConfig::Sqlite { path }))
}

async fn build_agent(cli: &Cli) -> Result<Alice> {
    let mut builder = AliceBuilder::from_yaml_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?
        .auto_configure_llms()?;

    if let Some(storage) = storage_override(cli)? {
        info!(?storage, "Using storage from command line");
        builder = builder.storage_config(storage);
    }

    let alice = builder.auto_configure_storage().await?.build()?;
    Ok(alice)
}

fn print_summaries(summaries: &[DialogueSummary]) {
    if summaries.is_empty() {
        println!("(no summaries yet)");
        return;
    }
    for summary in summaries {
        let end = summary
            .end_turn_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "…".to_string());
        println!(
            "#{} turns {}-{}: {}",
            summary.summary_id.unwrap_or_default(),
            summary.start_turn_id,
            end,
            summary.summary_text
        );
    }
}

fn print_help() {
    println!("/summaries        show the dialogue memory");
    println!("/state            show the current chat state");
    println!("/history [n]      show the last n messages");
    println!("/consolidate      run a consolidation pass now");
    println!("/quit             leave");
}

async fn run(alice: Alice) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("{} is listening. Type /help for commands.", alice.name());
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = Command::parse(&line) else {
            continue;
        };

        match command {
            Command::Quit => break,
            Command::Help => print_help(),
            Command::Summaries => print_summaries(&alice.summaries().await?),
            Command::State => match alice.chat_state() {
                Some(state) => println!("{}", state.to_prompt()),
                None => println!("(chat state tracking is off)"),
            },
            Command::History(n) => {
                for message in alice.history(n).await? {
                    println!(
                        "[{}] {}: {}",
                        message.turn_id.unwrap_or_default(),
                        message.role,
                        message.content
                    );
                }
            }
            Command::Consolidate => match alice.consolidate_now().await? {
                None => println!("(consolidation already running)"),
                Some(outcome) => {
                    println!("decision: {} ({})", outcome.decision.kind(), outcome.decision.reason());
                    match outcome.applied {
                        Some(ApplyOutcome::Created(id)) => println!("created summary #{}", id),
                        Some(ApplyOutcome::Updated(id)) => println!("updated summary #{}", id),
                        Some(ApplyOutcome::Skipped(why)) => println!("skipped: {}", why),
                        None => {}
                    }
                }
            },
            Command::Say(text) => match alice.chat(&text).await {
                Ok(response) => println!("{}: {}", alice.name(), response.content),
                Err(e) => warn!(error = %e, "Turn failed"),
            },
            Command::Unknown(cmd) => println!("unknown command {}, try /help", cmd),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.config.exists() {
        bail!("config file {} does not exist", cli.config.display());
    }

    let alice = build_agent(&cli).await?;
    run(alice).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert!(Command::parse("   ").is_none());
        assert!(matches!(Command::parse("hello"), Some(Command::Say(s)) if s == "hello"));
        assert!(matches!(Command::parse("/quit"), Some(Command::Quit)));
        assert!(matches!(Command::parse("/state"), Some(Command::State)));
        assert!(matches!(Command::parse("/history 3"), Some(Command::History(3))));
        assert!(matches!(Command::parse("/history"), Some(Command::History(10))));
        assert!(matches!(Command::parse("/nope"), Some(Command::Unknown(c)) if c == "/nope"));
    }

    #[test]
    fn test_cli_args() {
        let cli = Cli::try_parse_from(["alice", "-c", "alice.yaml", "--db", "chat.db", "-v"]).unwrap();
        assert!(cli.verbose);
        let storage = storage_override(&cli).unwrap();
        assert_eq!(
            storage,
            Some(StorageConfig::Sqlite {
                path: "chat.db".into()
            })
        );

        assert!(Cli::try_parse_from(["alice", "-c", "a.yaml", "--db", "x.db", "--persist"]).is_err());
    }
}
