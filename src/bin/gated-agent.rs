//! Gated Agent CLI
//!
//! Drives confirmation-gated agent runs from the terminal. The terminal
//! user is both the asker and the approver: every tool call the model
//! proposes is printed and waits for a y/N answer before it executes.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gated_agent::{
    event_channel, sql_toolset, Config, ConfirmationGate, ProviderClient, ProviderConfig,
    RunEvent, Runner, SqlSession,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gated-agent")]
#[command(about = "LLM agent with human-in-the-loop tool approval", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (YAML)
    #[arg(short, long, default_value = "gated-agent.yaml")]
    config: PathBuf,

    /// LLM model to use - overrides config
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL for a custom OpenAI-compatible endpoint - overrides config
    #[arg(long)]
    base_url: Option<String>,

    /// Environment variable holding the API key
    #[arg(long, default_value = "OPENAI_API_KEY")]
    api_key_env: String,

    /// SQLite database file (default: in-memory demo data)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Ceiling on LLM invocations per run - overrides config
    #[arg(long)]
    max_loops: Option<usize>,

    /// Seconds before an unanswered confirmation counts as denied
    #[arg(long)]
    confirm_timeout_secs: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive REPL session
    Repl,

    /// Run a single prompt
    Prompt {
        /// The request to send to the agent
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if let Some(base_url) = &cli.base_url {
        config.provider =
            ProviderConfig::custom("Custom", base_url.as_str(), cli.api_key_env.as_str(), "gpt-4o");
    }
    if let Some(max_loops) = cli.max_loops {
        config.max_loops = max_loops;
    }
    if cli.confirm_timeout_secs.is_some() {
        config.confirm_timeout_secs = cli.confirm_timeout_secs;
    }
    if cli.db.is_some() {
        config.db_path = cli.db.clone();
    }

    let session = match &config.db_path {
        Some(path) => SqlSession::open(path)?,
        None => {
            let session = SqlSession::in_memory()?;
            seed_demo_data(&session)?;
            println!("No database given; using in-memory demo data (users, orders).");
            session
        }
    };

    let mut provider = ProviderClient::new(config.provider.clone())?;
    if let Some(model) = &config.model {
        provider = provider.with_model(model.as_str());
    }

    let gate = match config.confirm_timeout_secs {
        Some(secs) => ConfirmationGate::with_deadline(std::time::Duration::from_secs(secs)),
        None => ConfirmationGate::new(),
    };

    let runner = Arc::new(Runner::new(
        Arc::new(provider),
        sql_toolset(session, config.row_sample_size),
        gate,
        config.run_config(),
    ));

    match cli.command {
        Some(Commands::Prompt { message }) => run_once(&runner, &message).await?,
        Some(Commands::Repl) | None => run_repl(&runner).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "gated_agent=debug" } else { "gated_agent=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn seed_demo_data(session: &SqlSession) -> Result<()> {
    session.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER);
         INSERT INTO users (name, age) VALUES ('alice', 34), ('bob', 28), ('carol', 45);
         CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, total REAL, placed_at TEXT);
         INSERT INTO orders (user_id, total, placed_at) VALUES
             (1, 19.99, '2026-08-01'), (1, 5.00, '2026-08-03'), (2, 42.50, '2026-08-10');",
    )?;
    Ok(())
}

/// Drive one run to completion, answering confirmations from stdin.
async fn run_once(runner: &Arc<Runner>, input: &str) -> Result<()> {
    let (tx, mut events) = event_channel();
    let token = CancellationToken::new();

    // ^C denies whatever is pending and cancels the run
    let ctrl_gate = runner.gate().clone();
    let ctrl_token = token.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_token.cancel();
            for id in ctrl_gate.pending_ids() {
                let _ = ctrl_gate.resolve(&id, false);
            }
        }
    });

    let run_handle = {
        let runner = runner.clone();
        let input = input.to_string();
        let token = token.clone();
        tokio::spawn(async move { runner.run(&input, &tx, token).await })
    };

    let gate = runner.gate().clone();
    while let Some(envelope) = events.recv().await {
        match envelope.event {
            RunEvent::RunStarted { .. } => {}
            RunEvent::ToolCallProposed { tool, arguments, .. } => {
                println!("\n[tool call] {} {}", tool, arguments);
            }
            RunEvent::ConfirmationRequested { call_id, prompt, .. } => {
                let approved = ask_yes_no(&prompt).await?;
                // A ^C or deadline may have resolved it already
                let _ = gate.resolve(&call_id, approved);
            }
            RunEvent::ConfirmationResolved { approved, reason, .. } => {
                if !approved {
                    let reason = reason.as_deref().unwrap_or("denied");
                    println!("[denied: {}]", reason);
                }
            }
            RunEvent::ToolCallFinished {
                tool,
                output,
                is_error,
                duration_ms,
                ..
            } => {
                let status = if is_error { "error" } else { "ok" };
                println!("[{} {} in {}ms]\n{}", tool, status, duration_ms, output);
            }
            RunEvent::TextContent { text } => {
                println!("\n{}", text);
            }
            RunEvent::RunFinished { outcome, result, .. } => {
                println!("\n[{}] {}", outcome.as_str(), result);
            }
            RunEvent::RunError { message, .. } => {
                eprintln!("\nRun failed: {}", message);
            }
        }
    }

    let _report = run_handle.await?;
    ctrl_c.abort();
    Ok(())
}

/// Prompt the terminal user for a decision. Anything but an explicit
/// yes is a denial.
async fn ask_yes_no(prompt: &str) -> Result<bool> {
    let prompt = prompt.to_string();
    let answer = tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
        use std::io::Write;
        print!("\n{} [y/N] ", prompt);
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(matches!(line.trim(), "y" | "Y" | "yes" | "Yes"))
    })
    .await??;
    Ok(answer)
}

async fn run_repl(runner: &Arc<Runner>) -> Result<()> {
    println!("Gated Agent REPL");
    println!("Every proposed tool call waits for your y/N before it runs.");
    println!();
    println!("Commands:");
    println!("  /quit, /exit  - Exit the REPL");
    println!("  /help         - Show this help");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history_path = PathBuf::from(".gated_agent_history");
    let _ = rl.load_history(&history_path);

    loop {
        let readline = rl.readline("gated-agent> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if line.starts_with('/') {
                    match line {
                        "/quit" | "/exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        "/help" => {
                            println!("Commands:");
                            println!("  /quit, /exit  - Exit the REPL");
                            println!("  /help         - Show this help");
                        }
                        _ => println!("Unknown command: {}", line),
                    }
                    continue;
                }

                if let Err(e) = run_once(runner, line).await {
                    eprintln!("Error: {}\n", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}
