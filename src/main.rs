//! Ferret - Local Question-Answering Agent
//!
//! Main entry point for the CLI application.

use clap::Parser;
use ferret::{Agent, Config, Question, Repl};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ferret - answer questions with a local model and tools
#[derive(Parser, Debug)]
#[command(name = "ferret")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Answer a single question and exit
    #[arg(long, short = 'q')]
    question: Option<String>,

    /// URL of a file attached to the question
    #[arg(long, short = 'f', requires = "question")]
    file: Option<String>,

    /// Assistant model
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Vision model used by analyze_image
    #[arg(long)]
    vision_model: Option<String>,

    /// Maximum assistant turns per question
    #[arg(long)]
    max_turns: Option<usize>,

    /// Do not offer tools to the model
    #[arg(long)]
    no_tools: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Write the default configuration file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ferret={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if args.print_config {
        println!("{}", Config::default_config_toml());
        return Ok(());
    }

    if args.init_config {
        let path = Config::default().save()?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    // Build configuration
    let mut config = Config::load()?;

    // Apply CLI overrides
    if let Some(model) = args.model {
        config.models.assistant = model;
    }

    if let Some(vision) = args.vision_model {
        config.models.vision = vision;
    }

    if let Some(max_turns) = args.max_turns {
        config.agent.max_turns = max_turns;
    }

    if args.no_tools {
        config.agent.tools_enabled = false;
    }

    // Single question mode
    if let Some(text) = args.question {
        let agent = Agent::with_config(config)?;
        agent.initialize().await?;

        let mut question = Question::new(text);
        if let Some(url) = args.file {
            question = question.with_file(url);
        }

        let run = agent.answer(question).await?;
        println!("{}", run.answer);
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config)?;
    repl.run().await?;

    Ok(())
}
