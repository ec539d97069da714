//! Interactive REPL for Ferret
//!
//! Each line is an independent question; nothing carries over between them.

use std::io::{self, BufRead, Write};

use crate::agent::{Agent, Question};
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, Result};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    agent: Agent,
}

impl Repl {
    /// Create a REPL with custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            agent: Agent::with_config(config)?,
        })
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        print!("Initializing...");
        io::stdout().flush()?;

        match self.agent.initialize().await {
            Ok(()) => println!(" Ready!\n"),
            Err(e) => {
                println!("\n\nInitialization error: {}\n", e);
                return Ok(());
            }
        }

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, &mut self.agent).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::Continue(question)) => self.ask(question).await,
                Err(e) => {
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        Ok(())
    }

    async fn ask(&self, question: Question) {
        match self.agent.answer(question).await {
            Ok(run) => {
                println!(
                    "\nAnswer ({} turn{}):\n{}\n",
                    run.state.turns(),
                    if run.state.turns() == 1 { "" } else { "s" },
                    run.answer
                );
            }
            Err(e) => {
                eprintln!("\nError: {}\n", e);
            }
        }
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = self.agent.config();

        println!(
            r#"
  ┌───────────────────────────────────────────┐
  │  ferret - local question answering agent  │
  └───────────────────────────────────────────┘
"#
        );
        println!("Ollama:  {}", config.ollama_url());
        println!("Models:");
        println!("  Assistant: {}", config.models.assistant);
        println!("  Vision:    {}", config.models.vision);
        println!("Tools:   {}", self.agent.tools().names().join(", "));
        println!();
        println!("Commands: help, tools, models, status, file, exit");
        println!("─────────────────────────────────────────────");
    }
}
