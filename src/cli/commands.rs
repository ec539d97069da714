//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use crate::agent::{Agent, Question};
use crate::core::Result;

/// Result of parsing a command
#[derive(Debug)]
pub enum CommandResult {
    /// Not a command: answer this question
    Continue(Question),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, agent: &mut Agent) -> Result<CommandResult> {
    let input = input.trim();
    let (cmd, args) = split_word(input);
    let cmd = cmd.to_lowercase();

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "tools" => {
            let tools = agent.tools();
            if tools.is_empty() {
                return Ok(CommandResult::Handled("No tools enabled.".to_string()));
            }
            let output = tools
                .definitions()
                .iter()
                .map(|d| format!("  {:<22} {}", d.function.name, d.function.description))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(CommandResult::Handled(format!("Enabled tools:\n{}", output)))
        }

        "models" => {
            let models = agent.list_models().await?;
            let output = format!(
                "Available models:\n{}\n\nCurrent:\n  Assistant: {}\n  Vision:    {}",
                models
                    .iter()
                    .map(|m| format!("  - {}", m))
                    .collect::<Vec<_>>()
                    .join("\n"),
                agent.config().models.assistant,
                agent.config().models.vision
            );
            Ok(CommandResult::Handled(output))
        }

        "status" => Ok(CommandResult::Handled(status_text(agent))),

        "set" => Ok(handle_set_command(args, agent)),

        "file" => {
            let (url, question) = split_word(args);
            if url.is_empty() || question.is_empty() {
                return Ok(CommandResult::Handled(
                    "Usage: file <url> <question>".to_string(),
                ));
            }
            Ok(CommandResult::Continue(Question::new(question).with_file(url)))
        }

        _ => Ok(CommandResult::Continue(Question::new(input))),
    }
}

/// Split off the first whitespace-separated word
fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (input, ""),
    }
}

/// Handle 'set' subcommands
fn handle_set_command(args: &str, agent: &mut Agent) -> CommandResult {
    let (key, value) = split_word(args);

    if key.is_empty() {
        return CommandResult::Handled(
            "Usage: set <model|max-turns> <value>\n\
             Examples:\n\
               set model qwen3:8b\n\
               set max-turns 6"
                .to_string(),
        );
    }

    match key.to_lowercase().as_str() {
        "model" => {
            if value.is_empty() {
                return CommandResult::Handled(format!(
                    "Current model: {}",
                    agent.config().models.assistant
                ));
            }
            agent.set_model(value);
            CommandResult::Handled(format!("Model set to: {}", value))
        }

        "max-turns" | "max_turns" => match value.parse::<usize>() {
            Ok(n) => match agent.set_max_turns(n) {
                Ok(()) => CommandResult::Handled(format!("Max turns set to: {}", n)),
                Err(e) => CommandResult::Handled(e.to_string()),
            },
            Err(_) => CommandResult::Handled(format!(
                "Current max turns: {}. Usage: set max-turns <n>",
                agent.config().agent.max_turns
            )),
        },

        other => CommandResult::Handled(format!(
            "Unknown setting: {}. Available: model, max-turns",
            other
        )),
    }
}

fn status_text(agent: &Agent) -> String {
    let config = agent.config();
    format!(
        "Ferret Status:\n\
         ─────────────────────────────\n\
         Ollama:       {}\n\
         Model:        {}\n\
         Vision model: {}\n\
         Max turns:    {}\n\
         Tools:        {} ({})\n\
         Parallel:     {}",
        config.ollama_url(),
        config.models.assistant,
        config.models.vision,
        config.agent.max_turns,
        agent.tools().len(),
        if config.agent.tools_enabled {
            "enabled"
        } else {
            "disabled"
        },
        if config.agent.parallel_tools { "on" } else { "off" }
    )
}

/// Generate help text
fn help_text() -> String {
    r#"Ferret Commands:
─────────────────────────────────────────────
  help, ?                  Show this help message
  exit, quit, q            Exit Ferret
  status                   Show current configuration
  tools                    List enabled tools
  models                   List available Ollama models

  set model <model>        Set the assistant model
  set max-turns <n>        Set the turn limit per question
  file <url> <question>    Ask a question about a file

Anything else is answered as a new, independent question.
─────────────────────────────────────────────"#
        .to_string()
}
