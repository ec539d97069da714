//! Ferret - Local Question-Answering Agent
//!
//! A single-agent assistant that answers questions with a local Ollama model,
//! calling tools (search, file ingestion, transcription, vision, Python) in a
//! bounded loop until the model produces a final answer.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: LLM provider abstraction with Ollama implementation
//! - **Tools**: The closed tool set and its registry
//! - **Agent**: Conversation state, assistant/tool nodes and the control loop
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use ferret::{Agent, Config};
//!
//! #[tokio::main]
//! async fn main() -> ferret::Result<()> {
//!     let agent = Agent::with_config(Config::load()?)?;
//!     agent.initialize().await?;
//!
//!     let run = agent.answer("What is the capital of Australia?").await?;
//!     println!("{}", run.answer);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{Agent, AgentRun, Question};
pub use cli::Repl;
pub use core::{Config, FerretError, Result};
