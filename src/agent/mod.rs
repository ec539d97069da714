//! Agent module - the tool-calling control loop
//!
//! An assistant node and a tool node run over an append-only
//! conversation state until the model answers or the turn limit is hit.

pub mod answer;
pub mod graph;
pub mod nodes;
pub mod orchestrator;
pub mod prompt;
pub mod state;

pub use answer::extract_answer;
pub use graph::{AgentGraph, AgentRun, Step};
pub use nodes::{AssistantNode, Node, ToolNode};
pub use orchestrator::Agent;
pub use state::{AgentState, Question, StateUpdate};
