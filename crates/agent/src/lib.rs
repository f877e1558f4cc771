//! forgebot agent adapter.
//!
//! Implements [`pipeline::AgentInvoker`] by launching an external autonomous
//! coding agent (by default the Claude Code CLI through `npx`) inside the
//! prepared workspace.
//!
//! The contract with the agent process:
//!
//! - its working directory is the repository clone, or the bare workspace when
//!   no clone was needed;
//! - the instruction document from [`render_instructions`] arrives on stdin and
//!   names the context file relative to that directory;
//! - credentials, the workspace path and `CLAUDE_MODE=autonomous` arrive
//!   through the environment;
//! - a zero exit status is success; anything else, including a timeout, is an
//!   `Agent` error.
//!
//! What the agent then does to the repository is opaque to forgebot.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The [`pipeline`] crate sees only [`pipeline::AgentInvoker`].

mod instructions;
mod invoker;

pub use instructions::render_instructions;
pub use invoker::{AgentCommand, CliAgentInvoker};
