//! The context file the agent reads from its workspace.

use std::path::PathBuf;

use pipeline::{EventContext, ForgebotError};
use tracing::info;

/// File name of the context document at the workspace root.
pub const CONTEXT_FILE_NAME: &str = ".claude-context.json";

/// Serialises `context` as pretty JSON to `<workspace>/.claude-context.json`.
///
/// Returns the absolute path of the written file.
pub async fn write_context(context: &EventContext) -> Result<PathBuf, ForgebotError> {
    let path = context.workspace().join(CONTEXT_FILE_NAME);

    let data = serde_json::to_vec_pretty(context)
        .map_err(|e| ForgebotError::workspace(format!("failed to serialise context: {e}")))?;

    tokio::fs::write(&path, data).await.map_err(|e| {
        ForgebotError::workspace(format!(
            "failed to write context file {}: {e}",
            path.display()
        ))
    })?;

    info!(path = %path.display(), "Created context file");
    Ok(path)
}
