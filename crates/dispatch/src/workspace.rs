//! Per-dispatch workspace directories and their scoped ownership.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pipeline::{DispatchId, ForgebotError, WorkspaceManager};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Prefix of every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "forgebot-";

/// Creates workspaces as private temporary directories named
/// `<root>/forgebot-<dispatch id>-<random>`.
///
/// Live workspaces are tracked until released; any still live when the
/// manager is dropped are removed then.
#[derive(Debug)]
pub struct TempWorkspaceManager {
    root: PathBuf,
    live: Mutex<HashMap<PathBuf, TempDir>>,
}

impl TempWorkspaceManager {
    /// Creates a manager that allocates workspaces under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a manager that allocates workspaces under the system temp dir.
    pub fn in_system_temp() -> Self {
        Self::new(std::env::temp_dir())
    }

    fn take(&self, workspace: &Path) -> Option<TempDir> {
        // A poisoned map still holds valid entries.
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        live.remove(workspace)
    }
}

impl WorkspaceManager for TempWorkspaceManager {
    fn acquire(&self, dispatch: DispatchId) -> Result<PathBuf, ForgebotError> {
        let prefix = format!("{WORKSPACE_PREFIX}{dispatch}-");

        // Owner-only permissions on unix.
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&self.root)
            .map_err(|e| {
                ForgebotError::workspace(format!(
                    "failed to create workspace under {}: {e}",
                    self.root.display()
                ))
            })?;

        let path = dir.path().to_path_buf();
        self.live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.clone(), dir);

        info!(workspace = %path.display(), "Created workspace");
        Ok(path)
    }

    fn release(&self, workspace: &Path) {
        let Some(dir) = self.take(workspace) else {
            debug!(workspace = %workspace.display(), "Workspace already released");
            return;
        };
        match dir.close() {
            Ok(()) => info!(workspace = %workspace.display(), "Cleaned up workspace"),
            Err(e) => {
                warn!(workspace = %workspace.display(), error = %e, "Failed to clean up workspace");
            }
        }
    }
}

/// Exclusive ownership of one acquired workspace.
///
/// The workspace is released exactly once. [`WorkspaceLease::release`] does it
/// on the blocking pool; otherwise dropping the lease does it in place, which
/// covers `?` early returns, unwinding from a panic and task cancellation.
pub struct WorkspaceLease {
    manager: Arc<dyn WorkspaceManager>,
    path: PathBuf,
    armed: bool,
}

impl WorkspaceLease {
    /// Acquires a workspace for `dispatch` from `manager`.
    pub fn acquire(
        manager: Arc<dyn WorkspaceManager>,
        dispatch: DispatchId,
    ) -> Result<Self, ForgebotError> {
        let path = manager.acquire(dispatch)?;
        Ok(Self {
            manager,
            path,
            armed: true,
        })
    }

    /// Workspace root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the workspace without blocking the async runtime.
    ///
    /// Removing a cloned repository can take a while; it runs on the blocking
    /// pool and this waits for it. The removal still completes if this future
    /// is dropped part way.
    pub async fn release(mut self) {
        self.armed = false;
        let manager = Arc::clone(&self.manager);
        let path = self.path.clone();
        let removal = tokio::task::spawn_blocking(move || manager.release(&path));
        if let Err(e) = removal.await {
            warn!(workspace = %self.path.display(), error = %e, "Workspace release task failed");
        }
    }
}

impl std::fmt::Debug for WorkspaceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceLease")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for WorkspaceLease {
    fn drop(&mut self) {
        if self.armed {
            self.manager.release(&self.path);
        }
    }
}
