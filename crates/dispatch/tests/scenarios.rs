//! End-to-end dispatch scenarios against recording port implementations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dispatch::{
    BackgroundDispatcher, DispatchOrchestrator, DispatchOutcome, TempWorkspaceManager,
    CONTEXT_FILE_NAME,
};
use pipeline::{
    AgentInvocation, AgentInvoker, AgentReport, CloneUrl, DispatchId, EventSink, EventType,
    ForgeEvent, ForgeSource, ForgebotError, RepositoryProvisioner, WorkspaceManager,
    REPOSITORY_DIR_NAME,
};
use serde_json::{json, Value};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Real temp-dir workspaces with acquire/release counters.
struct CountingWorkspaces {
    inner: TempWorkspaceManager,
    acquired: AtomicUsize,
    released: AtomicUsize,
    fail_acquire: bool,
}

impl CountingWorkspaces {
    fn new(root: &Path) -> Self {
        Self {
            inner: TempWorkspaceManager::new(root),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            fail_acquire: false,
        }
    }

    fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl WorkspaceManager for CountingWorkspaces {
    fn acquire(&self, dispatch: DispatchId) -> Result<PathBuf, ForgebotError> {
        if self.fail_acquire {
            return Err(ForgebotError::workspace("disk full"));
        }
        let path = self.inner.acquire(dispatch)?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(path)
    }

    fn release(&self, workspace: &Path) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release(workspace);
    }
}

#[derive(Default)]
struct RecordingProvisioner {
    clones: Mutex<Vec<(String, PathBuf)>>,
    fail_with: Option<ForgebotError>,
}

#[async_trait]
impl RepositoryProvisioner for RecordingProvisioner {
    async fn clone_repository(
        &self,
        url: &CloneUrl,
        destination: &Path,
    ) -> Result<(), ForgebotError> {
        self.clones
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        std::fs::create_dir_all(destination.join(".git")).unwrap();
        Ok(())
    }
}

#[derive(Clone, Copy, Default)]
enum AgentBehaviour {
    #[default]
    Succeed,
    Fail,
    Panic,
}

/// What the agent saw when it was invoked.
#[derive(Debug, Clone)]
struct SeenInvocation {
    invocation: AgentInvocation,
    context: Value,
    repository_present: bool,
}

#[derive(Default)]
struct RecordingAgent {
    behaviour: AgentBehaviour,
    seen: Mutex<Vec<SeenInvocation>>,
}

#[async_trait]
impl AgentInvoker for RecordingAgent {
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<AgentReport, ForgebotError> {
        let context_path = invocation.working_directory.join(&invocation.context_file);
        let context: Value =
            serde_json::from_str(&std::fs::read_to_string(&context_path).unwrap()).unwrap();
        self.seen.lock().unwrap().push(SeenInvocation {
            invocation: invocation.clone(),
            context,
            repository_present: invocation.workspace.join(REPOSITORY_DIR_NAME).is_dir(),
        });

        match self.behaviour {
            AgentBehaviour::Succeed => Ok(AgentReport {
                output: "done".to_string(),
                duration: Duration::from_millis(1),
            }),
            AgentBehaviour::Fail => Err(ForgebotError::Agent {
                message: "agent exited with status 1".to_string(),
                exit_code: Some(1),
            }),
            AgentBehaviour::Panic => panic!("agent crashed"),
        }
    }
}

struct Harness {
    root: TempDir,
    workspaces: Arc<CountingWorkspaces>,
    provisioner: Arc<RecordingProvisioner>,
    agent: Arc<RecordingAgent>,
    orchestrator: DispatchOrchestrator,
}

impl Harness {
    fn new() -> Self {
        Self::with(RecordingProvisioner::default(), RecordingAgent::default())
    }

    fn with(provisioner: RecordingProvisioner, agent: RecordingAgent) -> Self {
        let root = tempfile::tempdir().unwrap();
        let workspaces = Arc::new(CountingWorkspaces::new(root.path()));
        Self::assemble(root, workspaces, Arc::new(provisioner), Arc::new(agent))
    }

    fn assemble(
        root: TempDir,
        workspaces: Arc<CountingWorkspaces>,
        provisioner: Arc<RecordingProvisioner>,
        agent: Arc<RecordingAgent>,
    ) -> Self {
        let orchestrator = DispatchOrchestrator::new(
            workspaces.clone(),
            provisioner.clone(),
            agent.clone(),
        );
        Self {
            root,
            workspaces,
            provisioner,
            agent,
            orchestrator,
        }
    }

    fn clones(&self) -> Vec<(String, PathBuf)> {
        self.provisioner.clones.lock().unwrap().clone()
    }

    fn seen(&self) -> Vec<SeenInvocation> {
        self.agent.seen.lock().unwrap().clone()
    }

    fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(self.root.path()).unwrap().count()
    }
}

fn event(source: ForgeSource, event_type: &str, payload: Value) -> ForgeEvent {
    ForgeEvent::new(
        source,
        EventType::new(event_type).unwrap(),
        payload.as_object().cloned().unwrap(),
    )
}

fn issue_opened() -> ForgeEvent {
    event(
        ForgeSource::GitHub,
        "issues",
        json!({
            "action": "opened",
            "issue": { "number": 42, "title": "Crash on start" },
            "repository": { "clone_url": "https://github.com/o/r.git" },
            "webhook_source": "github",
        }),
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn issue_event_clones_repository_and_runs_agent_inside_it() {
    let harness = Harness::new();

    let outcome = harness.orchestrator.handle(issue_opened()).await.unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Completed {
            repository_cloned: true,
            ..
        }
    ));

    let clones = harness.clones();
    assert_eq!(clones.len(), 1);
    assert_eq!(clones[0].0, "https://github.com/o/r.git");
    assert_eq!(clones[0].1.file_name().unwrap(), REPOSITORY_DIR_NAME);

    let seen = harness.seen();
    assert_eq!(seen.len(), 1);
    let call = &seen[0];
    assert!(call.repository_present);
    assert_eq!(
        call.invocation.working_directory,
        call.invocation.workspace.join(REPOSITORY_DIR_NAME)
    );
    assert_eq!(
        call.invocation.context_file,
        Path::new("..").join(CONTEXT_FILE_NAME)
    );
    assert_eq!(call.invocation.workspace, clones[0].1.parent().unwrap());

    assert_eq!(call.context["event_type"], "issues");
    assert_eq!(call.context["source"], "github");
    assert_eq!(call.context["payload"]["issue"]["number"], 42);
    assert_eq!(
        call.context["workspace"],
        call.invocation.workspace.display().to_string()
    );
    assert_eq!(call.context["capabilities"]["can_push_changes"], true);
    assert!(call.context["timestamp"].is_string());

    assert!(!call.invocation.workspace.exists());
    assert_eq!(harness.workspaces.acquired(), 1);
    assert_eq!(harness.workspaces.released(), 1);
}

#[tokio::test]
async fn push_event_skips_clone_and_runs_agent_in_workspace_root() {
    let harness = Harness::new();
    let push = event(
        ForgeSource::GitHub,
        "push",
        json!({
            "ref": "refs/heads/main",
            "repository": { "clone_url": "https://github.com/o/r.git" },
        }),
    );

    let outcome = harness.orchestrator.handle(push).await.unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Completed {
            repository_cloned: false,
            ..
        }
    ));

    assert!(harness.clones().is_empty());
    let seen = harness.seen();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].repository_present);
    assert_eq!(
        seen[0].invocation.working_directory,
        seen[0].invocation.workspace
    );
    assert_eq!(
        seen[0].invocation.context_file,
        PathBuf::from(CONTEXT_FILE_NAME)
    );
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn bot_comment_is_filtered_before_any_workspace_exists() {
    let harness = Harness::new();
    let comment = event(
        ForgeSource::GitHub,
        "issue_comment",
        json!({
            "comment": { "body": "Done.", "user": { "login": "my-bot[bot]" } },
            "repository": { "clone_url": "https://github.com/o/r.git" },
        }),
    );

    let outcome = harness.orchestrator.handle(comment).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::FilteredOut);
    assert_eq!(harness.workspaces.acquired(), 0);
    assert_eq!(harness.workspaces.released(), 0);
    assert!(harness.clones().is_empty());
    assert!(harness.seen().is_empty());
}

#[tokio::test]
async fn human_comment_on_gitee_note_hook_proceeds() {
    let harness = Harness::new();
    let note = event(
        ForgeSource::Gitee,
        "Note Hook",
        json!({
            "comment": { "body": "please fix", "user": { "login": "alice" } },
            "repository": { "git_http_url": "https://gitee.com/o/r.git" },
        }),
    );

    harness.orchestrator.handle(note).await.unwrap();
    assert_eq!(harness.clones()[0].0, "https://gitee.com/o/r.git");
    assert_eq!(harness.seen()[0].context["source"], "gitee");
}

#[tokio::test]
async fn clone_failure_with_real_git_releases_workspace_and_never_runs_agent() {
    let root = tempfile::tempdir().unwrap();
    let workspaces = Arc::new(CountingWorkspaces::new(root.path()));
    let agent = Arc::new(RecordingAgent::default());
    let orchestrator = DispatchOrchestrator::new(
        workspaces.clone(),
        Arc::new(
            forge::GitCloneProvisioner::new("token").with_timeout(Duration::from_secs(30)),
        ),
        agent.clone(),
    );

    let bad = event(
        ForgeSource::GitHub,
        "issues",
        json!({
            "action": "opened",
            "repository": { "clone_url": "this is not a repository" },
        }),
    );

    let err = orchestrator.handle(bad).await.unwrap_err();
    assert!(matches!(err, ForgebotError::Provisioning { .. }), "{err}");
    assert!(agent.seen.lock().unwrap().is_empty());
    assert_eq!(workspaces.acquired(), 1);
    assert_eq!(workspaces.released(), 1);
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn missing_clone_url_proceeds_without_repository() {
    let harness = Harness::new();
    let issue = event(
        ForgeSource::GitHub,
        "issues",
        json!({ "action": "opened", "repository": { "name": "r" } }),
    );

    let outcome = harness.orchestrator.handle(issue).await.unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Completed {
            repository_cloned: false,
            ..
        }
    ));
    assert!(harness.clones().is_empty());
    assert_eq!(harness.seen().len(), 1);
}

#[tokio::test]
async fn agent_failure_still_releases_workspace() {
    let harness = Harness::with(
        RecordingProvisioner::default(),
        RecordingAgent {
            behaviour: AgentBehaviour::Fail,
            ..Default::default()
        },
    );

    let err = harness.orchestrator.handle(issue_opened()).await.unwrap_err();
    assert!(matches!(
        err,
        ForgebotError::Agent {
            exit_code: Some(1),
            ..
        }
    ));
    assert_eq!(harness.workspaces.released(), 1);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn transient_clone_failure_surfaces_as_provisioning_error() {
    let harness = Harness::with(
        RecordingProvisioner {
            fail_with: Some(ForgebotError::Provisioning {
                message: "Could not resolve host: github.com".to_string(),
                transient: true,
            }),
            ..Default::default()
        },
        RecordingAgent::default(),
    );

    let err = harness.orchestrator.handle(issue_opened()).await.unwrap_err();
    assert!(matches!(
        err,
        ForgebotError::Provisioning {
            transient: true,
            ..
        }
    ));
    assert!(harness.seen().is_empty());
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn agent_panic_inside_spawned_task_still_releases_workspace() {
    let harness = Harness::with(
        RecordingProvisioner::default(),
        RecordingAgent {
            behaviour: AgentBehaviour::Panic,
            ..Default::default()
        },
    );

    let orchestrator = harness.orchestrator.clone();
    let joined = tokio::spawn(async move { orchestrator.handle(issue_opened()).await }).await;

    assert!(joined.unwrap_err().is_panic());
    assert_eq!(harness.workspaces.acquired(), 1);
    assert_eq!(harness.workspaces.released(), 1);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn workspace_failure_stops_before_clone_and_agent() {
    let root = tempfile::tempdir().unwrap();
    let workspaces = Arc::new(CountingWorkspaces {
        fail_acquire: true,
        ..CountingWorkspaces::new(root.path())
    });
    let harness = Harness::assemble(
        root,
        workspaces,
        Arc::new(RecordingProvisioner::default()),
        Arc::new(RecordingAgent::default()),
    );

    let err = harness.orchestrator.handle(issue_opened()).await.unwrap_err();
    assert!(matches!(err, ForgebotError::Workspace { .. }));
    assert!(harness.clones().is_empty());
    assert!(harness.seen().is_empty());
    assert_eq!(harness.workspaces.released(), 0);
}

#[tokio::test]
async fn concurrent_dispatches_get_distinct_workspaces_and_all_are_released() {
    let harness = Harness::new();
    let dispatcher = BackgroundDispatcher::new(harness.orchestrator.clone());

    for _ in 0..8 {
        dispatcher.submit(issue_opened());
    }
    assert!(dispatcher.drain(Duration::from_secs(10)).await);

    let seen = harness.seen();
    assert_eq!(seen.len(), 8);
    let mut workspaces: Vec<_> = seen.iter().map(|s| s.invocation.workspace.clone()).collect();
    workspaces.sort();
    workspaces.dedup();
    assert_eq!(workspaces.len(), 8);

    assert_eq!(harness.workspaces.acquired(), 8);
    assert_eq!(harness.workspaces.released(), 8);
    assert_eq!(harness.leftover_workspaces(), 0);
}
