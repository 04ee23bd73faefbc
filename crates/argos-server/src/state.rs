//! Shared service state: the store, configuration, and the registry of
//! in-flight rule executions.
//!
//! There are no globals; one `AppState` is constructed at process start
//! and cloned into handlers (all fields are shared handles).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch, Semaphore};
use tracing::error;

use argos_core::config::ArgosConfig;
use argos_core::ids::ExecutionIdGenerator;
use argos_core::workspace::AnvilWorkspace;
use argos_engine::execution::{
    run_rule_execution, ExecutionEnv, ExecutionRequest, ExecutionStage, ExecutionSummary,
    ProgressEvent,
};
use argos_engine::EngineError;
use argos_storage::ArgosStorageEngine;

const PROGRESS_BUFFER: usize = 256;

/// A live (or finished) rule-driven execution.
pub struct ExecutionHandle {
    pub progress: broadcast::Sender<ProgressEvent>,
    pub cancel: watch::Sender<bool>,
    /// Latest frame, replayed to late WebSocket subscribers.
    pub latest: Arc<Mutex<Option<ProgressEvent>>>,
    /// Final summary once the driver finishes successfully.
    pub summary: Arc<Mutex<Option<ExecutionSummary>>>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ArgosStorageEngine>,
    pub config: Arc<ArgosConfig>,
    pub workspace: Arc<AnvilWorkspace>,
    pub id_gen: Arc<ExecutionIdGenerator>,
    /// Bounded subprocess slots shared by all executions.
    pub pool: Arc<Semaphore>,
    pub executions: Arc<Mutex<HashMap<String, Arc<ExecutionHandle>>>>,
}

impl AppState {
    pub fn new(
        store: Arc<ArgosStorageEngine>,
        config: ArgosConfig,
        workspace: AnvilWorkspace,
    ) -> Self {
        let slots = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            store,
            config: Arc::new(config),
            workspace: Arc::new(workspace),
            id_gen: Arc::new(ExecutionIdGenerator::new()),
            pool: Arc::new(Semaphore::new(slots)),
            executions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn execution_env(&self) -> ExecutionEnv {
        let report_dir = self.workspace.dir().join("reports");
        ExecutionEnv {
            store: Arc::clone(&self.store),
            workdir: self.workspace.project_root().to_path_buf(),
            report_dir,
            runner_command: self.config.test.command.clone(),
            timeout_secs: self.config.test.effective_timeout_secs(),
            pool: Arc::clone(&self.pool),
        }
    }

    /// Spawn a rule-driven execution and register its handle. Returns the
    /// execution id.
    pub fn dispatch_execution(
        &self,
        rule_name: String,
        execution_id: Option<String>,
        changed_files: Vec<String>,
        coverage: bool,
    ) -> String {
        let execution_id = execution_id.unwrap_or_else(|| self.id_gen.next());

        let (progress_tx, progress_rx) = broadcast::channel(PROGRESS_BUFFER);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = Arc::new(ExecutionHandle {
            progress: progress_tx.clone(),
            cancel: cancel_tx,
            latest: Arc::new(Mutex::new(None)),
            summary: Arc::new(Mutex::new(None)),
        });

        self.executions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(execution_id.clone(), Arc::clone(&handle));

        // Monitor: remember the latest frame for late subscribers.
        let latest = Arc::clone(&handle.latest);
        let mut rx = progress_rx;
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let terminal = event.stage.is_terminal();
                        *latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(event);
                        if terminal {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Driver.
        let env = self.execution_env();
        let request = ExecutionRequest {
            rule_name,
            execution_id: execution_id.clone(),
            changed_files,
            coverage,
        };
        let summary_slot = Arc::clone(&handle.summary);
        let ensure_dir = env.report_dir.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::fs::create_dir_all(&ensure_dir).await {
                error!("cannot create report dir: {e}");
            }
            match run_rule_execution(env, request, progress_tx, cancel_rx).await {
                Ok(summary) => {
                    *summary_slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(summary);
                }
                Err(EngineError::Runner(argos_core::errors::RunnerError::Cancelled)) => {}
                Err(e) => error!("execution failed: {e}"),
            }
        });

        execution_id
    }

    /// Look up a registered execution.
    pub fn execution(&self, execution_id: &str) -> Option<Arc<ExecutionHandle>> {
        self.executions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(execution_id)
            .cloned()
    }

    /// Request cancellation. Returns false for unknown executions.
    pub fn cancel_execution(&self, execution_id: &str) -> bool {
        match self.execution(execution_id) {
            Some(handle) => handle.cancel.send(true).is_ok(),
            None => false,
        }
    }

    /// Stage of a registered execution, if any frame was seen yet.
    pub fn execution_stage(&self, execution_id: &str) -> Option<ExecutionStage> {
        self.execution(execution_id).and_then(|handle| {
            handle
                .latest
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .as_ref()
                .map(|event| event.stage)
        })
    }
}
