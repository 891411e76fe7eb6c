// SPDX-License-Identifier: MIT

//! Workflow orchestrator
//!
//! A `Workflow` owns a read-only list of top-level nodes and drives them in
//! order for each `run` call. With history enabled it loads the session's
//! past runs before the first node, and records the outcome of the run
//! (completed, failed or cancelled) in its `WorkflowStorage` afterwards.

use super::history::{format_history, HistoryFormatOptions};
use super::metrics::WorkflowMetrics;
use super::node::Node;
use super::options::{RunContext, RunOptions};
use super::run::{CancellationRecord, WorkflowRun};
use super::session::WorkflowSession;
use super::state::ExecutionContext;
use super::storage::{MemoryStorage, WorkflowStorage};
use super::types::{HistoryConfig, WorkflowSettings, DEFAULT_MAX_SESSIONS, DEFAULT_NUM_HISTORY_RUNS};
use crate::adk::cancel::{CancelContext, CancelReason};
use crate::adk::error::{StorageError, WorkflowError};
use crate::adk::message::Message;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Budget for persisting a cancelled run after the caller's context is done
const PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Programmatic workflow configuration
#[derive(Clone, Default)]
pub struct WorkflowConfig {
    /// Defaults to `workflow-<name>`
    pub id: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<Arc<dyn Node>>,
    pub enable_history: bool,
    /// Store used when history is enabled; a `MemoryStorage` of capacity 100
    /// is created when none is given
    pub history_store: Option<Arc<dyn WorkflowStorage>>,
    /// 0 falls back to 3
    pub num_history_runs: usize,
    pub add_history_to_steps: bool,
}

impl WorkflowConfig {
    /// Build a config from YAML settings, creating the memory store they describe
    pub fn from_settings(settings: &WorkflowSettings, steps: Vec<Arc<dyn Node>>) -> Self {
        let history_store = settings.enable_history.then(|| {
            Arc::new(MemoryStorage::new(settings.storage.max_sessions)) as Arc<dyn WorkflowStorage>
        });
        Self {
            id: settings.id.clone(),
            name: settings.name.clone(),
            description: settings.description.clone(),
            steps,
            enable_history: settings.enable_history,
            history_store,
            num_history_runs: settings.num_history_runs,
            add_history_to_steps: settings.add_history_to_steps,
        }
    }
}

pub struct Workflow {
    id: String,
    name: String,
    description: String,
    steps: Vec<Arc<dyn Node>>,
    enable_history: bool,
    history_store: Option<Arc<dyn WorkflowStorage>>,
    num_history_runs: usize,
    add_history_to_steps: bool,
}

impl Workflow {
    pub fn new(config: WorkflowConfig) -> Self {
        let id = if config.id.is_empty() {
            format!("workflow-{}", config.name)
        } else {
            config.id
        };
        let name = if config.name.is_empty() {
            id.clone()
        } else {
            config.name
        };
        let history_store = match (config.enable_history, config.history_store) {
            (true, None) => Some(Arc::new(MemoryStorage::new(DEFAULT_MAX_SESSIONS)) as Arc<dyn WorkflowStorage>),
            (_, store) => store,
        };
        let num_history_runs = if config.num_history_runs == 0 {
            DEFAULT_NUM_HISTORY_RUNS
        } else {
            config.num_history_runs
        };

        Self {
            id,
            name,
            description: config.description,
            steps: config.steps,
            enable_history: config.enable_history,
            history_store,
            num_history_runs,
            add_history_to_steps: config.add_history_to_steps,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> &[Arc<dyn Node>] {
        &self.steps
    }

    pub fn add_step(&mut self, step: Arc<dyn Node>) {
        self.steps.push(step);
    }

    pub fn history_enabled(&self) -> bool {
        self.enable_history
    }

    pub fn history_store(&self) -> Option<&Arc<dyn WorkflowStorage>> {
        self.history_store.as_ref()
    }

    pub fn history_config(&self) -> HistoryConfig {
        HistoryConfig {
            add_history_to_steps: self.add_history_to_steps,
            num_history_runs: self.num_history_runs,
        }
    }

    /// Execute the workflow once.
    ///
    /// An empty `session_id` gets a generated `session-<uuid>`; a session id
    /// carried by the options' `RunContext` takes precedence over both.
    pub async fn run(
        &self,
        ctx: &CancelContext,
        input: &str,
        session_id: &str,
        options: RunOptions,
    ) -> Result<ExecutionContext, WorkflowError> {
        if let Some(err) = &options.media_error {
            return Err(WorkflowError::invalid_input(format!(
                "invalid media payload: {}",
                err
            )));
        }
        if input.is_empty() && options.media.is_empty() {
            return Err(WorkflowError::invalid_input("input cannot be empty"));
        }
        let start_index = self.resume_index(options.resume_from.as_deref())?;

        let mut session_id = if session_id.is_empty() {
            generate_session_id()
        } else {
            session_id.to_string()
        };
        let mut run_context = options.run_context.clone().unwrap_or_default();
        if run_context.session_id.is_empty() {
            run_context.session_id = session_id.clone();
        } else {
            session_id = run_context.session_id.clone();
        }
        if run_context.workflow_id.is_empty() {
            run_context.workflow_id = self.id.clone();
        }
        let run_id = run_context.ensure_run_id().to_string();

        log::info!(
            "Workflow started: workflow_id={} session_id={} steps={} resume_from={}",
            self.id,
            session_id,
            self.steps.len(),
            options.resume_from.as_deref().unwrap_or("-")
        );

        let metrics = WorkflowMetrics::new();
        metrics.start();

        let mut exec = self.prepare_context(input, &session_id, &options, &run_context);
        if self.enable_history {
            if self.history_store.is_some() {
                if let Err(e) = self.load_history(ctx, &mut exec).await {
                    log::error!("Failed to load history for session {}: {}", session_id, e);
                }
            }
            exec.history_config = Some(self.history_config());
        }

        let mut workflow_run = self
            .history_store
            .as_ref()
            .filter(|_| self.enable_history)
            .map(|_| self.new_run(&run_id, &session_id, input, &options, &run_context));

        let mut last_step_id = String::new();
        for (offset, step) in self.steps[start_index..].iter().enumerate() {
            if let Some(reason) = ctx.err() {
                log::warn!("Workflow {} cancelled before step {}: {}", self.id, step.id(), reason);
                self.record_cancellation(workflow_run.take(), &exec, reason, &last_step_id, &metrics)
                    .await;
                return Err(WorkflowError::Cancelled(reason));
            }

            last_step_id = step.id().to_string();
            if let Some(run) = workflow_run.as_mut() {
                run.last_step_id = last_step_id.clone();
            }
            log::info!(
                "Executing step: id={} type={} sequence={}",
                last_step_id,
                step.node_type(),
                offset + 1
            );

            if let Err(err) = step.execute(ctx, &mut exec).await {
                log::error!("Step {} failed: {}", last_step_id, err);
                // an agent may report an abort with its own error type
                if let Some(reason) = err.cancel_reason().or_else(|| ctx.err()) {
                    self.record_cancellation(workflow_run.take(), &exec, reason, &last_step_id, &metrics)
                        .await;
                } else if let Some(mut run) = workflow_run.take() {
                    run.mark_failed(&err);
                    metrics.stop();
                    if let Err(e) = self.persist_run(ctx, &exec.user_id, run, &metrics).await {
                        log::warn!("Failed to persist failed run for session {}: {}", session_id, e);
                    }
                }
                return Err(WorkflowError::Node {
                    id: last_step_id,
                    source: Box::new(err),
                });
            }
        }

        metrics.stop();
        if let Some(mut run) = workflow_run.take() {
            run.mark_completed(exec.output.clone());
            run.last_step_id = last_step_id;
            run.messages = extract_messages(&exec);
            self.persist_run(ctx, &exec.user_id, run, &metrics).await?;
        }

        if let Ok(snapshot) = serde_json::to_value(metrics.snapshot()) {
            exec.metadata.insert("workflow_metrics".to_string(), snapshot);
        }
        log::info!(
            "Workflow completed: workflow_id={} session_id={}",
            self.id,
            session_id
        );
        Ok(exec)
    }

    fn resume_index(&self, resume_from: Option<&str>) -> Result<usize, WorkflowError> {
        match resume_from {
            None => Ok(0),
            Some(step_id) => self
                .steps
                .iter()
                .position(|step| step.id() == step_id)
                .ok_or_else(|| WorkflowError::ResumeStepNotFound(step_id.to_string())),
        }
    }

    fn prepare_context(
        &self,
        input: &str,
        session_id: &str,
        options: &RunOptions,
        run_context: &RunContext,
    ) -> ExecutionContext {
        let user_id = options.user_id.clone().unwrap_or_default();
        let mut exec = ExecutionContext::with_session(input, session_id, user_id);
        exec.set_run_context(run_context.clone());
        exec.apply_session_state(options.session_state.clone());
        exec.merge_metadata(options.metadata.clone());
        if !options.media.is_empty() {
            if let Ok(media) = serde_json::to_value(&options.media) {
                exec.set_session_state("media_payload", media.clone());
                exec.metadata.insert("media".to_string(), media);
            }
        }
        exec
    }

    fn new_run(
        &self,
        run_id: &str,
        session_id: &str,
        input: &str,
        options: &RunOptions,
        run_context: &RunContext,
    ) -> WorkflowRun {
        let mut run = WorkflowRun::new(run_id, session_id, &self.id, input);
        run.mark_started();
        if let Some(step_id) = &options.resume_from {
            run.resumed_from = step_id.clone();
        }
        run.metadata.extend(options.metadata.clone());
        if !options.media.is_empty() {
            if let Ok(media) = serde_json::to_value(&options.media) {
                run.metadata.insert("media".to_string(), media);
            }
        }
        let correlation = run_context.to_metadata();
        if !correlation.is_empty() {
            run.metadata
                .insert("run_context".to_string(), Value::Object(correlation));
        }
        run
    }

    // Get the session, creating it on first reference
    async fn open_session(
        &self,
        store: &Arc<dyn WorkflowStorage>,
        ctx: &CancelContext,
        session_id: &str,
        user_id: &str,
    ) -> Result<Arc<WorkflowSession>, StorageError> {
        match store.get_session(ctx, session_id).await {
            Err(StorageError::SessionNotFound) => {
                match store.create_session(ctx, session_id, &self.id, user_id).await {
                    // lost a race with a concurrent run of the same session
                    Err(StorageError::SessionExists) => store.get_session(ctx, session_id).await,
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Load the session's recent runs into `exec`
    async fn load_history(&self, ctx: &CancelContext, exec: &mut ExecutionContext) -> Result<(), WorkflowError> {
        let Some(store) = &self.history_store else {
            return Ok(());
        };
        let session = self
            .open_session(store, ctx, &exec.session_id, &exec.user_id)
            .await?;
        exec.workflow_session = Some(session.clone());

        let history = session.get_history(self.num_history_runs);
        if history.is_empty() {
            return Ok(());
        }

        if self.add_history_to_steps {
            let context = format_history(&history, &HistoryFormatOptions::default());
            exec.set_session_state("workflow_history_context", Value::String(context.clone()));
            exec.history_context = context;
        }
        if let Ok(value) = serde_json::to_value(&history) {
            exec.set_session_state("workflow_history", value);
        }
        log::debug!(
            "Loaded history: session_id={} history_count={}",
            exec.session_id,
            history.len()
        );
        exec.workflow_history = history;
        Ok(())
    }

    /// Append a finished run to its session and store the session
    async fn persist_run(
        &self,
        ctx: &CancelContext,
        user_id: &str,
        mut run: WorkflowRun,
        metrics: &WorkflowMetrics,
    ) -> Result<(), WorkflowError> {
        let Some(store) = &self.history_store else {
            return Ok(());
        };
        let session = self.open_session(store, ctx, &run.session_id, user_id).await?;

        let snapshot = metrics.snapshot();
        if !snapshot.is_empty() {
            if let Ok(value) = serde_json::to_value(snapshot) {
                run.metadata.insert("metrics".to_string(), value);
            }
        }

        log::debug!(
            "Saving run: session_id={} run_id={} status={}",
            run.session_id,
            run.run_id,
            run.status
        );
        session.add_run(run);
        store.update_session(ctx, session).await?;
        Ok(())
    }

    async fn persist_cancellation(
        &self,
        ctx: &CancelContext,
        session_id: &str,
        user_id: &str,
        record: CancellationRecord,
    ) -> Result<(), WorkflowError> {
        let Some(store) = &self.history_store else {
            return Ok(());
        };
        let session = self.open_session(store, ctx, session_id, user_id).await?;
        log::debug!(
            "Saving cancellation: session_id={} run_id={} step_id={}",
            session_id,
            record.run_id,
            record.step_id
        );
        session.add_cancellation(record);
        store.update_session(ctx, session).await?;
        Ok(())
    }

    /// Mark the run cancelled and persist it with a fresh context, since the
    /// caller's context is already done
    async fn record_cancellation(
        &self,
        run: Option<WorkflowRun>,
        exec: &ExecutionContext,
        reason: CancelReason,
        step_id: &str,
        metrics: &WorkflowMetrics,
    ) {
        let Some(mut run) = run else {
            return;
        };
        run.apply_cancellation(reason.to_string(), step_id, exec.export_session_state());
        metrics.stop();

        let record = CancellationRecord {
            run_id: run.run_id.clone(),
            step_id: step_id.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        };
        let session_id = run.session_id.clone();
        let persist_ctx = CancelContext::with_timeout(PERSIST_TIMEOUT);
        if let Err(e) = self.persist_run(&persist_ctx, &exec.user_id, run, metrics).await {
            log::warn!("Failed to persist cancelled run for session {}: {}", session_id, e);
        }
        if let Err(e) = self
            .persist_cancellation(&persist_ctx, &session_id, &exec.user_id, record)
            .await
        {
            log::warn!("Failed to persist cancellation for session {}: {}", session_id, e);
        }
    }
}

/// Run transcript: the messages steps recorded, or a user/assistant pair
fn extract_messages(exec: &ExecutionContext) -> Vec<Message> {
    let messages = exec.messages();
    if !messages.is_empty() {
        return messages;
    }
    vec![
        Message::user(exec.input.clone()),
        Message::assistant(exec.output.clone()),
    ]
}

fn generate_session_id() -> String {
    format!("session-{}", Uuid::new_v4())
}
