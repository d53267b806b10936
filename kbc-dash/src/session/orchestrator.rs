//! Evaluation session orchestration
//!
//! Drives the upload → extract → train → evaluate chain against a
//! `KbcBackend`, owns the selection, display store and notification feed, and
//! re-queries evaluation stats whenever the selection changes.
//!
//! Every backend call happens with the state lock released. A stats query
//! carries the selection key and the query generation it was issued under;
//! once the lock is taken again a response whose generation has moved on is
//! dropped, so a response that arrives after the user (or a pipeline stage)
//! moved on never reaches the display.

use crate::models::{
    CompletionKind, EvaluationKey, Notification, NotificationFeed, OntologyFile, Selection,
    SelectionUpdate,
};
use crate::services::KbcBackend;
use crate::session::display_state::{DisplayState, DisplayTransition};
use chrono::Utc;
use kbc_common::events::{DashboardEvent, EventBus, NotificationStatus, SessionPhase};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Result of a stage operation (describes the last stage of the chain)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    Succeeded,
    Failed,
    /// Refused before any backend call
    Rejected,
}

/// Result of an evaluation stats query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOutcome {
    /// Response installed
    Applied,
    /// Query failed; display reset to the zero-value record
    Reset,
    /// Selection or phase moved on while the query was in flight
    Superseded,
    /// Selection incomplete or phase does not allow a query
    NotIssued,
}

/// Read-only view of the session for view layers
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub selection: Selection,
    pub display: DisplayState,
    /// Derived from the displayed summary; `None` before extraction
    pub completion_kind: Option<CompletionKind>,
    /// Newest first
    pub notifications: Vec<Notification>,
    pub ontologies: Vec<String>,
}

struct SessionState {
    phase: SessionPhase,
    selection: Selection,
    display: DisplayState,
    feed: NotificationFeed,
    ontologies: Vec<String>,
    /// Bumped on every selection change, stage start and installed evaluation
    query_generation: u64,
}

enum AfterEvaluate {
    Installed,
    Requery { summary_for: Option<String> },
}

/// Tag carried by an in-flight evaluation stats query
#[derive(Debug, Clone)]
struct StatsQuery {
    key: EvaluationKey,
    generation: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            selection: Selection::default(),
            display: DisplayState::new(),
            feed: NotificationFeed::new(),
            ontologies: Vec::new(),
            query_generation: 0,
        }
    }

    fn invalidate_queries(&mut self) {
        self.query_generation = self.query_generation.wrapping_add(1);
    }
}

/// Client-side state machine for one evaluation session
#[derive(Clone)]
pub struct SessionOrchestrator {
    session_id: Uuid,
    backend: Arc<dyn KbcBackend>,
    state: Arc<RwLock<SessionState>>,
    event_bus: EventBus,
}

impl SessionOrchestrator {
    pub fn new(backend: Arc<dyn KbcBackend>, event_bus: EventBus) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            backend,
            state: Arc::new(RwLock::new(SessionState::new())),
            event_bus,
        }
    }

    /// Load the backend's ontology list
    pub async fn init(&self) {
        tracing::info!(session_id = %self.session_id, "Initializing evaluation session");
        self.refresh_ontology_list().await;
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.event_bus.subscribe()
    }

    // ========================================
    // Pipeline stages
    // ========================================

    /// Upload an ontology file, then extract it
    ///
    /// The name is trimmed and a trailing `.owl` dropped before validation.
    /// Validation failures append one error notification and touch nothing
    /// else.
    pub async fn upload(
        &self,
        file: OntologyFile,
        ontology_name: &str,
        owner_alias: &str,
    ) -> StageOutcome {
        let name = normalize_ontology_name(ontology_name);
        let alias = owner_alias.trim();

        {
            let mut state = self.state.write().await;
            let problem = busy_problem(state.phase)
                .or_else(|| upload_problem(&file, &name, alias, &state.ontologies));
            if let Some(problem) = problem {
                tracing::warn!(session_id = %self.session_id, ontology = %name, "Upload rejected: {}", problem);
                self.notify(&mut state, problem, NotificationStatus::Error);
                return StageOutcome::Rejected;
            }
            self.begin_stage(&mut state, format!("upload: {}", name), SessionPhase::Uploading);
        }

        match self.backend.upload(file, &name, alias).await {
            Ok(ack) => {
                {
                    let mut state = self.state.write().await;
                    let message = ack
                        .message
                        .unwrap_or_else(|| format!("Uploaded {}", ack.ontology_name));
                    self.notify(&mut state, message, NotificationStatus::Success);
                }
                self.refresh_ontology_list().await;
                self.extract_stage(&ack.ontology_name).await
            }
            Err(e) => {
                let mut state = self.state.write().await;
                self.fail_stage(&mut state, e.user_message());
                StageOutcome::Failed
            }
        }
    }

    /// Extract structural statistics for an already uploaded ontology
    pub async fn extract(&self, ontology: &str) -> StageOutcome {
        if !self.accept_trigger().await {
            return StageOutcome::Rejected;
        }
        self.extract_stage(ontology).await
    }

    /// The "Run" action: train then evaluate the current selection
    pub async fn run(&self) -> StageOutcome {
        let key = {
            let mut state = self.state.write().await;
            if let Some(problem) = busy_problem(state.phase) {
                self.notify(&mut state, problem, NotificationStatus::Error);
                return StageOutcome::Rejected;
            }
            match state.selection.evaluation_key() {
                Some(key) => key,
                None => {
                    self.notify(
                        &mut state,
                        "Select an ontology, an algorithm and a classifier before running",
                        NotificationStatus::Error,
                    );
                    return StageOutcome::Rejected;
                }
            }
        };
        self.train_stage(key).await
    }

    /// Train the embedder for `key`, then evaluate it
    pub async fn train(&self, key: EvaluationKey) -> StageOutcome {
        if !self.accept_trigger().await {
            return StageOutcome::Rejected;
        }
        self.train_stage(key).await
    }

    /// Evaluate an already trained embedder
    pub async fn evaluate(&self, key: EvaluationKey) -> StageOutcome {
        if !self.accept_trigger().await {
            return StageOutcome::Rejected;
        }
        self.evaluate_stage(key).await
    }

    async fn extract_stage(&self, ontology: &str) -> StageOutcome {
        {
            let mut state = self.state.write().await;
            self.begin_stage(&mut state, format!("extract: {}", ontology), SessionPhase::Extracting);
        }

        let result = self.backend.extract(ontology).await;

        {
            let mut state = self.state.write().await;
            match result {
                Ok(output) => {
                    let message = output
                        .message
                        .unwrap_or_else(|| format!("Extracted {}", ontology));
                    self.notify(&mut state, message, NotificationStatus::Success);
                    self.apply_display(&mut state, DisplayTransition::Cleared);
                    self.set_selection(&mut state, Selection::for_ontology(ontology));
                    self.apply_display(&mut state, DisplayTransition::OntologyInstalled(output.summary));
                    self.set_phase(&mut state, SessionPhase::Ready);
                }
                Err(e) => {
                    self.apply_display(&mut state, DisplayTransition::Cleared);
                    self.set_selection(&mut state, Selection::default());
                    self.fail_stage(&mut state, e.user_message());
                    return StageOutcome::Failed;
                }
            }
        }

        self.refresh_ontology_list().await;
        StageOutcome::Succeeded
    }

    async fn train_stage(&self, key: EvaluationKey) -> StageOutcome {
        {
            let mut state = self.state.write().await;
            self.begin_stage(
                &mut state,
                format!("train embedder: {} with {}", key.ontology, key.algorithm),
                SessionPhase::Training,
            );
        }

        match self.backend.embed(&key.ontology, &key.algorithm).await {
            Ok(ack) => {
                {
                    let mut state = self.state.write().await;
                    let message = ack
                        .message
                        .unwrap_or_else(|| format!("Trained {} on {}", key.algorithm, key.ontology));
                    self.notify(&mut state, message, NotificationStatus::Success);
                }
                self.evaluate_stage(key).await
            }
            Err(e) => {
                let mut state = self.state.write().await;
                self.fail_stage(&mut state, e.user_message());
                StageOutcome::Failed
            }
        }
    }

    async fn evaluate_stage(&self, key: EvaluationKey) -> StageOutcome {
        {
            let mut state = self.state.write().await;
            self.begin_stage(
                &mut state,
                format!(
                    "evaluate embedder: {} with {} on {}",
                    key.ontology, key.algorithm, key.classifier
                ),
                SessionPhase::Evaluating,
            );
        }

        let result = self.backend.evaluate(&key).await;

        let follow_up = {
            let mut state = self.state.write().await;
            match result {
                Ok(output) => {
                    let message = output
                        .message
                        .unwrap_or_else(|| format!("Evaluated {}", key));
                    self.notify(&mut state, message, NotificationStatus::Success);

                    if state.selection.evaluation_key().as_ref() == Some(&key) {
                        self.apply_display(
                            &mut state,
                            DisplayTransition::EvaluationInstalled {
                                key: key.clone(),
                                report: output.report,
                            },
                        );
                        self.set_phase(&mut state, SessionPhase::Displaying);
                        AfterEvaluate::Installed
                    } else {
                        tracing::debug!(
                            session_id = %self.session_id,
                            evaluated = %key,
                            "Selection changed during evaluation, result not displayed"
                        );
                        self.set_phase(&mut state, SessionPhase::Ready);
                        // A newly picked ontology had its summary fetch skipped while busy
                        let shown = state.display.ontology().map(|summary| summary.id.clone());
                        let summary_for = state
                            .selection
                            .ontology
                            .clone()
                            .filter(|ontology| shown.as_ref() != Some(ontology));
                        AfterEvaluate::Requery { summary_for }
                    }
                }
                Err(e) => {
                    self.apply_display(&mut state, DisplayTransition::EvaluationReset);
                    self.fail_stage(&mut state, e.user_message());
                    return StageOutcome::Failed;
                }
            }
        };

        match follow_up {
            AfterEvaluate::Installed => self.refresh_summary(&key.ontology).await,
            AfterEvaluate::Requery { summary_for } => {
                let summary = async {
                    if let Some(ontology) = &summary_for {
                        self.refresh_summary(ontology).await;
                    }
                };
                tokio::join!(summary, self.query_current_selection());
            }
        }
        StageOutcome::Succeeded
    }

    // ========================================
    // Selection and evaluation stats query
    // ========================================

    pub async fn select_ontology(&self, ontology: &str) -> QueryOutcome {
        self.update_selection(SelectionUpdate::ontology(ontology)).await
    }

    pub async fn select_algorithm(&self, algorithm: &str) -> QueryOutcome {
        self.update_selection(SelectionUpdate::algorithm(algorithm)).await
    }

    pub async fn select_classifier(&self, classifier: &str) -> QueryOutcome {
        self.update_selection(SelectionUpdate::classifier(classifier)).await
    }

    /// Apply a selection change and re-query evaluation stats
    ///
    /// The query is issued for every update that leaves the selection
    /// complete while the phase is Ready or Displaying, even when nothing
    /// changed.
    pub async fn update_selection(&self, update: SelectionUpdate) -> QueryOutcome {
        let (summary_for, query) = {
            let mut state = self.state.write().await;
            let previous_ontology = state.selection.ontology.clone();

            if state.selection.apply(&update) {
                state.invalidate_queries();
                log_unknown_catalog_ids(&state.selection);
                self.emit_selection(&state.selection);

                let ontology_changed = state.selection.ontology != previous_ontology;
                let current_key = state.selection.evaluation_key();
                if ontology_changed {
                    self.apply_display(&mut state, DisplayTransition::Cleared);
                } else if state.display.evaluated().is_some()
                    && state.display.evaluated() != current_key.as_ref()
                {
                    self.apply_display(&mut state, DisplayTransition::EvaluationReset);
                }

                let next_phase = match (state.phase, state.selection.ontology.is_some()) {
                    (SessionPhase::Idle | SessionPhase::Failed, true) => SessionPhase::Ready,
                    (SessionPhase::Ready | SessionPhase::Displaying, false) => SessionPhase::Idle,
                    (SessionPhase::Displaying, true) if state.display.evaluated().is_none() => {
                        SessionPhase::Ready
                    }
                    (phase, _) => phase,
                };
                self.set_phase(&mut state, next_phase);

                let summary_for = if ontology_changed && state.phase.allows_autonomous_query() {
                    state.selection.ontology.clone()
                } else {
                    None
                };
                (summary_for, self.stats_query(&state))
            } else {
                (None, self.stats_query(&state))
            }
        };

        let summary = async {
            if let Some(ontology) = &summary_for {
                self.refresh_summary(ontology).await;
            }
        };
        let query = async {
            match query {
                Some(query) => self.query_evaluation(query).await,
                None => QueryOutcome::NotIssued,
            }
        };
        let ((), outcome) = tokio::join!(summary, query);
        outcome
    }

    /// Key and generation for a query issued now, read under one lock
    fn stats_query(&self, state: &SessionState) -> Option<StatsQuery> {
        if !state.phase.allows_autonomous_query() {
            return None;
        }
        state.selection.evaluation_key().map(|key| StatsQuery {
            key,
            generation: state.query_generation,
        })
    }

    async fn query_current_selection(&self) -> QueryOutcome {
        let query = {
            let state = self.state.read().await;
            self.stats_query(&state)
        };
        match query {
            Some(query) => self.query_evaluation(query).await,
            None => QueryOutcome::NotIssued,
        }
    }

    /// Read-only stats query tagged with the selection it was issued for
    ///
    /// The response is dropped as `Superseded` when the selection key no
    /// longer matches or when the query generation moved on in the meantime
    /// (selection change, stage start, or another evaluation installed).
    async fn query_evaluation(&self, query: StatsQuery) -> QueryOutcome {
        let StatsQuery { key, generation } = query;
        tracing::debug!(
            session_id = %self.session_id,
            tag = %key,
            generation,
            "Issuing evaluation stats query"
        );

        let result = self.backend.evaluation_stats(&key).await;

        let mut state = self.state.write().await;
        if state.selection.evaluation_key().as_ref() != Some(&key) {
            tracing::debug!(session_id = %self.session_id, tag = %key, "Discarding superseded evaluation stats");
            return QueryOutcome::Superseded;
        }
        if state.query_generation != generation {
            tracing::debug!(
                session_id = %self.session_id,
                tag = %key,
                issued = generation,
                current = state.query_generation,
                "Discarding evaluation stats from an older generation"
            );
            return QueryOutcome::Superseded;
        }
        if !state.phase.allows_autonomous_query() {
            tracing::debug!(
                session_id = %self.session_id,
                tag = %key,
                phase = %state.phase,
                "Discarding evaluation stats, a pipeline stage took over"
            );
            return QueryOutcome::Superseded;
        }

        match result {
            Ok(report) => {
                self.apply_display(&mut state, DisplayTransition::EvaluationInstalled { key, report });
                self.set_phase(&mut state, SessionPhase::Displaying);
                QueryOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, tag = %key, "Evaluation stats query failed: {}", e);
                self.apply_display(&mut state, DisplayTransition::EvaluationReset);
                self.set_phase(&mut state, SessionPhase::Ready);
                QueryOutcome::Reset
            }
        }
    }

    /// Silent summary refresh; applied only if the ontology is still selected
    async fn refresh_summary(&self, ontology: &str) {
        match self.backend.ontology_stats(ontology).await {
            Ok(summary) => {
                let mut state = self.state.write().await;
                if state.selection.ontology.as_deref() == Some(ontology) {
                    self.apply_display(&mut state, DisplayTransition::OntologyInstalled(summary));
                } else {
                    tracing::debug!(ontology = %ontology, "Discarding summary for deselected ontology");
                }
            }
            Err(e) => {
                tracing::warn!(ontology = %ontology, "Ontology summary refresh failed: {}", e);
            }
        }
    }

    /// Pick garbage pair `index`; returns the resulting selection
    pub async fn select_garbage(&self, index: usize) -> Option<usize> {
        let mut state = self.state.write().await;
        self.apply_display(&mut state, DisplayTransition::GarbageSelected(index));
        state.display.garbage_index()
    }

    /// Reload the known ontology names; failures only log
    pub async fn refresh_ontology_list(&self) -> Vec<String> {
        match self.backend.list_ontologies().await {
            Ok(ontologies) => {
                let mut state = self.state.write().await;
                if state.ontologies != ontologies {
                    state.ontologies = ontologies.clone();
                    self.event_bus.emit_lossy(DashboardEvent::OntologyListUpdated {
                        ontologies: ontologies.clone(),
                        timestamp: Utc::now(),
                    });
                }
                ontologies
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, "Ontology list refresh failed: {}", e);
                self.state.read().await.ontologies.clone()
            }
        }
    }

    // ========================================
    // Readers
    // ========================================

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            session_id: self.session_id,
            phase: state.phase,
            selection: state.selection.clone(),
            display: state.display.clone(),
            completion_kind: state.display.ontology().map(|summary| summary.completion_kind()),
            notifications: state.feed.newest_first().cloned().collect(),
            ontologies: state.ontologies.clone(),
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    pub async fn selection(&self) -> Selection {
        self.state.read().await.selection.clone()
    }

    pub async fn display(&self) -> DisplayState {
        self.state.read().await.display.clone()
    }

    /// Oldest first
    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.feed.iter().cloned().collect()
    }

    pub async fn ontologies(&self) -> Vec<String> {
        self.state.read().await.ontologies.clone()
    }

    // ========================================
    // State helpers (caller holds the write lock)
    // ========================================

    /// Gate for externally triggered stages
    async fn accept_trigger(&self) -> bool {
        let mut state = self.state.write().await;
        match busy_problem(state.phase) {
            Some(problem) => {
                self.notify(&mut state, problem, NotificationStatus::Error);
                false
            }
            None => true,
        }
    }

    fn begin_stage(&self, state: &mut SessionState, message: String, phase: SessionPhase) {
        state.invalidate_queries();
        self.notify(state, message, NotificationStatus::Waiting);
        self.set_phase(state, phase);
    }

    fn fail_stage(&self, state: &mut SessionState, message: String) {
        self.notify(state, message, NotificationStatus::Error);
        self.set_phase(state, SessionPhase::Failed);
    }

    fn notify(&self, state: &mut SessionState, message: impl Into<String>, status: NotificationStatus) {
        let notification = state.feed.push(message, status);
        match status {
            NotificationStatus::Error => tracing::warn!(
                session_id = %self.session_id,
                sequence = notification.sequence,
                "{}",
                notification.message
            ),
            _ => tracing::info!(
                session_id = %self.session_id,
                sequence = notification.sequence,
                status = %status,
                "{}",
                notification.message
            ),
        }
        self.event_bus.emit_lossy(DashboardEvent::NotificationAppended {
            sequence: notification.sequence,
            message: notification.message,
            status: notification.status,
            timestamp: notification.timestamp,
        });
    }

    fn set_phase(&self, state: &mut SessionState, new_phase: SessionPhase) {
        let old_phase = state.phase;
        if old_phase == new_phase {
            return;
        }
        state.phase = new_phase;
        tracing::info!(session_id = %self.session_id, "Phase: {} → {}", old_phase, new_phase);
        self.event_bus.emit_lossy(DashboardEvent::PhaseChanged {
            old_phase,
            new_phase,
            timestamp: Utc::now(),
        });
    }

    fn set_selection(&self, state: &mut SessionState, selection: Selection) {
        if state.selection != selection {
            state.selection = selection;
            state.invalidate_queries();
            self.emit_selection(&state.selection);
        }
    }

    fn emit_selection(&self, selection: &Selection) {
        self.event_bus.emit_lossy(DashboardEvent::SelectionChanged {
            ontology: selection.ontology.clone(),
            algorithm: selection.algorithm.clone(),
            classifier: selection.classifier.clone(),
            timestamp: Utc::now(),
        });
    }

    fn apply_display(&self, state: &mut SessionState, transition: DisplayTransition) {
        if matches!(transition, DisplayTransition::EvaluationInstalled { .. }) {
            state.invalidate_queries();
        }
        let version = state.display.apply(transition);
        self.event_bus.emit_lossy(DashboardEvent::DisplayUpdated {
            version,
            timestamp: Utc::now(),
        });
    }
}

/// Trim and drop a trailing `.owl`
pub fn normalize_ontology_name(name: &str) -> String {
    let trimmed = name.trim();
    trimmed
        .strip_suffix(".owl")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn upload_problem(
    file: &OntologyFile,
    name: &str,
    alias: &str,
    known: &[String],
) -> Option<String> {
    if file.is_empty() {
        Some("No ontology file selected".to_string())
    } else if name.is_empty() {
        Some("Ontology name is required".to_string())
    } else if alias.is_empty() {
        Some("Owner alias is required".to_string())
    } else if known.iter().any(|existing| existing == name) {
        Some(format!("Ontology name already exists: {}", name))
    } else {
        None
    }
}

fn busy_problem(phase: SessionPhase) -> Option<String> {
    phase
        .is_busy()
        .then(|| format!("Another pipeline stage is still running ({})", phase))
}

fn log_unknown_catalog_ids(selection: &Selection) {
    if let Some(algorithm) = selection.algorithm.as_deref() {
        if !crate::models::catalog::is_known_algorithm(algorithm) {
            tracing::debug!(algorithm = %algorithm, "Algorithm not in local catalog");
        }
    }
    if let Some(classifier) = selection.classifier.as_deref() {
        if !crate::models::catalog::is_known_classifier(classifier) {
            tracing::debug!(classifier = %classifier, "Classifier not in local catalog");
        }
    }
}
