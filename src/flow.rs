//! # Intake Flow Controller
//!
//! [`IntakeFlow`] owns the one field store and navigation state of a
//! respondent's session and drives every transition through the same
//! sequence: validation, eligibility, navigation, telemetry. All mutating
//! operations take `&mut self`, so transitions can never overlap.

use crate::collaborators::{
    HttpPersistenceClient, HttpUploadClient, InMemoryPersistence, PersistenceApi, UploadFile,
    UploadService,
};
use crate::config::IntakeConfig;
use crate::definition::FlowDefinition;
use crate::error::{IntakeError, Result};
use crate::fields::{FieldChange, FieldStore, FieldValue};
use crate::logging::{log_error, log_flow_operation};
use crate::segments::{Segment, SegmentId};
use crate::state_machine::{FlowEvent, FlowState, NavigationStateMachine};
use crate::submission::{SubmissionAssembler, SubmissionReceipt, Submitter, SystemDefaults};
use crate::telemetry::{
    FileSessionStorage, InMemorySessionStorage, SessionManager, SessionStorage, TelemetryEmitter,
    TelemetryEvent, TelemetryKind,
};
use crate::validation::SegmentValidation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Result of a navigation request
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    Advanced { from: usize, to: usize },
    Retreated { from: usize, to: usize },
    /// The active segment failed validation; errors are in the store
    Blocked(SegmentValidation),
    /// A disqualification rule matched; the flow is now closed
    Ineligible { segment_id: SegmentId, reason: String },
    /// The final segment validated and the flow awaits `submit`
    ReadyToSubmit,
    /// Nothing to do: first segment, or a terminal state
    Unchanged,
}

/// Position along the path the current answers produce
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// 1-based step number
    pub step: usize,
    pub total_steps: usize,
    pub percent: f64,
}

/// Serializable state for resuming an interrupted flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub flow_name: String,
    pub state: FlowState,
    pub history: Vec<usize>,
    pub values: BTreeMap<String, FieldValue>,
}

pub struct IntakeFlow {
    definition: Arc<FlowDefinition>,
    store: FieldStore,
    navigation: NavigationStateMachine,
    telemetry: TelemetryEmitter,
    assembler: SubmissionAssembler,
    defaults: SystemDefaults,
    submitter: Submitter,
    uploads: Option<Arc<dyn UploadService>>,
    session_id: Option<String>,
}

impl fmt::Debug for IntakeFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeFlow")
            .field("flow", &self.definition.name())
            .field("state", self.navigation.current_state())
            .field("session_id", &self.session_id)
            .field("uploads_enabled", &self.uploads.is_some())
            .finish()
    }
}

impl IntakeFlow {
    pub fn new(
        definition: Arc<FlowDefinition>,
        telemetry: TelemetryEmitter,
        persistence: Arc<dyn PersistenceApi>,
    ) -> Self {
        let store = FieldStore::new(definition.schema().clone());
        let navigation = NavigationStateMachine::new(definition.graph().len());
        let assembler = SubmissionAssembler::new(definition.sanitization().clone());

        Self {
            definition,
            store,
            navigation,
            telemetry,
            assembler,
            defaults: SystemDefaults::default(),
            submitter: Submitter::new(persistence),
            uploads: None,
            session_id: None,
        }
    }

    /// Wire collaborators from configuration
    ///
    /// Without a submission endpoint records are kept in process, which is
    /// what local development and dry runs want.
    pub fn from_config(definition: Arc<FlowDefinition>, config: &IntakeConfig) -> Result<Self> {
        let storage: Arc<dyn SessionStorage> = match &config.session.storage_dir {
            Some(dir) => Arc::new(FileSessionStorage::new(dir)),
            None => Arc::new(InMemorySessionStorage::new()),
        };
        let session = SessionManager::new(storage, config.session.storage_key.clone());
        let telemetry = TelemetryEmitter::from_config(&config.telemetry, session)
            .map_err(|e| IntakeError::Configuration(e.to_string()))?;

        let persistence: Arc<dyn PersistenceApi> = match &config.submission.endpoint {
            Some(endpoint) => Arc::new(
                HttpPersistenceClient::new(endpoint, config.submission.timeout())
                    .map_err(|e| IntakeError::Configuration(e.to_string()))?,
            ),
            None => Arc::new(InMemoryPersistence::new(config.submission.id_field.clone())),
        };

        let mut flow = Self::new(definition, telemetry, persistence)
            .with_defaults(SystemDefaults::from_config(&config.submission));

        if let Some(endpoint) = &config.uploads.endpoint {
            let uploads = HttpUploadClient::new(endpoint, config.uploads.timeout())
                .map_err(|e| IntakeError::Configuration(e.to_string()))?;
            flow = flow.with_uploads(Arc::new(uploads));
        }

        Ok(flow)
    }

    pub fn with_uploads(mut self, uploads: Arc<dyn UploadService>) -> Self {
        self.uploads = Some(uploads);
        self
    }

    pub fn with_defaults(mut self, defaults: SystemDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FieldChange> {
        self.store.subscribe()
    }

    pub fn state(&self) -> &FlowState {
        self.navigation.current_state()
    }

    pub fn history(&self) -> &[usize] {
        self.navigation.history()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn current_segment(&self) -> Option<&Segment> {
        self.state()
            .segment_index()
            .and_then(|index| self.definition.graph().get(index))
    }

    pub fn get_field(&self, name: &str) -> FieldValue {
        self.store.get_field(name)
    }

    /// Ensure the session id and report the segment being shown
    pub fn start(&mut self) -> Result<String> {
        self.ensure_open()?;

        let session_id = self.telemetry.ensure_session()?;
        self.session_id = Some(session_id.clone());

        if let Some(index) = self.state().segment_index() {
            self.report(TelemetryKind::SegmentReached, index);
        }

        log_flow_operation(
            "start",
            self.definition.name(),
            Some(&session_id),
            self.current_segment().map(|s| s.id.as_str()),
            "started",
            None,
        );
        Ok(session_id)
    }

    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        self.ensure_open()?;
        self.store.set_field(name, value)?;
        self.definition.derived().on_field_changed(&mut self.store, name)
    }

    pub fn set_array_field(&mut self, name: &str, item: &str, included: bool) -> Result<()> {
        self.ensure_open()?;
        self.store.set_array_field(name, item, included)?;
        self.definition.derived().on_field_changed(&mut self.store, name)
    }

    /// Validate, check eligibility, then move to the next visible segment
    pub fn next(&mut self) -> Result<NavigationOutcome> {
        let Some(index) = self.state().segment_index() else {
            return Ok(NavigationOutcome::Unchanged);
        };
        let definition = Arc::clone(&self.definition);
        let graph = definition.graph();
        let segment = graph
            .get(index)
            .ok_or_else(|| IntakeError::StateMachine(format!("no segment at index {index}")))?;

        let validation = self.validate_and_record(segment)?;
        if !validation.valid {
            debug!(
                flow = definition.name(),
                segment_id = %segment.id,
                first_failing_field = validation.first_failing_field(),
                "Navigation blocked by validation"
            );
            return Ok(NavigationOutcome::Blocked(validation));
        }

        if let Some(reason) = self.disqualify_if_ineligible("next", index, segment)? {
            return Ok(NavigationOutcome::Ineligible {
                segment_id: segment.id.clone(),
                reason,
            });
        }

        if index == graph.last_index() {
            return Ok(NavigationOutcome::ReadyToSubmit);
        }

        let to = graph.next(index, &self.store);
        self.navigation.transition(FlowEvent::Advance { to })?;
        self.report(TelemetryKind::SegmentReached, to);

        debug!(
            flow = definition.name(),
            from = index,
            to = to,
            "Advanced to next segment"
        );
        Ok(NavigationOutcome::Advanced { from: index, to })
    }

    /// Move back to the previous visible segment
    pub fn previous(&mut self) -> Result<NavigationOutcome> {
        let Some(index) = self.state().segment_index() else {
            return Ok(NavigationOutcome::Unchanged);
        };
        if index == 0 {
            return Ok(NavigationOutcome::Unchanged);
        }

        let to = self.definition.graph().previous(index, &self.store);
        self.navigation.transition(FlowEvent::Retreat { to })?;
        self.report(TelemetryKind::SegmentReached, to);

        debug!(
            flow = self.definition.name(),
            from = index,
            to = to,
            "Moved back to previous segment"
        );
        Ok(NavigationOutcome::Retreated { from: index, to })
    }

    /// Upload a file and store its URL under `field`
    ///
    /// A failure marks only that field with an inline error.
    pub async fn upload(&mut self, field: &str, file: UploadFile) -> Result<String> {
        self.ensure_open()?;
        if !self.store.schema().contains(field) {
            return Err(IntakeError::UnknownField(field.to_string()));
        }

        let Some(uploads) = self.uploads.clone() else {
            return Err(self.upload_failed(field, "no upload service configured".to_string()));
        };

        match uploads.upload(file).await {
            Ok(url) => {
                self.set_field(field, FieldValue::text(url.clone()))?;
                Ok(url)
            }
            Err(e) => Err(self.upload_failed(field, e.to_string())),
        }
    }

    fn upload_failed(&mut self, field: &str, reason: String) -> IntakeError {
        warn!(flow = self.definition.name(), field = field, reason = %reason, "Upload failed");
        self.store.set_error(field, format!("Upload failed: {reason}"));
        IntakeError::Upload {
            field: field.to_string(),
            reason,
        }
    }

    /// Assemble and send the payload; a retry after failure resends it as is
    pub async fn submit(&mut self) -> Result<SubmissionReceipt> {
        let index = match self.state() {
            FlowState::Segment { index } => *index,
            FlowState::Submitted => return Err(IntakeError::AlreadySubmitted),
            state @ FlowState::Ineligible { .. } => {
                return Err(IntakeError::FlowClosed {
                    state: state.to_string(),
                })
            }
        };

        let definition = Arc::clone(&self.definition);
        let graph = definition.graph();
        let segment = graph
            .get(index)
            .ok_or_else(|| IntakeError::StateMachine(format!("no segment at index {index}")))?;
        if index != graph.last_index() || !self.validate_and_record(segment)?.valid {
            return Err(IntakeError::Incomplete {
                segment_id: segment.id.to_string(),
            });
        }
        // Answers on the final segment may change after ReadyToSubmit
        if self
            .disqualify_if_ineligible("submit", index, segment)?
            .is_some()
        {
            return Err(IntakeError::FlowClosed {
                state: self.state().to_string(),
            });
        }

        let derived = definition.derived().compute_all(&self.store);
        let values = self.store.values();
        let assembler = &self.assembler;
        let defaults = &self.defaults;
        let receipt = match self
            .submitter
            .submit(|| assembler.assemble(values, &derived, defaults))
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                log_error("flow", "submit", &e.to_string(), self.session_id.as_deref());
                return Err(e);
            }
        };

        self.navigation.transition(FlowEvent::Submit)?;
        self.report(TelemetryKind::Submitted, index);
        self.session_id = None;

        info!(
            flow = definition.name(),
            record_id = receipt.payload.str_field(&self.defaults.id_field),
            "Intake submitted"
        );
        Ok(receipt)
    }

    pub fn progress(&self) -> Progress {
        let path = self.definition.graph().path(&self.store);
        let total_steps = path.len();
        let step = match self.state() {
            FlowState::Segment { index } => path.iter().filter(|&&i| i <= *index).count().max(1),
            FlowState::Submitted | FlowState::Ineligible { .. } => total_steps,
        };
        let percent = match self.state() {
            FlowState::Submitted => 100.0,
            _ if total_steps == 0 => 0.0,
            _ => (step as f64 / total_steps as f64 * 1000.0).round() / 10.0,
        };
        Progress {
            step,
            total_steps,
            percent,
        }
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            flow_name: self.definition.name().to_string(),
            state: self.state().clone(),
            history: self.history().to_vec(),
            values: self.store.values().clone(),
        }
    }

    /// Replace answers and position with a previously captured snapshot
    ///
    /// A flow that already ended as ineligible or submitted stays closed.
    pub fn resume(&mut self, snapshot: FlowSnapshot) -> Result<()> {
        self.ensure_open()?;
        if snapshot.flow_name != self.definition.name() {
            return Err(IntakeError::Definition(format!(
                "snapshot belongs to flow '{}', not '{}'",
                snapshot.flow_name,
                self.definition.name()
            )));
        }

        let navigation = NavigationStateMachine::restore(
            snapshot.state,
            snapshot.history,
            self.definition.graph().len(),
        )?;
        let mut store =
            FieldStore::with_values(self.definition.schema().clone(), snapshot.values)?;
        self.definition.derived().recompute_all(&mut store)?;

        self.store = store;
        self.navigation = navigation;

        info!(
            flow = self.definition.name(),
            state = %self.navigation.current_state(),
            "Resumed intake flow"
        );
        Ok(())
    }

    /// Close the flow as ineligible when a rule on `segment` matches
    fn disqualify_if_ineligible(
        &mut self,
        operation: &str,
        index: usize,
        segment: &Segment,
    ) -> Result<Option<String>> {
        let Some(rule) = self
            .definition
            .eligibility()
            .disqualifying_rule(&segment.id, &self.store)
        else {
            return Ok(None);
        };
        let reason = rule.reason.clone();

        self.navigation.transition(FlowEvent::Disqualify {
            segment_id: segment.id.clone(),
        })?;
        self.report(TelemetryKind::Ineligible, index);
        log_flow_operation(
            operation,
            self.definition.name(),
            self.session_id.as_deref(),
            Some(segment.id.as_str()),
            "ineligible",
            Some(&reason),
        );
        self.session_id = None;
        Ok(Some(reason))
    }

    fn ensure_open(&self) -> Result<()> {
        let state = self.state();
        if state.is_terminal() {
            return Err(IntakeError::FlowClosed {
                state: state.to_string(),
            });
        }
        Ok(())
    }

    /// Validate one segment and mirror the result into the store's errors
    fn validate_and_record(&mut self, segment: &Segment) -> Result<SegmentValidation> {
        let validation = self
            .definition
            .validation()
            .validate_segment(&segment.id, &self.store)?;

        for field in &segment.field_names {
            self.store.clear_error(field);
        }
        for error in &validation.errors {
            self.store.set_error(&error.field, error.message.clone());
        }
        Ok(validation)
    }

    fn identity(&self) -> BTreeMap<String, String> {
        self.definition
            .identity_fields()
            .iter()
            .filter(|field| self.store.is_set(field))
            .map(|field| (field.clone(), self.store.get_field(field)))
            .filter(|(_, value)| !value.is_empty())
            .map(|(field, value)| (field, value.to_string()))
            .collect()
    }

    fn report(&self, kind: TelemetryKind, index: usize) {
        let Some(session_id) = &self.session_id else {
            debug!(event = %kind, "Flow not started, skipping telemetry");
            return;
        };
        let Some(segment) = self.definition.graph().get(index) else {
            return;
        };
        self.telemetry.report(TelemetryEvent::new(
            kind,
            session_id.clone(),
            index,
            segment.id.clone(),
            self.identity(),
        ));
    }
}
