//! Editing session — drives the submit/validate state machine.
//!
//! A session owns one form model and serializes every change to it. Only the
//! most recently started submission may land: starting a new one cancels the
//! previous call, and results arriving for any other submission id are
//! discarded.

use std::time::Duration;

use appspec_core::AppSpecification;
use appspec_form::{ClientAppModel, FieldLocks, ReconcileSummary, apply_source, apply_validated, from_client_model, to_client_model};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, SessionError, ValidateError};
use crate::gateway::{ValidationGateway, ValidationRequest};

/// Where the session is in the submit cycle.
#[derive(Debug)]
pub enum SessionState {
    /// Edited locally, not yet submitted.
    Draft,
    /// A submission is in flight.
    Validating { submission: u64 },
    /// The latest submission was accepted and merged into the model, and
    /// the model still matches what the authority returned.
    Validated,
    /// The latest submission failed. The model is as it was before.
    ValidationFailed { error: ValidateError },
    /// The validated specification was handed off. Terminal.
    Applied,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Draft => "draft",
            SessionState::Validating { .. } => "validating",
            SessionState::Validated => "validated",
            SessionState::ValidationFailed { .. } => "validation-failed",
            SessionState::Applied => "applied",
        }
    }
}

/// The project and deployment target a session validates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTarget {
    pub project_id: u64,
    pub deployment_target_id: String,
}

/// A started submission. Pass it to a gateway, then hand the result back
/// to [`EditingSession::complete`].
#[derive(Debug)]
pub struct Submission {
    pub id: u64,
    pub request: ValidationRequest,
    /// Hex SHA-256 of the encoded specification.
    pub fingerprint: String,
    cancel: watch::Receiver<bool>,
}

impl Submission {
    /// Turns `true` when a newer submission supersedes this one.
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel.clone()
    }
}

/// What happened to a completed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Merged into the model.
    Validated(ReconcileSummary),
    /// Merged into the model, but the model had changed while the
    /// submission was in flight. The session is back in `Draft` and must be
    /// resubmitted before it can be applied.
    Reopened(ReconcileSummary),
    /// Recorded as `ValidationFailed`.
    Failed { retryable: bool },
    /// Not the latest submission. Ignored.
    Discarded,
}

#[derive(Debug)]
struct InFlight {
    id: u64,
    submitted: AppSpecification,
    cancel: watch::Sender<bool>,
}

#[derive(Debug)]
pub struct EditingSession {
    target: ValidationTarget,
    timeout: Duration,
    model: ClientAppModel,
    state: SessionState,
    last_submission: u64,
    in_flight: Option<InFlight>,
    /// The authority's answer to the latest accepted submission. Set only
    /// in `Validated`.
    validated: Option<AppSpecification>,
}

impl EditingSession {
    /// Open a session on a freshly canonicalized source.
    pub fn new(target: ValidationTarget, spec: &AppSpecification, locks: &FieldLocks, timeout: Duration) -> Self {
        info!(
            app = %spec.name,
            project = target.project_id,
            deployment_target = %target.deployment_target_id,
            "editing session opened"
        );
        Self {
            target,
            timeout,
            model: to_client_model(spec, locks, None),
            state: SessionState::Draft,
            last_submission: 0,
            in_flight: None,
            validated: None,
        }
    }

    pub fn model(&self) -> &ClientAppModel {
        &self.model
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Mutable access to the model for local edits.
    ///
    /// Leaves `Validated` and `ValidationFailed` for `Draft`. An in-flight
    /// submission stays in flight; its result still merges over the edits,
    /// but the session reopens instead of becoming `Validated` when the
    /// edits survive the merge.
    pub fn edit(&mut self) -> Result<&mut ClientAppModel, SessionError> {
        match self.state {
            SessionState::Applied => return Err(self.invalid("edit")),
            SessionState::Validated | SessionState::ValidationFailed { .. } => {
                self.state = SessionState::Draft;
                self.validated = None;
            }
            SessionState::Draft | SessionState::Validating { .. } => {}
        }
        Ok(&mut self.model)
    }

    /// Reconcile a new canonicalization of the source (a new commit).
    pub fn refresh_source(
        &mut self,
        spec: &AppSpecification,
        locks: &FieldLocks,
    ) -> Result<ReconcileSummary, SessionError> {
        if matches!(self.state, SessionState::Applied) {
            return Err(self.invalid("refresh the source"));
        }
        let (model, summary) = apply_source(&self.model, spec, locks);
        self.model = model;
        if matches!(self.state, SessionState::Validated) {
            self.state = SessionState::Draft;
            self.validated = None;
        }
        Ok(summary)
    }

    /// Start a submission of the current model.
    ///
    /// The model must convert to a valid specification; otherwise nothing
    /// is sent and the state is unchanged. Any submission still in flight is
    /// cancelled.
    pub fn begin_submission(&mut self, commit_sha: &str) -> Result<Submission, SessionError> {
        if matches!(self.state, SessionState::Applied) {
            return Err(self.invalid("submit"));
        }
        let app = from_client_model(&self.model)?;
        let fingerprint = appspec_wire::fingerprint(&app);

        if let Some(previous) = self.in_flight.take() {
            debug!(submission = previous.id, "cancelling superseded submission");
            // The receiver may already be gone.
            let _ = previous.cancel.send(true);
        }

        self.last_submission += 1;
        let id = self.last_submission;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.in_flight = Some(InFlight {
            id,
            submitted: app.clone(),
            cancel: cancel_tx,
        });
        self.state = SessionState::Validating { submission: id };
        self.validated = None;
        info!(
            submission = id,
            app = %app.name,
            commit = %commit_sha,
            %fingerprint,
            "submitting app for validation"
        );

        Ok(Submission {
            id,
            request: ValidationRequest {
                project_id: self.target.project_id,
                deployment_target_id: self.target.deployment_target_id.clone(),
                commit_sha: commit_sha.to_string(),
                app,
            },
            fingerprint,
            cancel: cancel_rx,
        })
    }

    /// Record the result of submission `id`.
    pub fn complete(&mut self, id: u64, result: Result<AppSpecification, ValidateError>) -> Completion {
        let flight = match self.in_flight.take() {
            Some(flight) if flight.id == id => flight,
            other => {
                self.in_flight = other;
                debug!(submission = id, latest = self.last_submission, "discarding stale validation result");
                return Completion::Discarded;
            }
        };

        match result {
            Ok(validated) => {
                let (model, summary) = apply_validated(&self.model, &flight.submitted, &validated);
                self.model = model;
                // Edits made while the submission was in flight were never
                // seen by the authority.
                if from_client_model(&self.model).ok().as_ref() != Some(&validated) {
                    info!(submission = id, app = %validated.name, "model changed during validation, resubmit required");
                    self.state = SessionState::Draft;
                    return Completion::Reopened(summary);
                }
                info!(submission = id, app = %validated.name, "validation succeeded");
                self.state = SessionState::Validated;
                self.validated = Some(validated);
                Completion::Validated(summary)
            }
            Err(error) => {
                let retryable = error.is_retryable();
                warn!(submission = id, %error, retryable, "validation failed");
                self.state = SessionState::ValidationFailed { error };
                Completion::Failed { retryable }
            }
        }
    }

    /// Submit the current model and wait for the result, bounded by the
    /// session timeout.
    pub async fn submit<G>(&mut self, gateway: &G, commit_sha: &str) -> Result<Completion, SessionError>
    where
        G: ValidationGateway + ?Sized,
    {
        let submission = self.begin_submission(commit_sha)?;
        let call = gateway.validate(&submission.request, submission.cancel_signal());
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.timeout).into()),
        };
        Ok(self.complete(submission.id, result))
    }

    /// Cancel the in-flight submission, if any, and return to `Draft`.
    pub fn cancel(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            debug!(submission = flight.id, "submission cancelled");
            let _ = flight.cancel.send(true);
            self.state = SessionState::Draft;
        }
    }

    /// Hand off the specification the authority returned. `Validated` only.
    pub fn apply(&mut self) -> Result<AppSpecification, SessionError> {
        if !matches!(self.state, SessionState::Validated) {
            return Err(self.invalid("apply"));
        }
        let Some(spec) = self.validated.take() else {
            return Err(self.invalid("apply"));
        };
        self.state = SessionState::Applied;
        info!(app = %spec.name, "validated app applied");
        Ok(spec)
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state.label(),
        }
    }
}
