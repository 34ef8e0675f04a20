//! Editing session state machine against in-process gateways.

use std::time::Duration;

use appspec_core::{AppSpecification, SemanticError, canonicalize, parse_document};
use appspec_form::FieldLocks;
use appspec_gateway::gateway::cancelled;
use appspec_gateway::{
    Completion, EditingSession, GatewayError, GatewayFuture, SessionError, SessionState, ValidateError,
    ValidationError, ValidationGateway, ValidationRequest, ValidationTarget,
};
use tokio::sync::watch;

const FIXTURE: &[u8] = include_bytes!("../../appspec-core/tests/fixtures/js-test-app.yaml");

fn open(timeout: Duration) -> EditingSession {
    let raw = parse_document(FIXTURE).unwrap();
    let locks = FieldLocks::declared_in(&raw);
    let spec = canonicalize(&raw).unwrap();
    let target = ValidationTarget {
        project_id: 11,
        deployment_target_id: "dt-1".into(),
    };
    EditingSession::new(target, &spec, &locks, timeout)
}

fn amended(app: &AppSpecification, marker: &str) -> AppSpecification {
    let mut app = app.clone();
    app.env.insert("VALIDATED_BY".into(), marker.into());
    app
}

/// Accepts every submission and stamps an env var.
struct Amending;

impl ValidationGateway for Amending {
    fn validate<'a>(&'a self, request: &'a ValidationRequest, _cancel: watch::Receiver<bool>) -> GatewayFuture<'a> {
        Box::pin(async move { Ok::<_, ValidateError>(amended(&request.app, "remote")) })
    }
}

/// Never answers; resolves only when cancelled.
struct Stalled;

impl ValidationGateway for Stalled {
    fn validate<'a>(&'a self, _request: &'a ValidationRequest, cancel: watch::Receiver<bool>) -> GatewayFuture<'a> {
        Box::pin(async move {
            cancelled(cancel).await;
            Err(ValidateError::from(GatewayError::Cancelled))
        })
    }
}

struct Rejecting;

impl ValidationGateway for Rejecting {
    fn validate<'a>(&'a self, _request: &'a ValidationRequest, _cancel: watch::Receiver<bool>) -> GatewayFuture<'a> {
        Box::pin(async move {
            Err(ValidateError::from(ValidationError {
                status: 400,
                message: "services.example-web: domain is already in use".into(),
            }))
        })
    }
}

#[tokio::test]
async fn successful_submission_merges_authoritative_result() {
    let mut session = open(Duration::from_secs(5));
    session
        .edit()
        .unwrap()
        .service_mut("example-web")
        .unwrap()
        .instances
        .set(3)
        .unwrap();

    let completion = session.submit(&Amending, "abc123").await.unwrap();
    assert!(matches!(completion, Completion::Validated(_)));
    assert!(matches!(session.state(), SessionState::Validated));

    let model = session.model();
    assert_eq!(model.env["VALIDATED_BY"].value(), "remote");
    assert!(model.env["VALIDATED_BY"].is_source_locked());
    let web = model.service("example-web").unwrap();
    assert_eq!(*web.instances.value(), 3);
    assert!(!web.instances.is_source_locked());

    let applied = session.apply().unwrap();
    assert_eq!(applied.env["VALIDATED_BY"], "remote");
    assert!(matches!(session.state(), SessionState::Applied));
    assert!(matches!(
        session.edit(),
        Err(SessionError::InvalidTransition {
            action: "edit",
            state: "applied"
        })
    ));
}

#[tokio::test]
async fn last_submission_wins() {
    let mut session = open(Duration::from_secs(5));
    let first = session.begin_submission("aaa").unwrap();
    let first_signal = first.cancel_signal();
    let second = session.begin_submission("bbb").unwrap();
    assert!(second.id > first.id);
    assert!(*first_signal.borrow(), "older submission must be cancelled");
    assert!(!*second.cancel_signal().borrow());

    let second_result = Ok(amended(&second.request.app, "second"));
    let first_result = Ok(amended(&first.request.app, "first"));

    assert!(matches!(
        session.complete(second.id, second_result),
        Completion::Validated(_)
    ));
    assert_eq!(session.complete(first.id, first_result), Completion::Discarded);
    assert_eq!(session.model().env["VALIDATED_BY"].value(), "second");
}

#[tokio::test]
async fn stale_result_arriving_first_is_discarded() {
    let mut session = open(Duration::from_secs(5));
    let first = session.begin_submission("aaa").unwrap();
    let pending = tokio::spawn(async move {
        let result = Stalled.validate(&first.request, first.cancel_signal()).await;
        (first.id, result)
    });

    let second = session.begin_submission("bbb").unwrap();
    let (first_id, first_result) = pending.await.unwrap();
    assert!(matches!(first_result, Err(ValidateError::Gateway(GatewayError::Cancelled))));
    assert_eq!(session.complete(first_id, first_result), Completion::Discarded);
    assert!(matches!(session.state(), SessionState::Validating { submission } if *submission == second.id));

    let failure = Err(ValidateError::from(GatewayError::Server {
        status: 502,
        message: "bad gateway".into(),
    }));
    assert_eq!(
        session.complete(second.id, failure),
        Completion::Failed { retryable: true }
    );
}

#[tokio::test]
async fn timeout_fails_retryably_and_keeps_the_model() {
    let mut session = open(Duration::from_millis(50));
    session.edit().unwrap().set_env("DEBUG", "1".into()).unwrap();
    let before = session.model().clone();

    let completion = session.submit(&Stalled, "abc123").await.unwrap();
    assert_eq!(completion, Completion::Failed { retryable: true });
    match session.state() {
        SessionState::ValidationFailed { error } => {
            assert!(matches!(error, ValidateError::Gateway(GatewayError::Timeout(_))));
            assert!(error.is_retryable());
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
    assert_eq!(session.model(), &before);

    // Retrying from ValidationFailed is allowed.
    let completion = session.submit(&Amending, "abc123").await.unwrap();
    assert!(matches!(completion, Completion::Validated(_)));
    assert_eq!(session.model().env["DEBUG"].value(), "1");
}

#[tokio::test]
async fn rejection_is_not_retryable() {
    let mut session = open(Duration::from_secs(5));
    let completion = session.submit(&Rejecting, "abc123").await.unwrap();
    assert_eq!(completion, Completion::Failed { retryable: false });
    assert!(session.apply().is_err());

    session.edit().unwrap();
    assert!(matches!(session.state(), SessionState::Draft));
}

#[test]
fn invalid_model_is_refused_before_submission() {
    let mut session = open(Duration::from_secs(5));
    session.edit().unwrap().add_service("broken", appspec_core::ServiceKind::Web).unwrap();
    session
        .edit()
        .unwrap()
        .service_mut("broken")
        .unwrap()
        .cpu_cores
        .set(-1.0)
        .unwrap();

    let err = session.begin_submission("abc123").unwrap_err();
    assert!(matches!(
        err,
        SessionError::Semantic(SemanticError::InvalidValue { ref path, .. }) if path == "services.broken.cpuCores"
    ));
    assert!(matches!(session.state(), SessionState::Draft));
}

#[test]
fn new_commit_reopens_a_validated_session() {
    let mut session = open(Duration::from_secs(5));
    let submission = session.begin_submission("abc123").unwrap();
    let validated = submission.request.app.clone();
    session.complete(submission.id, Ok(validated));
    assert!(matches!(session.state(), SessionState::Validated));

    let updated = String::from_utf8(FIXTURE.to_vec())
        .unwrap()
        .replace("port: 8080", "port: 3000");
    let raw = parse_document(updated.as_bytes()).unwrap();
    let spec = canonicalize(&raw).unwrap();
    session.refresh_source(&spec, &FieldLocks::declared_in(&raw)).unwrap();

    assert!(matches!(session.state(), SessionState::Draft));
    assert_eq!(*session.model().service("example-web").unwrap().port.value(), 3000);
}

#[test]
fn cancel_returns_to_draft_and_discards_the_result() {
    let mut session = open(Duration::from_secs(5));
    let submission = session.begin_submission("abc123").unwrap();
    let signal = submission.cancel_signal();
    session.cancel();
    assert!(*signal.borrow());
    assert!(matches!(session.state(), SessionState::Draft));

    let result = Ok(submission.request.app.clone());
    assert_eq!(session.complete(submission.id, result), Completion::Discarded);
}

#[test]
fn edits_made_while_validating_reopen_the_session() {
    let mut session = open(Duration::from_secs(5));
    let submission = session.begin_submission("abc123").unwrap();
    session
        .edit()
        .unwrap()
        .service_mut("example-web")
        .unwrap()
        .instances
        .set(99)
        .unwrap();
    assert!(matches!(session.state(), SessionState::Validating { .. }));

    let validated = submission.request.app.clone();
    let completion = session.complete(submission.id, Ok(validated));
    assert!(matches!(completion, Completion::Reopened(_)));
    assert!(matches!(session.state(), SessionState::Draft));
    assert_eq!(*session.model().service("example-web").unwrap().instances.value(), 99);
    assert!(matches!(
        session.apply(),
        Err(SessionError::InvalidTransition {
            action: "apply",
            state: "draft"
        })
    ));

    // Resubmitting the edited model lets it through.
    let submission = session.begin_submission("abc123").unwrap();
    let validated = submission.request.app.clone();
    assert!(matches!(
        session.complete(submission.id, Ok(validated.clone())),
        Completion::Validated(_)
    ));
    let applied = session.apply().unwrap();
    assert_eq!(applied, validated);
    assert_eq!(applied.services["example-web"].instances, 99);
}

#[test]
fn edits_overridden_by_the_authority_still_validate() {
    let mut session = open(Duration::from_secs(5));
    let submission = session.begin_submission("abc123").unwrap();
    session
        .edit()
        .unwrap()
        .service_mut("example-web")
        .unwrap()
        .instances
        .set(99)
        .unwrap();

    let mut validated = submission.request.app.clone();
    validated.services.get_mut("example-web").unwrap().instances = 2;
    assert!(matches!(
        session.complete(submission.id, Ok(validated.clone())),
        Completion::Validated(_)
    ));
    assert_eq!(session.apply().unwrap(), validated);
}
