//! Integration tests for the async-lambda runtime.

use async_lambda::database::{DatabaseConfig, PoolConnector, Session, SessionPool};
use async_lambda::errors::{
    ErrorCategory, ErrorSeverity, PartialProcessingRecovery, ProcessingState, RecoveryStrategies,
};
use async_lambda::inject::DatabaseInjector;
use async_lambda::prelude::*;
use async_lambda::secrets::{SecretsBackend, StaticSecretsBackend};
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

type EventLog = Arc<Mutex<Vec<String>>>;

fn push(log: &EventLog, event: &str) {
    log.lock().push(event.to_string());
}

/// Session that records what happens to it.
struct MockSession {
    log: EventLog,
}

#[async_trait]
impl Session for MockSession {
    async fn rollback(&mut self) -> Result<(), LambdaError> {
        push(&self.log, "session.rollback");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LambdaError> {
        push(&self.log, "session.close");
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct MockPool {
    log: EventLog,
}

#[async_trait]
impl SessionPool for MockPool {
    async fn acquire(&self) -> Result<Box<dyn Session>, LambdaError> {
        push(&self.log, "pool.acquire");
        Ok(Box::new(MockSession {
            log: Arc::clone(&self.log),
        }))
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn dispose(&self) {
        push(&self.log, "pool.dispose");
    }
}

struct MockConnector {
    log: EventLog,
}

#[async_trait]
impl PoolConnector for MockConnector {
    async fn connect(&self, _config: &DatabaseConfig) -> Result<Arc<dyn SessionPool>, LambdaError> {
        push(&self.log, "pool.connect");
        Ok(Arc::new(MockPool {
            log: Arc::clone(&self.log),
        }))
    }
}

fn mock_database(log: &EventLog) -> Database {
    Database::new(
        DatabaseConfig::new().url("postgres://localhost/test"),
        Arc::new(MockConnector {
            log: Arc::clone(log),
        }),
    )
}

fn count(log: &EventLog, event: &str) -> usize {
    log.lock().iter().filter(|e| e.as_str() == event).count()
}

// Handlers generated by the macro

#[lambda_handler(name = "hello")]
async fn hello(_event: Value, _context: LambdaContext) -> anyhow::Result<Value> {
    Ok(json!({ "statusCode": 200, "body": "Hello" }))
}

#[lambda_handler]
async fn rejects_input(_event: Value, _context: LambdaContext) -> anyhow::Result<Value> {
    Err(Fault::invalid_input("bad input").into())
}

#[lambda_handler(name = "orders")]
async fn orders(
    event: Value,
    _context: LambdaContext,
    db_session: DbSession,
    settings: Arc<BaseSettings>,
) -> anyhow::Result<Value> {
    let mock = db_session.with(|_: &mut MockSession| true).await?;
    Ok(json!({
        "order": event["order"],
        "stage": settings.get("stage"),
        "mock_session": mock,
    }))
}

#[test]
fn test_macro_handler_metadata() {
    let hello = HelloHandler::new();
    assert_eq!(hello.name(), "hello");
    assert!(hello.requirements().is_empty());

    assert_eq!(RejectsInputHandler::new().name(), "rejects_input");

    let orders = OrdersHandler::new();
    assert!(orders.requirements().needs_db_session());
    assert!(orders.requirements().needs_settings());
}

#[test]
fn test_response_returned_verbatim() {
    let app = LambdaApp::for_testing();
    let handler = assert_ok!(app.handler(HelloHandler::new()));

    let response = assert_ok!(handler.invoke(json!({}), LambdaContext::new("hello", "req-1")));
    assert_eq!(response, json!({ "statusCode": 200, "body": "Hello" }));
}

#[test]
fn test_handler_fault_propagates_after_cleanup() {
    let app = LambdaApp::for_testing();
    let cleanups = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&cleanups);
    app.lifecycle().register_cleanup(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    // a panicking callback does not replace the handler's fault
    app.lifecycle().register_cleanup(|| panic!("cleanup failed"));

    let handler = assert_ok!(app.handler(RejectsInputHandler::new()));
    let err = assert_err!(handler.invoke(Value::Null, LambdaContext::default()));

    let fault = err.downcast_ref::<Fault>().unwrap();
    assert_eq!(fault.kind(), FaultKind::InvalidInput);
    assert_eq!(fault.message(), "bad input");
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_invocations_are_isolated() {
    struct DropFlag(Arc<AtomicUsize>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let app = LambdaApp::for_testing();
    let dropped = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&dropped);

    let handler = handler_fn(move |_event, _context, _deps| {
        let dropped = Arc::clone(&seen);
        async move {
            let before = dropped.load(Ordering::SeqCst);
            let flag = DropFlag(Arc::clone(&dropped));
            tokio::spawn(async move {
                let _flag = flag;
                std::future::pending::<()>().await;
            });
            Ok::<_, anyhow::Error>(json!(before))
        }
    });
    let handler = assert_ok!(app.handler(handler));

    let first = assert_ok!(handler.invoke(Value::Null, LambdaContext::default()));
    assert_eq!(first, json!(0));
    assert_eq!(dropped.load(Ordering::SeqCst), 1);

    // the task left behind by the first call is gone before the second starts
    let second = assert_ok!(handler.invoke(Value::Null, LambdaContext::default()));
    assert_eq!(second, json!(1));
    assert_eq!(dropped.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unsatisfied_capability_fails_at_wrap_time() {
    let log = EventLog::default();
    let app = LambdaApp::for_testing().database(mock_database(&log));

    let err = app.handler(OrdersHandler::new()).unwrap_err();
    assert!(matches!(
        err,
        LambdaError::UnsatisfiedCapability {
            capability: "db_session",
            ..
        }
    ));

    let err = app
        .handler(app.with_database(OrdersHandler::new()).unwrap())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Handler 'orders' declares 'settings' but no injector supplies it"
    );
    assert!(log.lock().is_empty());
}

#[test]
fn test_stacked_injectors_release_order() {
    let log = EventLog::default();
    let app = LambdaApp::for_testing().database(mock_database(&log));
    app.settings_cache()
        .insert(BaseSettings::from_pairs([("STAGE", "prod")]));
    let callback_log = Arc::clone(&log);
    app.lifecycle()
        .register_cleanup(move || push(&callback_log, "lifecycle.callback"));

    let handler_log = Arc::clone(&log);
    let handler = handler_fn(move |_event, _context, deps: Dependencies| {
        let log = Arc::clone(&handler_log);
        async move {
            let _session = deps.db_session()?;
            let settings = deps.settings::<BaseSettings>()?;
            push(&log, "handler.settings");
            Ok::<_, anyhow::Error>(json!({ "stage": settings.get("stage") }))
        }
    })
    .requires(Requirements::new().with_db_session(true).with_settings(true));

    // data-store outer, configuration inner
    let wrapped = assert_ok!(app.with_database(app.with_config(handler)));
    let adapter = assert_ok!(app.handler(wrapped));

    let response = assert_ok!(adapter.invoke(Value::Null, LambdaContext::default()));
    assert_eq!(response, json!({ "stage": "prod" }));
    assert_eq!(
        *log.lock(),
        vec![
            "pool.connect",
            "pool.acquire",
            "handler.settings",
            "session.close",
            "pool.dispose",
            "lifecycle.callback",
        ]
    );

    // the pool is rebuilt on the next invocation's runtime
    assert_ok!(adapter.invoke(Value::Null, LambdaContext::default()));
    assert_eq!(count(&log, "pool.connect"), 2);
    assert_eq!(count(&log, "pool.dispose"), 2);
}

#[test]
fn test_macro_handler_receives_both_capabilities() {
    let log = EventLog::default();
    let app = LambdaApp::for_testing().database(mock_database(&log));
    app.settings_cache()
        .insert(BaseSettings::from_pairs([("STAGE", "dev")]));

    // configuration outer, data-store inner
    let wrapped = app.with_config(assert_ok!(app.with_database(OrdersHandler::new())));
    let adapter = assert_ok!(app.handler(wrapped));

    let response = assert_ok!(adapter.invoke(json!({ "order": 42 }), LambdaContext::default()));
    assert_eq!(
        response,
        json!({ "order": 42, "stage": "dev", "mock_session": true })
    );
    assert_eq!(count(&log, "session.close"), 1);
    assert_eq!(count(&log, "session.rollback"), 0);
}

#[test]
fn test_rollback_before_close_on_failure() {
    let log = EventLog::default();
    let app = LambdaApp::for_testing().database(mock_database(&log));

    let handler = handler_fn(|_event, _context, deps: Dependencies| async move {
        deps.db_session()?;
        Err::<Value, _>(anyhow::anyhow!("insert failed"))
    })
    .requires(Requirements::new().with_db_session(true));
    let adapter = assert_ok!(app.handler(assert_ok!(app.with_database(handler))));

    let err = assert_err!(adapter.invoke(Value::Null, LambdaContext::default()));
    assert_eq!(err.to_string(), "insert failed");
    assert_eq!(
        *log.lock(),
        vec![
            "pool.connect",
            "pool.acquire",
            "session.rollback",
            "session.close",
            "pool.dispose",
        ]
    );
}

#[test]
fn test_no_pool_without_db_session() {
    let log = EventLog::default();
    let app = LambdaApp::for_testing().database(mock_database(&log));

    let adapter = assert_ok!(app.handler(assert_ok!(app.with_database(HelloHandler::new()))));
    assert_ok!(adapter.invoke(Value::Null, LambdaContext::default()));
    assert!(log.lock().is_empty());
}

#[test]
fn test_factory_sessions_close_in_all_outcomes() {
    let log = EventLog::default();
    let app = LambdaApp::for_testing();
    let factory_log = Arc::clone(&log);
    let injector = DatabaseInjector::with_factory(move || {
        let log = Arc::clone(&factory_log);
        async move {
            push(&log, "factory.create");
            Ok::<Box<dyn Session>, LambdaError>(Box::new(MockSession { log }))
        }
    });

    let ok = handler_fn(|_event, _context, _deps| async move {
        Ok::<_, anyhow::Error>(json!(1))
    })
    .requires(Requirements::new().with_db_session(true));
    let failing = handler_fn(|_event, _context, _deps| async move {
        Err::<Value, _>(anyhow::anyhow!("boom"))
    })
    .requires(Requirements::new().with_db_session(true));

    let ok = assert_ok!(app.handler(injector.wrap(ok)));
    let failing = assert_ok!(app.handler(injector.wrap(failing)));
    assert_ok!(ok.invoke(Value::Null, LambdaContext::default()));
    assert_err!(failing.invoke(Value::Null, LambdaContext::default()));

    assert_eq!(
        *log.lock(),
        vec![
            "factory.create",
            "session.close",
            "factory.create",
            "session.close",
        ]
    );
}

#[test]
fn test_router_dispatches_by_function_id() {
    let app = LambdaApp::for_testing();
    let router = Router::new();
    assert_ok!(router.register("hello", assert_ok!(app.handler(HelloHandler::new()))));

    let context = LambdaContext::new("router", "req-9").with_env("LAMBDA_FUNCTION_ID", "hello");
    let response = assert_ok!(router.invoke(Value::Null, context));
    assert_eq!(response["body"], "Hello");

    let context = LambdaContext::default().with_env("LAMBDA_FUNCTION_ID", "missing");
    let err = assert_err!(router.invoke(Value::Null, context));
    assert!(matches!(
        err.downcast_ref::<LambdaError>(),
        Some(LambdaError::FunctionNotFound(_))
    ));
}

#[test]
fn test_classifier_validation_record() {
    let handler = ErrorHandler::default();
    let error: anyhow::Error = Fault::invalid_input("bad input").into();

    let record = handler.classify_error(&error, None);
    assert_eq!(record.category, ErrorCategory::Validation);
    assert_eq!(record.severity, ErrorSeverity::Medium);
    assert!(record.is_recoverable);
    assert_eq!(record.retry_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_driver_exhausts_budget() {
    let handler = ErrorHandler::new(3, Duration::from_millis(100));
    let attempts = AtomicUsize::new(0);
    let error: anyhow::Error = Fault::invalid_input("bad input").into();

    let record = handler
        .handle_error_with_retry(&error, None, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("still failing")) }
        })
        .await;

    assert_eq!(record.retry_count(), 3);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(record.category, ErrorCategory::Validation);
    assert_eq!(handler.summary().total_errors, 1);
}

#[tokio::test]
async fn test_partial_processing_recovery() {
    let recovery = PartialProcessingRecovery::new(100);
    assert!(recovery.should_checkpoint(100));
    assert!(!recovery.should_checkpoint(150));

    let state: ProcessingState =
        assert_ok!(serde_json::from_value(json!({ "last_checkpoint": { "row_number": 500 } })));
    assert_eq!(recovery.recovery_point(Some(&state)), 500);
    assert_eq!(recovery.recovery_point(None), 0);

    let handler = ErrorHandler::default();
    let record = handler.handle_error(&anyhow::anyhow!("unparseable row"), None);
    let result = RecoveryStrategies::skip_row(record, &json!({ "id": 3 }), 3).await;
    assert!(result.is_success());
    assert_eq!(result.skipped_count(), 1);
}

#[tokio::test]
async fn test_static_secrets() {
    let secrets = StaticSecretsBackend::new().with_secret("app/db", r#"{"url": "postgres://x"}"#);
    assert_eq!(secrets.get_secret("app/db", Some("url")).await, "postgres://x");
    assert_eq!(secrets.get_secret("", None).await, "");
}
