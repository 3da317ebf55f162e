//! S3: middleware executes in registration order and can hand state forward through `Context`
//! into the callback; a short-circuiting step removes the handler from this record's dispatch
//! without aborting sibling handlers.

mod support;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use streamrouter::{
    Context, HandlerCallback, HandlerOptions, HandlerRegistry, Middleware, MiddlewareError, MiddlewareOutcome, Predicate,
    Record, StreamRouter,
};
use support::insert_wire;

struct Appender(&'static str);

#[async_trait]
impl Middleware for Appender {
    async fn handle(&self, _record: &Record, ctx: &mut Context) -> Result<MiddlewareOutcome, MiddlewareError> {
        let mut executed: Vec<String> = ctx
            .get("executed")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        executed.push(self.0.to_string());
        ctx.set("executed", serde_json::json!(executed));
        Ok(MiddlewareOutcome::Continue)
    }
}

struct Blocker;

#[async_trait]
impl Middleware for Blocker {
    async fn handle(&self, _record: &Record, _ctx: &mut Context) -> Result<MiddlewareOutcome, MiddlewareError> {
        Ok(MiddlewareOutcome::ShortCircuit)
    }
}

struct CapturingCallback(Arc<Mutex<Option<Vec<String>>>>);

#[async_trait]
impl streamrouter::Callback for CapturingCallback {
    async fn call(
        &self,
        _view: streamrouter::ImageView,
        _record: &Record,
        ctx: &mut Context,
    ) -> Result<(), streamrouter::CallbackError> {
        let executed: Vec<String> = ctx
            .get("executed")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        *self.0.lock().unwrap() = Some(executed);
        Ok(())
    }
}

#[tokio::test]
async fn s3_middleware_runs_in_registration_order_and_context_carries_forward() {
    let mut registry = HandlerRegistry::new();
    let captured = Arc::new(Mutex::new(None));
    let cb = HandlerCallback::Single(Arc::new(CapturingCallback(captured.clone())));
    registry
        .on_insert(
            Predicate::type_guard(|_| Ok(true)),
            cb,
            HandlerOptions::new().use_middleware(vec![Arc::new(Appender("m1")), Arc::new(Appender("m2")), Arc::new(Appender("m3"))]),
        )
        .unwrap();
    let router = StreamRouter::new(registry.freeze());

    router.process_batch(vec![insert_wire("e1", "A", "x")]).await;
    assert_eq!(
        captured.lock().unwrap().clone(),
        Some(vec!["m1".to_string(), "m2".to_string(), "m3".to_string()])
    );
}

#[tokio::test]
async fn short_circuiting_middleware_skips_only_that_handler() {
    let mut registry = HandlerRegistry::new();

    let blocked_cb = HandlerCallback::Single(Arc::new(support::CountingCallback(Arc::new(Mutex::new(0)))));
    registry
        .on_insert(
            Predicate::type_guard(|_| Ok(true)),
            blocked_cb,
            HandlerOptions::new().use_middleware(vec![Arc::new(Blocker)]),
        )
        .unwrap();

    let sibling_count = Arc::new(Mutex::new(0));
    let sibling_cb = HandlerCallback::Single(Arc::new(support::CountingCallback(sibling_count.clone())));
    registry.on_insert(Predicate::type_guard(|_| Ok(true)), sibling_cb, HandlerOptions::new()).unwrap();

    let router = StreamRouter::new(registry.freeze());
    let report = router.process_batch(vec![insert_wire("e1", "A", "x")]).await;

    assert!(report.reports.is_empty());
    assert_eq!(*sibling_count.lock().unwrap(), 1);
}
