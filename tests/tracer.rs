//! Integration tests for tracer events.
//!
//! These tests verify that events are emitted in order during calls.

use std::sync::Arc;

use autotrack::{
    Cache, Cell, EventCollector, ExecutionResult, FlowEvent, Memoize, MemoError, Value,
};

// ============================================================================
// Helper
// ============================================================================

/// Event shape without span ids and durations.
#[derive(Debug, PartialEq)]
enum Kind {
    ArgumentsCheck { changed: bool },
    TreeUpdated { dirtied: u64 },
    CacheCheck { valid: bool },
    ComputeStart,
    ComputeEnd { result: ExecutionResult },
    CycleDetected,
    CacheCleared,
}

fn to_kinds(events: &[FlowEvent]) -> Vec<Kind> {
    events
        .iter()
        .map(|event| match event {
            FlowEvent::ArgumentsCheck { changed, .. } => Kind::ArgumentsCheck { changed: *changed },
            FlowEvent::TreeUpdated { dirtied, .. } => Kind::TreeUpdated { dirtied: *dirtied },
            FlowEvent::CacheCheck { valid, .. } => Kind::CacheCheck { valid: *valid },
            FlowEvent::ComputeStart { .. } => Kind::ComputeStart,
            FlowEvent::ComputeEnd { result, .. } => Kind::ComputeEnd {
                result: result.clone(),
            },
            FlowEvent::CycleDetected { .. } => Kind::CycleDetected,
            FlowEvent::CacheCleared { .. } => Kind::CacheCleared,
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_call_events() {
    use Kind::*;

    let collector = Arc::new(EventCollector::new());
    let select_a = Memoize::builder()
        .label("select_a")
        .tracer(collector.clone())
        .build(|args| Ok(args[0].get("a").to_value()));

    let state = Value::record([("a", 1)]);
    select_a.call(&[state.clone()]).unwrap();
    assert_eq!(
        to_kinds(&collector.take()),
        vec![
            ArgumentsCheck { changed: true },
            TreeUpdated { dirtied: 0 },
            CacheCheck { valid: false },
            ComputeStart,
            ComputeEnd {
                result: ExecutionResult::Computed
            },
        ]
    );

    select_a.call(&[state]).unwrap();
    assert_eq!(
        to_kinds(&collector.take()),
        vec![ArgumentsCheck { changed: false }, CacheCheck { valid: true }]
    );

    select_a.call(&[Value::record([("a", 2)])]).unwrap();
    assert_eq!(
        to_kinds(&collector.take()),
        vec![
            ArgumentsCheck { changed: true },
            TreeUpdated { dirtied: 1 },
            CacheCheck { valid: false },
            ComputeStart,
            ComputeEnd {
                result: ExecutionResult::Computed
            },
        ]
    );
}

#[test]
fn test_unread_change_is_a_valid_check() {
    use Kind::*;

    let collector = Arc::new(EventCollector::new());
    let select_a = Memoize::builder()
        .tracer(collector.clone())
        .build(|args| Ok(args[0].get("a").to_value()));

    select_a.call(&[Value::record([("a", 1), ("b", 1)])]).unwrap();
    collector.clear();

    select_a.call(&[Value::record([("a", 1), ("b", 2)])]).unwrap();
    assert_eq!(
        to_kinds(&collector.take()),
        vec![
            ArgumentsCheck { changed: true },
            TreeUpdated { dirtied: 0 },
            CacheCheck { valid: true },
        ]
    );
}

#[test]
fn test_error_events() {
    use Kind::*;

    let collector = Arc::new(EventCollector::new());
    let failing = Memoize::builder()
        .tracer(collector.clone())
        .build(|_args| -> Result<(), MemoError> { Err(anyhow::anyhow!("nope").into()) });

    assert!(failing.call(&[]).is_err());
    assert_eq!(
        to_kinds(&collector.take()),
        vec![
            ArgumentsCheck { changed: true },
            TreeUpdated { dirtied: 0 },
            CacheCheck { valid: false },
            ComputeStart,
            ComputeEnd {
                result: ExecutionResult::Error {
                    message: "nope".to_string()
                }
            },
        ]
    );
}

#[test]
fn test_clear_event() {
    let collector = Arc::new(EventCollector::new());
    let memoized = Memoize::builder()
        .label("args")
        .tracer(collector.clone())
        .build(|args| Ok(args.len()));

    memoized.call(&[]).unwrap();
    collector.clear();
    memoized.clear_cache();

    let events = collector.take();
    assert_eq!(to_kinds(&events), vec![Kind::CacheCleared]);
    assert_eq!(events[0].cache().label, Some("args"));
    assert_eq!(events[0].cache().id, memoized.cache().id());
}

#[test]
fn test_cycle_events() {
    use Kind::*;

    let collector = Arc::new(EventCollector::new());
    let slot: std::rc::Rc<std::cell::RefCell<Option<Cache<i32>>>> = Default::default();
    let cache = Cache::builder().tracer(collector.clone()).build({
        let slot = slot.clone();
        move || match slot.borrow().clone() {
            Some(me) => me.value(),
            None => Ok(0),
        }
    });
    *slot.borrow_mut() = Some(cache.clone());

    assert!(cache.value().is_err());
    assert_eq!(
        to_kinds(&collector.take()),
        vec![
            CacheCheck { valid: false },
            ComputeStart,
            CycleDetected,
            ComputeEnd {
                result: ExecutionResult::CycleDetected
            },
        ]
    );
}

#[test]
fn test_spans_pair_up_across_nested_caches() {
    let collector = Arc::new(EventCollector::new());
    let cell = Cell::new(2);
    let inner = Cache::builder()
        .label("inner")
        .tracer(collector.clone())
        .build({
            let cell = cell.clone();
            move || Ok::<_, MemoError>(cell.read() * 2)
        });
    let outer = Cache::builder()
        .label("outer")
        .tracer(collector.clone())
        .build({
            let inner = inner.clone();
            move || Ok(inner.value()? + 1)
        });

    assert_eq!(outer.value().unwrap(), 5);

    let events = collector.take();
    let labels: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            FlowEvent::ComputeStart { cache, .. } => Some(("start", cache.label)),
            FlowEvent::ComputeEnd { cache, .. } => Some(("end", cache.label)),
            _ => None,
        })
        .collect();
    assert_eq!(
        labels,
        vec![
            ("start", Some("outer")),
            ("start", Some("inner")),
            ("end", Some("inner")),
            ("end", Some("outer")),
        ]
    );

    let starts: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            FlowEvent::ComputeStart { span_id, .. } => Some(*span_id),
            _ => None,
        })
        .collect();
    assert_ne!(starts[0], starts[1]);
}

#[cfg(feature = "tracing")]
#[test]
fn test_tracing_tracer_accepts_events() {
    let memoized = Memoize::builder()
        .tracer(autotrack::TracingTracer)
        .build(|args| Ok(args.len()));
    assert_eq!(memoized.call(&[Value::Null]).unwrap(), 1);
}
