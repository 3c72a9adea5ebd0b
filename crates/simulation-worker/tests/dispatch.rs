// Scenario-level dispatch tests against the built-in registry plus a
// deliberately failing plugin

use futures::{stream, StreamExt};
use simulation_core::{Event, EventStream, Params, PluginRegistry, ScenarioError, ScenarioPlugin};
use simulation_worker::plugins::register_builtins;
use simulation_worker::{DispatchOutcome, Dispatcher, MessageHandler, WorkerMetrics};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Emits one event, then fails
struct ExplodingPlugin;

impl ScenarioPlugin for ExplodingPlugin {
    fn start(&self, _params: Params) -> simulation_core::Result<EventStream> {
        let events = vec![
            Ok(Event::now(0.0)),
            Err(ScenarioError::Execution("target vanished".to_string())),
        ];
        Ok(stream::iter(events).boxed())
    }
}

struct PanickingPlugin;

fn scenario_bug() -> simulation_core::Result<Event> {
    panic!("scenario bug")
}

impl ScenarioPlugin for PanickingPlugin {
    fn start(&self, _params: Params) -> simulation_core::Result<EventStream> {
        Ok(stream::once(async { scenario_bug() }).boxed())
    }
}

static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

struct CountingPlugin;

impl ScenarioPlugin for CountingPlugin {
    fn start(&self, _params: Params) -> simulation_core::Result<EventStream> {
        Ok(stream::empty().boxed())
    }
}

fn setup() -> (Dispatcher, Arc<WorkerMetrics>) {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry);
    registry.register("explode", || Box::new(ExplodingPlugin));
    registry.register("panic", || Box::new(PanickingPlugin));
    registry.register("counting", || {
        CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingPlugin)
    });

    let metrics = Arc::new(WorkerMetrics::new().unwrap());
    (Dispatcher::new(Arc::new(registry), metrics.clone()), metrics)
}

#[tokio::test(start_paused = true)]
async fn test_noop_dispatch_records_duration() {
    let (dispatcher, metrics) = setup();

    let outcome = dispatcher
        .dispatch(br#"{"template_type": "noop", "params": {}}"#)
        .await;

    assert_eq!(
        outcome,
        DispatchOutcome::Completed {
            plugin: "noop".to_string(),
            events: 3
        }
    );
    assert_eq!(metrics.duration_count("noop"), 1);
    assert_eq!(metrics.error_count("noop"), 0);
}

#[tokio::test]
async fn test_unknown_plugin_records_nothing() {
    let (dispatcher, metrics) = setup();

    let outcome = dispatcher.dispatch(br#"{"template_type": "bogus"}"#).await;

    assert_eq!(
        outcome,
        DispatchOutcome::UnknownPlugin {
            plugin: "bogus".to_string()
        }
    );
    assert_eq!(metrics.duration_count("bogus"), 0);
    assert_eq!(metrics.error_count("bogus"), 0);
}

#[tokio::test]
async fn test_non_string_template_type_is_unknown() {
    let (dispatcher, metrics) = setup();

    for (body, label) in [
        (&br#"{"template_type": 7}"#[..], "7"),
        (&br#"{"template_type": null}"#[..], "null"),
        (&br#"{"template_type": ["noop"]}"#[..], "[\"noop\"]"),
    ] {
        assert_eq!(
            dispatcher.dispatch(body).await,
            DispatchOutcome::UnknownPlugin {
                plugin: label.to_string()
            }
        );
    }

    let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
    assert!(!text.contains("simulation_duration_seconds_count"));
    assert!(!text.contains("simulation_errors_total{"));
}

#[tokio::test]
async fn test_null_params_fails_the_run() {
    let (dispatcher, metrics) = setup();

    let outcome = dispatcher
        .dispatch(br#"{"template_type": "noop", "params": null}"#)
        .await;

    assert_eq!(
        outcome,
        DispatchOutcome::Failed {
            plugin: "noop".to_string()
        }
    );
    assert_eq!(metrics.error_count("noop"), 1);
    assert_eq!(metrics.duration_count("noop"), 0);
}

#[tokio::test]
async fn test_malformed_bodies_record_nothing() {
    let (dispatcher, metrics) = setup();
    let bodies: [&[u8]; 5] = [
        b"",
        b"{not json",
        b"[\"noop\"]",
        b"\"noop\"",
        &[0xff, 0xfe, 0x00],
    ];

    for body in bodies {
        assert_eq!(dispatcher.dispatch(body).await, DispatchOutcome::Malformed);
    }

    let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
    assert!(!text.contains("simulation_duration_seconds_count"));
    assert!(!text.contains("simulation_errors_total{"));
}

#[tokio::test]
async fn test_failing_plugin_counts_one_error() {
    let (dispatcher, metrics) = setup();

    let outcome = dispatcher.dispatch(br#"{"template_type": "explode"}"#).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Failed {
            plugin: "explode".to_string()
        }
    );
    assert_eq!(metrics.error_count("explode"), 1);
    assert_eq!(metrics.duration_count("explode"), 0);

    dispatcher.dispatch(br#"{"template_type": "explode"}"#).await;
    assert_eq!(metrics.error_count("explode"), 2);
    assert_eq!(metrics.duration_count("explode"), 0);
}

#[tokio::test]
async fn test_panicking_plugin_is_a_failure() {
    let (dispatcher, metrics) = setup();

    let outcome = dispatcher.dispatch(br#"{"template_type": "panic"}"#).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Failed {
            plugin: "panic".to_string()
        }
    );
    assert_eq!(metrics.error_count("panic"), 1);

    // The dispatcher is still usable afterwards
    let outcome = dispatcher.dispatch(br#"{"template_type": "counting"}"#).await;
    assert!(matches!(outcome, DispatchOutcome::Completed { events: 0, .. }));
}

#[tokio::test]
async fn test_fresh_instance_per_message() {
    let (dispatcher, _metrics) = setup();

    let before = CONSTRUCTED.load(Ordering::SeqCst);
    dispatcher.handle(br#"{"template_type": "counting"}"#).await;
    dispatcher.handle(br#"{"template_type": "counting"}"#).await;

    assert!(CONSTRUCTED.load(Ordering::SeqCst) >= before + 2);
}

#[tokio::test]
async fn test_metrics_are_labelled_per_plugin() {
    let (dispatcher, metrics) = setup();

    dispatcher.dispatch(br#"{"template_type": "counting"}"#).await;
    dispatcher.dispatch(br#"{"template_type": "explode"}"#).await;

    assert_eq!(metrics.duration_count("counting"), 1);
    assert_eq!(metrics.error_count("counting"), 0);
    assert_eq!(metrics.duration_count("explode"), 0);
    assert_eq!(metrics.error_count("explode"), 1);
}
