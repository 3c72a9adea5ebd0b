use crate::broker::MessageHandler;
use crate::metrics::WorkerMetrics;
use async_trait::async_trait;
use futures::StreamExt;
use simulation_core::{Params, PluginRegistry, ScenarioError, ScenarioPlugin, ScenarioRequest};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Which path a dispatched message took
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The scenario ran to completion
    Completed { plugin: String, events: usize },
    /// The scenario failed while running
    Failed { plugin: String },
    /// The body could not be decoded
    Malformed,
    /// No plugin is registered under the requested name
    UnknownPlugin { plugin: String },
}

/// Turns one raw message into one scenario run plus metrics
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    metrics: Arc<WorkerMetrics>,
}

impl Dispatcher {
    pub fn new(registry: Arc<PluginRegistry>, metrics: Arc<WorkerMetrics>) -> Self {
        Dispatcher { registry, metrics }
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    /// Decode, look up and run the scenario named by `body`
    ///
    /// Decode and lookup failures record no metric. A successful run observes
    /// its duration; a failed run increments the error counter instead.
    pub async fn dispatch(&self, body: &[u8]) -> DispatchOutcome {
        info!("Received message: {}", String::from_utf8_lossy(body));

        let request = match ScenarioRequest::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                error!("Invalid message: {}", e);
                return DispatchOutcome::Malformed;
            }
        };
        let plugin_name = request.template_label();

        let factory = match request.plugin_name().and_then(|name| self.registry.lookup(name)) {
            Some(factory) => factory,
            None => {
                error!("Unknown plugin {}", plugin_name);
                return DispatchOutcome::UnknownPlugin {
                    plugin: plugin_name,
                };
            }
        };

        let plugin = factory();
        let started = Instant::now();

        match run_isolated(plugin, request.params(), plugin_name.clone()).await {
            Ok(events) => {
                let elapsed = started.elapsed().as_secs_f64();
                self.metrics.observe_duration(&plugin_name, elapsed);
                info!(
                    "Simulation {} completed: {} events in {:.3}s",
                    plugin_name, events, elapsed
                );
                DispatchOutcome::Completed {
                    plugin: plugin_name,
                    events,
                }
            }
            Err(e) => {
                error!(plugin = %plugin_name, error = ?e, "Simulation error: {}", e);
                self.metrics.inc_errors(&plugin_name);
                DispatchOutcome::Failed {
                    plugin: plugin_name,
                }
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, body: &[u8]) {
        self.dispatch(body).await;
    }
}

/// Drive the plugin on its own task so a panic becomes a failed run instead
/// of taking down the consume loop. The caller still waits for it, so runs
/// stay sequential.
async fn run_isolated(
    plugin: Box<dyn ScenarioPlugin>,
    params: simulation_core::Result<Params>,
    plugin_name: String,
) -> simulation_core::Result<usize> {
    let handle = tokio::spawn(async move { drive(plugin.as_ref(), params?, &plugin_name).await });

    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ScenarioError::Panicked(e.to_string())),
        Err(_) => Err(ScenarioError::Cancelled),
    }
}

async fn drive(
    plugin: &dyn ScenarioPlugin,
    params: Params,
    plugin_name: &str,
) -> simulation_core::Result<usize> {
    let mut events = plugin.start(params)?;
    let mut count = 0;

    while let Some(event) = events.next().await {
        let event = event?;
        info!(plugin = %plugin_name, "event: {}", event);
        count += 1;
    }

    Ok(count)
}
