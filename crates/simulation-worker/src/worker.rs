use crate::broker::{self, BrokerClient};
use crate::config::Settings;
use crate::dispatcher::Dispatcher;
use crate::health;
use crate::metrics::WorkerMetrics;
use simulation_core::PluginRegistry;
use std::sync::Arc;
use tracing::{error, info};

/// Worker process: the health server plus the broker consume loop
pub struct Worker {
    settings: Arc<Settings>,
    metrics: Arc<WorkerMetrics>,
    dispatcher: Dispatcher,
    broker: BrokerClient,
}

impl Worker {
    pub fn new(settings: Settings, registry: PluginRegistry) -> anyhow::Result<Self> {
        let metrics = Arc::new(WorkerMetrics::new()?);
        let dispatcher = Dispatcher::new(Arc::new(registry), metrics.clone());

        let broker = BrokerClient::new(settings.broker_url.clone(), settings.generate_worker_id())
            .with_reconnect_delay(settings.reconnect_delay())
            .with_prefetch(settings.prefetch_count);

        Ok(Worker {
            settings: Arc::new(settings),
            metrics,
            dispatcher,
            broker,
        })
    }

    /// Start the health server and consume messages until the process ends
    ///
    /// The health server runs detached; its failure is logged and does not
    /// affect consumption. Transport failures drop the broker connection and
    /// the worker subscribes again after the configured delay.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let health_settings = self.settings.clone();
        let health_metrics = self.metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(&health_settings, health_metrics).await {
                error!("Health server stopped: {}", e);
            }
        });

        info!("Starting worker on queue {}", self.settings.queue);

        match broker::consume_forever(
            &mut self.broker,
            &self.settings.queue,
            &self.dispatcher,
            self.settings.reconnect_delay(),
        )
        .await
        {}
    }
}
