pub mod broker;
pub mod config;
pub mod dispatcher;
pub mod health;
pub mod metrics;
pub mod plugins;
pub mod worker;

pub use broker::{consume_forever, Acknowledge, BrokerClient, BrokerError, MessageHandler, Subscriber};
pub use config::{Args, LogFormat, Settings};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use metrics::WorkerMetrics;
pub use worker::Worker;
