use clap::Parser;
use simulation_worker::{plugins, Args, LogFormat, Settings, Worker};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::resolve(args)?;

    init_tracing(settings.log_format);

    let registry = plugins::builtin_registry();
    tracing::info!("Registered scenarios: {:?}", registry.names());

    let worker = Worker::new(settings, registry)?;

    tokio::select! {
        result = worker.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    Ok(())
}
