use futures::stream::{self, StreamExt};
use simulation_core::{Event, EventStream, Params, Result, ScenarioPlugin};
use std::time::Duration;

const STEPS: u32 = 3;
const PAUSE: Duration = Duration::from_millis(100);

/// Smoke-test scenario: three evenly spaced progress events, no side effects
#[derive(Debug, Default)]
pub struct NoopPlugin;

impl NoopPlugin {
    pub const NAME: &'static str = "noop";
}

impl ScenarioPlugin for NoopPlugin {
    fn start(&self, _params: Params) -> Result<EventStream> {
        let events = stream::unfold(0u32, |step| async move {
            // The pause follows each event, so it runs when the next one is pulled.
            if step > 0 {
                tokio::time::sleep(PAUSE).await;
            }
            if step >= STEPS {
                return None;
            }
            let progress = f64::from(step) / f64::from(STEPS);
            Some((Ok(Event::now(progress)), step + 1))
        });

        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_noop_yields_three_events() {
        let events: Vec<Event> = NoopPlugin
            .start(Params::new())
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        let progress: Vec<f64> = events.iter().map(|e| e.progress).collect();
        assert_eq!(progress, vec![0.0, 1.0 / 3.0, 2.0 / 3.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noop_ignores_params() {
        let mut params = Params::new();
        params.insert("anything".to_string(), serde_json::json!({"nested": true}));

        let count = NoopPlugin.start(params).unwrap().count().await;
        assert_eq!(count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_start_is_fresh() {
        let plugin = NoopPlugin;
        let first = plugin.start(Params::new()).unwrap().count().await;
        let second = plugin.start(Params::new()).unwrap().count().await;
        assert_eq!(first, 3);
        assert_eq!(second, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noop_is_lazy() {
        let started = tokio::time::Instant::now();
        let mut events = NoopPlugin.start(Params::new()).unwrap();

        let first = events.next().await.unwrap().unwrap();
        assert_eq!(first.progress, 0.0);
        assert_eq!(started.elapsed(), Duration::ZERO);

        events.next().await.unwrap().unwrap();
        assert!(started.elapsed() >= PAUSE);
    }
}
