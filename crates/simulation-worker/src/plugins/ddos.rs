use futures::stream::{self, StreamExt};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use simulation_core::{Event, EventStream, Params, Result, ScenarioError, ScenarioPlugin};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Load-generation scenario: repeated HTTP GETs against a target for a
/// fixed duration at a fixed rate
#[derive(Debug, Default)]
pub struct DdosPlugin;

impl DdosPlugin {
    pub const NAME: &'static str = "ddos";
}

#[derive(Debug, Deserialize)]
struct DdosParams {
    // Any JSON value is accepted and formatted into the URL; only absence fails.
    #[serde(deserialize_with = "required")]
    target_ip: Value,
    #[serde(default = "default_duration")]
    duration: f64,
    #[serde(default = "default_rate")]
    rate: f64,
}

fn required<'de, D>(deserializer: D) -> std::result::Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer)
}

fn target_url(target: &Value) -> String {
    match target {
        Value::String(host) => format!("http://{}", host),
        other => format!("http://{}", other),
    }
}

fn default_duration() -> f64 {
    10.0
}

fn default_rate() -> f64 {
    1.0
}

/// Progress after `sent` attempts. Not clamped: it passes 1.0 when more
/// attempts fit into the window than `duration * rate`.
pub(crate) fn progress(sent: u64, duration: f64, rate: f64) -> f64 {
    sent as f64 / (duration * rate)
}

/// Pause between attempts, `max(1 / rate, 0)`
pub(crate) fn pause(rate: f64) -> Duration {
    Duration::try_from_secs_f64((1.0 / rate).max(0.0)).unwrap_or(Duration::MAX)
}

struct Attack {
    client: reqwest::Client,
    url: String,
    deadline: Instant,
    duration: f64,
    rate: f64,
    pause: Duration,
    sent: u64,
}

impl ScenarioPlugin for DdosPlugin {
    fn start(&self, params: Params) -> Result<EventStream> {
        let params: DdosParams = serde_json::from_value(Value::Object(params))?;

        if params.rate == 0.0 {
            return Err(ScenarioError::InvalidParams("rate must be non-zero".to_string()));
        }
        if params.duration <= 0.0 {
            return Ok(stream::empty().boxed());
        }

        let window = Duration::try_from_secs_f64(params.duration).map_err(|e| {
            ScenarioError::InvalidParams(format!("duration {}: {}", params.duration, e))
        })?;
        let deadline = Instant::now()
            .checked_add(window)
            .ok_or_else(|| ScenarioError::InvalidParams("duration out of range".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScenarioError::Execution(format!("HTTP client: {}", e)))?;

        let attack = Attack {
            client,
            url: target_url(&params.target_ip),
            deadline,
            duration: params.duration,
            rate: params.rate,
            pause: pause(params.rate),
            sent: 0,
        };

        let events = stream::unfold(attack, |mut attack| async move {
            if attack.sent > 0 {
                tokio::time::sleep(attack.pause).await;
            }
            if Instant::now() >= attack.deadline {
                return None;
            }

            // Failed requests are ignored on purpose; the attempt still counts.
            if let Err(e) = attack.client.get(&attack.url).send().await {
                debug!("Request to {} failed: {}", attack.url, e);
            }
            attack.sent += 1;

            let event = Event::now(progress(attack.sent, attack.duration, attack.rate));
            Some((Ok(event), attack))
        });

        Ok(events.boxed())
    }
}
