use crate::{Result, ScenarioError};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Scenario parameters, passed verbatim from the message to the plugin
pub type Params = Map<String, Value>;

/// Plugin used when a message does not name one
pub const DEFAULT_TEMPLATE_TYPE: &str = "noop";

/// Decoded body of a `simulations.start` message
///
/// Unknown fields are ignored. Both fields are kept as raw JSON: a
/// non-string `template_type` names no plugin, and a `params` that is present
/// but not an object is reported as a scenario failure rather than a
/// malformed message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioRequest {
    #[serde(default = "default_template_type")]
    pub template_type: Value,

    #[serde(default, deserialize_with = "present")]
    pub params: Option<Value>,
}

fn default_template_type() -> Value {
    Value::String(DEFAULT_TEMPLATE_TYPE.to_string())
}

// Keeps an explicit `null` as `Some(Value::Null)`; only an absent field is `None`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl ScenarioRequest {
    /// Decode a raw message body. Only a JSON object is accepted.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("message body must be a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Requested plugin name, if `template_type` is a string
    pub fn plugin_name(&self) -> Option<&str> {
        self.template_type.as_str()
    }

    /// `template_type` as text for logs and metric labels
    pub fn template_label(&self) -> String {
        match &self.template_type {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        }
    }

    /// Parameters as a key/value map; absent params are empty
    pub fn params(&self) -> Result<Params> {
        match &self.params {
            None => Ok(Params::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(ScenarioError::InvalidParams(format!(
                "params must be an object, got {}",
                other
            ))),
        }
    }
}
