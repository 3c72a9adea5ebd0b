use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Invalid scenario parameters: {0}")]
    InvalidParams(String),

    #[error("Scenario execution failed: {0}")]
    Execution(String),

    #[error("Scenario panicked: {0}")]
    Panicked(String),

    #[error("Scenario was cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for ScenarioError {
    fn from(err: serde_json::Error) -> Self {
        ScenarioError::InvalidParams(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScenarioError>;
