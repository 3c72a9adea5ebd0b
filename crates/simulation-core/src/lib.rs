mod error;
mod event;
mod plugin;
mod request;

pub use error::{ScenarioError, Result};
pub use event::Event;
pub use plugin::{EventStream, PluginFactory, PluginRegistry, ScenarioPlugin};
pub use request::{Params, ScenarioRequest, DEFAULT_TEMPLATE_TYPE};
