/// Agent configuration (broker, listen address, timers).
pub mod agent;
mod reader;

pub use agent::Agent;
pub use reader::{Validatable, YamlAgentConfig};
