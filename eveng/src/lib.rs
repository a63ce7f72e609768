
pub mod config;
pub mod node_yaml;
pub mod orchestrate;
pub mod rest_types;
pub mod rest;
mod utils;

pub use rest_types as rt;
pub use config::Config;
pub use rest::{Authenticate, EveSession, Error};
pub use orchestrate::{Orchestrator, Phase, Proceed};
