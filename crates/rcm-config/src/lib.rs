//! RCM Config
//!
//! Configuration data for the RCM pipeline. Nothing in this crate has
//! behavior beyond parsing and validation:
//! - the canonical step names ([`steps`])
//! - the named workflow presets ([`WorkflowType`])
//! - the settings file ([`Settings`]) describing where each agent lives and
//!   which checkpoint backend to use

mod error;
mod preset;
mod settings;
pub mod steps;

pub use error::SettingsError;
pub use preset::{UnknownWorkflowType, WorkflowType};
pub use settings::{AgentEndpoint, CheckpointBackend, Settings};
