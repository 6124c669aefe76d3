//! RCM Capability
//!
//! A capability is one unit of RCM work (eligibility check, prior
//! authorization, ...) exposed through a single contract: take the
//! [`PipelineState`], return the updated state, or fail.
//!
//! The [`StepRegistry`] binds step names to capabilities. The workflow
//! builder resolves every requested step through it before anything runs.

mod capability;
mod error;
mod http;
mod registry;
mod state;

pub use capability::{Capability, FnCapability, StepContext};
pub use error::{CapabilityError, RegistryError};
pub use http::HttpCapability;
pub use registry::StepRegistry;
pub use state::{PipelineState, keys};
