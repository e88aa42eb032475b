//! Configuration
//!
//! Precedence, lowest first: defaults, the JSON file, `RC_TELEOP_*`
//! environment variables, command line flags.

mod env;
mod schema;
mod store;

pub use env::{apply_env_overrides, apply_overrides, ENV_PREFIX};
pub use schema::*;
pub use store::ConfigStore;
