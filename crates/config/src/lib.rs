//! Configuration loading: file discovery, `${ENV}` substitution, environment
//! overrides and the layered upstream call profile.

pub mod env_subst;
pub mod loader;
pub mod profile;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config},
    profile::CallProfile,
    schema::BridgewayConfig,
};
