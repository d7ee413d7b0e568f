// src/config/mod.rs

//! Plan-file loading and validation.
//!
//! - `model.rs`: the TOML-backed data model
//! - `loader.rs`: reading a plan file from disk
//! - `validate.rs`: sanity checks and graph validation

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigSection, PlanFile, RawPlanFile, RetrySection, TaskConfig};
