// src/exec/mod.rs

//! Work execution layer.
//!
//! This is the boundary to the collaborator that actually performs task
//! work. The scheduler only sees the [`Worker`] trait.
//!
//! - [`worker`] defines the trait and the closure adapter.
//! - [`shell`] runs payloads as shell commands via `tokio::process`.

pub mod shell;
pub mod worker;

pub use shell::{ShellOutput, ShellWorker};
pub use worker::{FnWorker, WorkFuture, Worker};
