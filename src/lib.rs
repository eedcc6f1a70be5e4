//! # Convoy
//!
//! Declarative, idempotent orchestration of infrastructure provisioning
//! workflows over REST control planes.
//!
//! ## Usage
//!
//! ```bash
//! convoy run --workflow <name> -f config.yml [-f overrides.yml] [--debug]
//! convoy run --script CreateCategories,CreateSubnets -f config.yml
//! convoy validate --workflow <name> -f config.yml
//! ```
//!
//! ## Modules
//!
//! - `config` - Document loading (JSON/YAML with `!include`) and schema validation
//! - `context` - Typed run context threaded through pre-actions, scripts, and post-actions
//! - `engine` - The orchestration core: operation contract, batch composer, task poller
//! - `ops` - Concrete provisioning operations built on the engine contract
//! - `rest` - Generic HTTP entity interface over authenticated sessions
//! - `workflow` - Workflow registry, top-level driver, and run reporting

pub mod config;
pub mod context;
pub mod engine;
pub mod ops;
pub mod rest;
pub mod workflow;

mod error;

pub use error::{Error, Result};
