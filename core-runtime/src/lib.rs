//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the riff synchronization core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the store, sync and service
//! crates depend on. It establishes the logging conventions, the configuration
//! defaults and the event broadcasting used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
