//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `poproute` application.
//!
//! It centralizes the crate error type and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{BrokerError, Result};
