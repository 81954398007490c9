//! Core library components.
//!
//! Everything the command-line layer calls into: key lifecycle, cipher jobs,
//! the engine client, file staging, and configuration.

pub mod cipher;
pub mod config;
pub mod constants;
pub mod domain;
pub mod engine;
pub mod keyring;
pub mod keys;
pub mod limiter;
pub mod service;
pub mod staging;
pub mod validation;
