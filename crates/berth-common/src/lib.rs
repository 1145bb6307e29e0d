//! # berth-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the berth workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and provides the identifiers and configuration that the
//! engine, reconciler and CLI crates build upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
