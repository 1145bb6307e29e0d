//! # berth-reconcile
//!
//! Drives a container engine toward a declared desired state.
//!
//! Provides four layers, leaf to root:
//! - [`image`]: resolves image references to content IDs, pulling when absent.
//! - [`diff`]: compares a live container against its [`ContainerSpec`](spec::ContainerSpec).
//! - [`apply`]: the per-container state machine (inspect, remove, create, start, hook).
//! - [`graph`]: applies a set of linked containers in dependency order, one
//!   concurrent round at a time.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use berth_engine::memory::MemoryEngine;
//! use berth_reconcile::spec::ContainerSpec;
//!
//! # async fn run() -> berth_reconcile::error::Result<()> {
//! let engine = Arc::new(MemoryEngine::new());
//! let db = ContainerSpec::builder().name("db").image("postgres:16").build()?;
//! let api = ContainerSpec::builder()
//!     .name("api")
//!     .image("api:latest")
//!     .link("db:database")
//!     .build()?;
//! let _ = berth_reconcile::graph::apply_graph(engine, vec![db, api]).await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod apply;
pub mod diff;
pub mod error;
pub mod graph;
pub mod image;
pub mod spec;

#[cfg(test)]
mod testing;
