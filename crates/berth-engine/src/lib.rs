//! # berth-engine
//!
//! The container engine as seen by the reconciler: a narrow, synchronous
//! request/response contract ([`ContainerEngine`](engine::ContainerEngine)),
//! the data it exchanges, and [`MemoryEngine`](memory::MemoryEngine), an
//! in-process engine used for simulation and tests.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod engine;
pub mod error;
pub mod memory;
pub mod model;

pub use engine::ContainerEngine;
pub use error::{EngineError, Result};
