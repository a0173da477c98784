//! Testing utilities for request contexts.
//!
//! This module provides payloads that record their activation hooks, for
//! asserting exactly which entries a switch, fork or overwrite touched.

mod mocks;

pub use mocks::{PlainData, RecordingData};
