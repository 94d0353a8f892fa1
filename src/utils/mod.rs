//! Shared utilities for binaries and storage backends.

pub mod bootstrap;
pub mod retry;
