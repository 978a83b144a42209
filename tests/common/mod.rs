//! Shared helpers for backend integration tests.

pub mod contract;
