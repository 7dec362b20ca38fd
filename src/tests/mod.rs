//! Consolidated test modules.
//!
//! End-to-end tests that exercise the engine against real Parquet artifacts
//! in a temporary directory.

mod engine_e2e;
