//! Education Account Administration API Library
//!
//! This library provides the core functionality for the education account
//! administration service, including account balances and the transaction
//! ledger, course enrollments with pro-rated first-cycle billing, derived
//! education levels, and scheduled top-ups with batch targeting.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `billing`: Pro-rated billing and billing-calendar calculations.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Database storage operations.
//! - `education`: Education-level derivation from enrollments.
//! - `education_sync`: Per-account education level sync orchestration.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `ledger`: Running-balance reconstruction for the transaction ledger.
//! - `models`: Core data models.
//! - `targeting`: Batch top-up targeting and eligibility.

pub mod api;
pub mod core;

// Re-export primary modules for shared use in tests and other binaries
pub mod billing;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod education;
pub mod education_sync;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod targeting;
