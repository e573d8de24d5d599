//! # Lifecheck Core
//!
//! Run orchestration for the scheduled life-status verification batch.
//!
//! A batch pulls the subject census, checks every subject against the
//! population registry, waits for an operator login, checks the remainder
//! against the civil registry, and finishes. Progress is persisted after
//! every phase so a run interrupted by a closing schedule window or a
//! restart resumes where it stopped.
//!
//! ## Architecture
//!
//! - [`database`]: repository ports plus their PostgreSQL adapters
//! - [`providers`]: HTTP adapters for the two registries
//! - [`orchestration`]: the phase state machine, run lease, retry engine
//! - [`scheduling`]: calendar windows, the trigger loop, schedule validation

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Repository ports and PostgreSQL adapters
pub mod database;

/// Error types shared across the crate
pub mod error;

/// Batch state machine, retry engine and cancellation
pub mod orchestration;

/// Population and civil registry adapters
pub mod providers;

/// Trigger windows and the scheduler loop
pub mod scheduling;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use error::{CoreError, Result};
pub use lifecheck_model as model;
