// src/lib.rs

//! Sift Package Management Engine
//!
//! Resolves install/update/remove requests against a local installed
//! database and a set of remote repositories into a consistent,
//! dependency-satisfying transaction plan.
//!
//! # Architecture
//!
//! - Depend/EVR: versioned-dependency satisfiability and RPM-style
//!   version ordering, replicated exactly
//! - Package: shared handles with lazily-populated, cached metadata and
//!   O(1) relation lookup caches
//! - Store: one trait over the installed database, remote repositories
//!   and synthetic in-memory sources
//! - Transaction: the fixed-point resolver producing a frozen plan;
//!   applying the plan is the caller's job
//! - Progress: a hierarchical, cancellable progress tree threaded
//!   through every long-running operation

pub mod arch;
pub mod collection;
pub mod config;
pub mod depend;
pub mod download;
mod error;
pub mod package;
pub mod progress;
pub mod store;
pub mod transaction;
pub mod version;

pub use error::{Error, Result};
