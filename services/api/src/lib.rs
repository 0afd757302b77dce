//! services/api/src/lib.rs
//!
//! Library root for the `api` service. The binaries and the integration
//! tests both build the application through these modules.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
