//! Abandoned checkout recovery service.
//!
//! Checkouts reported by storefronts are held as `pending` until their
//! recovery delay elapses. The [`scheduler::RecoveryScheduler`] then asks the
//! order API whether each one was paid and, if not, hands it to the
//! notification workflow. Every checkout ends in exactly one terminal status.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod providers;
pub mod schema;
pub mod scheduler;
pub mod store;
