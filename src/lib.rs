//! URL indexation service core library.
//!
//! Exports the modules shared by the server binary: credit ledger, method
//! queue, adapters, probes, dispatcher, verification scheduler, and refund
//! sweeper.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use config::AppSettings;
pub use error::CoreError;
