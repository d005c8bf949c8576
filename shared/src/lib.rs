//! Shared types and models for the Agrocast forecasting engine
//!
//! This crate contains the data model and the pure agronomic calculations
//! shared between the backend engine and the browser calculator (via WASM).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
