//! Infrastructure adapters: the texd HTTP client, filesystem lookup and telemetry.

pub mod client;
pub mod error;
pub mod lookup;
pub mod telemetry;
