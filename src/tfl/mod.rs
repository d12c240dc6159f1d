//! Typed access to the transit operator's line endpoints.

mod client;
mod types;

pub use client::{DEFAULT_BASE_URL, TflClient};
pub use types::{LineStatus, LineStatusEntry, Prediction};
