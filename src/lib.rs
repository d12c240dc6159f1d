pub mod clock;
pub mod collector;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod proxy;
pub mod run;
pub mod snapshot;
pub mod status;
pub mod tfl;
