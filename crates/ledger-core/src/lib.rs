pub mod config;
pub mod error;
pub mod io;
pub mod log;
pub mod metrics;
pub mod paths;
pub mod replay;
pub mod sprint;
pub mod store;
pub mod task;
pub mod types;

pub use error::{LedgerError, Result};
