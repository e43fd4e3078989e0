pub mod client;
pub mod probe;

pub use client::{HttpExecutor, HttpExecutorBuilder, RequestExecutor};
pub use probe::probe_availability;
