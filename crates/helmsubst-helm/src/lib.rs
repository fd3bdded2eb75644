pub mod client;
pub mod command;
pub mod executor;

pub use client::HelmClient;
pub use command::{HelmCommand, HelmError};
pub use executor::{HelmExecutor, RealExecutor};
