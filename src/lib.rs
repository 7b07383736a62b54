pub mod agent;
pub mod config;
pub mod error;
pub mod platform;
pub mod server;
pub mod shutdown;
pub mod webhook;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;
