pub mod backend;
pub mod config;
pub mod correlate;
pub mod fetch;
pub mod filter;
pub mod provision;
pub mod registry;
pub mod retry;
pub mod session;
pub mod stream;
pub mod transport;
