pub mod audit;
pub mod authenticator;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod errors;
pub mod store;
pub mod vault;
