pub mod client;
pub mod events;
pub mod infra;
pub mod token;
