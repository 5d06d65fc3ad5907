// mikrogate-api: Async Rust client for the RouterOS REST control-plane API

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

mod hotspot;
mod ppp;
mod system;

pub use client::RouterClient;
pub use error::Error;
