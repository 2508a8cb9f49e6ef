#![warn(clippy::unwrap_used)]

pub mod rest;
pub mod server;

pub use rest::AppState;
pub use server::{build_app, ApiServer};
