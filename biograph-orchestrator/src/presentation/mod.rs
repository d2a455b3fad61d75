//! HTTP presentation layer

pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::ApiError;
pub use routes::{create_router, ApiState};
