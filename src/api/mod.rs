pub mod client;
pub mod error;

pub use client::{ApiClient, AuthResponse, RegisterRequest};
pub use error::ApiError;
