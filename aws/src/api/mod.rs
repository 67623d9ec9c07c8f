pub mod client;
pub mod ec2;
pub mod error;
pub mod sns;

pub use client::{Client, ClientConfig};
pub use error::ApiError;
