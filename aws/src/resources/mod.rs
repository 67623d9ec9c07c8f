//! Resource driver implementations

pub mod sns_application;
pub mod vpc_endpoint;

pub use sns_application::SnsApplicationDriver;
pub use vpc_endpoint::VpcEndpointDriver;
