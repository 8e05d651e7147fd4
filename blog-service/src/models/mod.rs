pub mod blog_request;
pub mod generation;

pub use blog_request::{BlogRequest, ValidationError, REQUIRED_FIELDS};
pub use generation::GenerateResponse;
