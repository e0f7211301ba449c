pub mod orchestrate;
pub mod resolve;
pub mod validate;

pub use orchestrate::ClassifyService;
pub use validate::{validate_batch, ImageDescriptor, ValidationError};
