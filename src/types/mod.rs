//! Core value types shared across the pipeline.

mod options;
mod response;

pub use options::SendOptions;
pub use response::LlmResponse;
