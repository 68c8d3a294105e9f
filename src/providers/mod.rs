//! Provider clients.
//!
//! [`ProviderClient`] is the contract every backend adapter implements;
//! [`OpenAiCompatClient`] is the bundled adapter for OpenAI-compatible
//! chat completion APIs. Adapters stay thin — resilience lives in
//! [`executor`](crate::executor).

mod openai_compat;
pub mod traits;

pub use openai_compat::OpenAiCompatClient;
pub use traits::ProviderClient;
