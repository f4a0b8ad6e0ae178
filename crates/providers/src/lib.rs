//! Completion client implementations for ferrule.
//!
//! All providers implement the `ferrule_core::Provider` trait.
//! The router picks the backend from the `provider/` prefix of a model id.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
