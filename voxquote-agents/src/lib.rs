//! Inference backend access for the quote extraction pipeline.
//!
//! The client trait is the seam: production wires up the HTTP client,
//! tests substitute their own implementation.

pub mod client;
pub mod quote_extractor;

pub use client::{
    CompletionRequest, CompletionResponse, HttpInferenceClient, InferenceClient, InferenceError,
};
pub use quote_extractor::system_prompt::{build_system_prompt, build_user_content};
