//! OpenAI-compatible provider (Groq, OpenAI, local gateways).
//!
//! Chat completions back the inference capability; `/embeddings` backs the
//! embedding capability.

pub mod chat;
pub mod client;
pub mod embedding;
pub mod types;

pub use chat::OpenAIChatBackend;
pub use client::OpenAIClient;
pub use embedding::OpenAIEmbeddingProvider;
