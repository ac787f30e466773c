pub mod client;
pub mod encoders;
pub mod schemas;

pub use client::WeaviateClient;
pub use encoders::EmbeddingClient;
