//! Configuration module

pub mod artifact;
pub mod store;
pub mod stream;

pub use store::ConfigStore;
pub use stream::{DecoderConfig, EncoderConfig, ServerConfig};
