//! IR transformation passes.

pub mod bufferize;

pub use bufferize::{BufferizeError, bufferize_function, bufferize_module};
