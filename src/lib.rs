//! Quillpad — a streaming LLM writing notebook.
//!
//! Library surface for the `quillpad` binary and its tests. The modules
//! mirror the moving parts: prompt assembly, the streaming completion
//! client, grammar checking, presets, session persistence, voice, and the
//! console notebook that ties them together.

pub mod config;
pub mod error;
pub mod grammar;
pub mod llm;
pub mod logger;
pub mod markdown;
pub mod notebook;
pub mod presets;
pub mod prompt;
pub mod session;
pub mod voice;

pub use error::AppError;
