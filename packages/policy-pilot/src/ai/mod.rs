//! Adapters binding the matching seams to real services.

pub mod openai;

pub use openai::OpenAiService;
