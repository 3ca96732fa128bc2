pub mod classifier;
pub mod diagnostics;
pub mod extractor;
pub mod handlers;
pub mod normalizer;
pub mod orchestrator;
pub mod pdf_text;
pub mod policy;
pub mod prompt_builder;
pub mod prompts;
pub mod rate_limit;
pub mod rewrite;
pub mod sanitizer;
