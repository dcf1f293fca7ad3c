//! Session-side helpers that sit next to the AI loop rather than inside it:
//! transcript summarization (C13), prompt caching (C14), and approximate
//! token counting (C15).

pub mod prompt_cache;
pub mod summarizer;
pub mod tokens;

pub use prompt_cache::{PromptCache, cache_key};
pub use summarizer::{Role, SessionMessage, SummarizeOptions, summarize};
pub use tokens::approx_tokens;
