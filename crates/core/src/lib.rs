//! Core logic for reelscript: short-form Python tutorial scripts.
//!
//! The crate covers two independent jobs:
//!
//! - [`highlight`] classifies Python source into coloured tokens for a code
//!   card, and [`render`] turns those tokens into HTML or terminal output.
//! - [`normalize`] recovers idea lists and tutorial scripts from the loosely
//!   formatted text a language model returns, and [`generate`] drives one
//!   request through a [`CompletionEndpoint`] at a time.

use async_trait::async_trait;

/// Something that turns a [`Prompt`] into raw completion text.
///
/// The CLI talks to an OpenAI-compatible HTTP API; tests use canned replies.
#[async_trait]
pub trait CompletionEndpoint: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, EndpointError>;
}

// Blanket implementation for references to endpoints
#[async_trait]
impl<T: CompletionEndpoint + ?Sized> CompletionEndpoint for &T {
    async fn complete(&self, prompt: &Prompt) -> Result<String, EndpointError> {
        (**self).complete(prompt).await
    }
}

pub mod config;
pub mod generate;
mod helpers;
pub mod highlight;
pub mod history;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod progression;
pub mod prompt;
pub mod render;

pub use config::{ConfigurationError, EndpointConfig};
pub use generate::{EndpointError, GenerationError, Generator, Outcome};
pub use helpers::{clean_text, escape_html, fenced_block};
pub use highlight::{split_lines, tokenize, Token, TokenKind, KEYWORDS};
pub use history::{export_csv, FileStore, HistoryError, IdeaHistory, KeyValueStore, MemoryStore, HISTORY_LIMIT};
pub use model::{IdeaRecord, Normalized, Shape, Step, TutorialScript};
pub use normalize::{normalize, normalize_ideas, normalize_script, recover_json, NormalizationError};
pub use pipeline::{discover_source_files, render_all, render_file, RenderConfig, RenderFormat, RenderSummary, RenderedFile};
pub use progression::{cumulative_violations, full_source_matches, line_delta, step_deltas, StepDelta};
pub use prompt::{idea_prompt, script_prompt, Prompt, DEFAULT_IDEA_COUNT, MAX_IDEA_COUNT, MIN_IDEA_COUNT};
pub use render::{render_ansi, AnsiOptions, CodeCard, Palette, Rgb};
