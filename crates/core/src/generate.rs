//! Driving one generation action from prompt to validated value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::ConfigurationError;
use crate::model::{IdeaRecord, TutorialScript};
use crate::normalize::{normalize_ideas, normalize_script, NormalizationError};
use crate::prompt::{idea_prompt, script_prompt, Prompt};
use crate::CompletionEndpoint;

/// Failure of the completion call itself.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("endpoint returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("endpoint reported an error: {0}")]
    Api(String),

    #[error("endpoint returned no content")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("completion request failed: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("could not read the completion: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("a generation request is already in progress")]
    Busy,
}

impl GenerationError {
    /// Whether re-running the same action can succeed without user changes.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::Configuration(_))
    }
}

/// Result of a generation whose caller may have moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Ready(T),
    /// The request finished after [`Generator::discard_pending`]; its result was dropped.
    Discarded,
}

impl<T> Outcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(value) => Some(value),
            Outcome::Discarded => None,
        }
    }
}

/// Clears the in-flight flag however the request ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Issues prompts and normalizes the replies, one request at a time.
///
/// A second call while a request is outstanding fails with
/// [`GenerationError::Busy`]. Calling [`Generator::discard_pending`] does not
/// cancel the network call; its result is simply not handed back.
pub struct Generator<E>
where
    E: CompletionEndpoint,
{
    endpoint: E,
    in_flight: AtomicBool,
    generation: AtomicU64,
}

impl<E> Generator<E>
where
    E: CompletionEndpoint,
{
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint,
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Mark any outstanding request as stale.
    pub fn discard_pending(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Ask for `count` ideas (clamped to the supported range).
    #[instrument(skip(self))]
    pub async fn ideas(&self, count: usize) -> Result<Outcome<Vec<IdeaRecord>>, GenerationError> {
        let outcome = self.run(idea_prompt(count), normalize_ideas).await?;
        if let Outcome::Ready(ideas) = &outcome {
            info!(count = ideas.len(), "generated ideas");
        }
        Ok(outcome)
    }

    /// Ask for a tutorial script expanding `idea`.
    #[instrument(skip(self, idea), fields(title = %idea.title))]
    pub async fn script(&self, idea: &IdeaRecord) -> Result<Outcome<TutorialScript>, GenerationError> {
        let outcome = self.run(script_prompt(idea), normalize_script).await?;
        if let Outcome::Ready(script) = &outcome {
            info!(steps = script.steps.len(), "generated tutorial script");
        }
        Ok(outcome)
    }

    async fn run<T>(
        &self,
        prompt: Prompt,
        parse: fn(&str) -> Result<T, NormalizationError>,
    ) -> Result<Outcome<T>, GenerationError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(GenerationError::Busy);
        }
        let _guard = InFlight(&self.in_flight);
        let started = self.generation.load(Ordering::Acquire);

        debug!(shape = %prompt.shape, "sending completion request");
        let result = self.endpoint.complete(&prompt).await;

        if self.generation.load(Ordering::Acquire) != started {
            debug!("discarding result of a stale request");
            return Ok(Outcome::Discarded);
        }

        let raw = result?;
        match parse(&raw) {
            Ok(value) => Ok(Outcome::Ready(value)),
            Err(e) => {
                warn!(error = %e, "completion could not be normalized");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Shape;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned replies and records the prompts it saw.
    struct CannedEndpoint {
        replies: Mutex<Vec<Result<String, EndpointError>>>,
        seen: Mutex<Vec<Prompt>>,
    }

    impl CannedEndpoint {
        fn new(replies: Vec<Result<String, EndpointError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionEndpoint for CannedEndpoint {
        async fn complete(&self, prompt: &Prompt) -> Result<String, EndpointError> {
            self.seen.lock().unwrap().push(prompt.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    /// Yields once before answering, so other work can run mid-request.
    struct SlowEndpoint(&'static str);

    #[async_trait]
    impl CompletionEndpoint for SlowEndpoint {
        async fn complete(&self, _prompt: &Prompt) -> Result<String, EndpointError> {
            tokio::task::yield_now().await;
            Ok(self.0.to_string())
        }
    }

    const SCRIPT: &str = r#"{"tts_script":[{"voiceover":"Hook","code_snippet":""},{"voiceover":"Import","code_snippet":"import os"}],"closer":"Bye","full_script":"import os"}"#;

    #[tokio::test]
    async fn test_generate_ideas() {
        let endpoint = CannedEndpoint::new(vec![Ok(
            "```json\n[{\"video_idea\":\"A\",\"tiktok_caption\":\"B\"}]\n```".to_string(),
        )]);
        let generator = Generator::new(&endpoint);
        let ideas = generator.ideas(3).await.unwrap().ready().unwrap();
        assert_eq!(ideas, vec![IdeaRecord::new("A", "B")]);

        let seen = endpoint.seen.lock().unwrap();
        assert_eq!(seen[0].shape, Shape::IdeaList);
        assert!(seen[0].user.contains("Generate 3 Python video ideas"));
        assert!(!generator.is_busy());
    }

    #[tokio::test]
    async fn test_generate_script() {
        let endpoint = CannedEndpoint::new(vec![Ok(SCRIPT.to_string())]);
        let generator = Generator::new(&endpoint);
        let idea = IdeaRecord::custom("List every file").unwrap();
        let script = generator.script(&idea).await.unwrap().ready().unwrap();
        assert_eq!(script.steps.len(), 2);
        assert_eq!(endpoint.seen.lock().unwrap()[0].shape, Shape::TutorialScript);
    }

    #[tokio::test]
    async fn test_errors_are_typed_and_release_the_slot() {
        let endpoint = CannedEndpoint::new(vec![
            Err(EndpointError::Status {
                status: 401,
                message: "bad key".to_string(),
            }),
            Ok("no json here".to_string()),
            Ok("[{\"video_idea\":\"A\",\"tiktok_caption\":\"B\"}]".to_string()),
        ]);
        let generator = Generator::new(&endpoint);

        let err = generator.ideas(1).await.unwrap_err();
        assert!(matches!(err, GenerationError::Endpoint(EndpointError::Status { status: 401, .. })));
        assert!(err.is_retryable());

        let err = generator.ideas(1).await.unwrap_err();
        assert!(matches!(err, GenerationError::Normalization(NormalizationError::NoStructureFound)));

        assert!(generator.ideas(1).await.is_ok());
    }

    #[test]
    fn test_configuration_error_is_not_retryable() {
        let err: GenerationError = ConfigurationError::MissingCredential { var: "OPENAI_API_KEY" }.into();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_second_request_is_busy() {
        let generator = Generator::new(SlowEndpoint(SCRIPT));
        let idea = IdeaRecord::new("A", "B");
        let (first, second) = tokio::join!(generator.script(&idea), generator.ideas(1));
        assert!(matches!(first, Ok(Outcome::Ready(_))));
        assert!(matches!(second, Err(GenerationError::Busy)));
        assert!(!generator.is_busy());
    }

    #[tokio::test]
    async fn test_result_after_discard_is_dropped() {
        let generator = Generator::new(SlowEndpoint(SCRIPT));
        let idea = IdeaRecord::new("A", "B");
        let (outcome, ()) = tokio::join!(generator.script(&idea), async { generator.discard_pending() });
        assert_eq!(outcome.unwrap(), Outcome::Discarded);
        assert!(!generator.is_busy());

        let outcome = generator.script(&idea).await.unwrap();
        assert!(matches!(outcome, Outcome::Ready(_)));
    }
}
