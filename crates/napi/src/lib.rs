//! Node.js bindings for the reelscript highlighter and normalizer.
//!
//! The web front end calls the completion endpoint itself and hands the raw
//! text to `normalizeIdeas` / `normalizeScript`. Errors are thrown as JS
//! exceptions whose message starts with the error kind, e.g.
//! `MissingField: missing required field \`closer\``.

use napi::bindgen_prelude::*;
use napi_derive::napi;
use std::sync::Mutex;

use reelscript_core::{
    IdeaHistory as CoreHistory, IdeaRecord, MemoryStore, NormalizationError, Prompt as CorePrompt,
    Step, StepDelta as CoreStepDelta, TutorialScript,
};

/// A classified slice of source code.
#[napi(object)]
pub struct Token {
    /// One of text, foreground, comment, string, number, keyword, punctuation, function, constant.
    pub kind: String,
    pub text: String,
}

#[napi(object)]
pub struct Idea {
    pub title: String,
    pub caption: String,
    pub is_custom: bool,
}

impl From<IdeaRecord> for Idea {
    fn from(idea: IdeaRecord) -> Self {
        Self {
            title: idea.title,
            caption: idea.caption,
            is_custom: idea.is_custom,
        }
    }
}

impl From<Idea> for IdeaRecord {
    fn from(idea: Idea) -> Self {
        Self {
            title: idea.title,
            caption: idea.caption,
            is_custom: idea.is_custom,
        }
    }
}

#[napi(object)]
pub struct ScriptStep {
    pub narration: String,
    pub code_so_far: String,
}

#[napi(object)]
pub struct Script {
    pub steps: Vec<ScriptStep>,
    pub closer: String,
    pub full_source: String,
}

impl From<TutorialScript> for Script {
    fn from(script: TutorialScript) -> Self {
        Self {
            steps: script
                .steps
                .into_iter()
                .map(|s| ScriptStep {
                    narration: s.narration,
                    code_so_far: s.code_so_far,
                })
                .collect(),
            closer: script.closer,
            full_source: script.full_source,
        }
    }
}

impl From<Script> for TutorialScript {
    fn from(script: Script) -> Self {
        Self {
            steps: script
                .steps
                .into_iter()
                .map(|s| Step::new(s.narration, s.code_so_far))
                .collect(),
            closer: script.closer,
            full_source: script.full_source,
        }
    }
}

/// A request to send to a chat-completions endpoint.
#[napi(object)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// `idea-list` or `tutorial-script`.
    pub shape: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl From<CorePrompt> for Prompt {
    fn from(prompt: CorePrompt) -> Self {
        Self {
            system: prompt.system,
            user: prompt.user,
            shape: prompt.shape.to_string(),
            temperature: f64::from(prompt.temperature),
            max_tokens: prompt.max_tokens,
        }
    }
}

#[napi(object)]
pub struct StepDelta {
    pub step: u32,
    /// 1-based lines this step added.
    pub added_lines: Vec<u32>,
    pub removed_lines: u32,
}

impl From<CoreStepDelta> for StepDelta {
    fn from(delta: CoreStepDelta) -> Self {
        Self {
            step: delta.step as u32,
            added_lines: delta.added_lines.into_iter().map(|l| l as u32).collect(),
            removed_lines: delta.removed_lines as u32,
        }
    }
}

fn normalization_error(e: NormalizationError) -> Error {
    let kind = match &e {
        NormalizationError::NoStructureFound => "NoStructureFound",
        NormalizationError::UnparsableAfterRepair { .. } => "UnparsableAfterRepair",
        NormalizationError::MissingField(_) => "MissingField",
        NormalizationError::WrongShape { .. } => "WrongShape",
    };
    Error::from_reason(format!("{}: {}", kind, e))
}

/// Split Python source into classified tokens.
#[napi]
pub fn tokenize(source: String) -> Vec<Token> {
    reelscript_core::tokenize(&source)
        .into_iter()
        .map(|t| Token {
            kind: t.kind.as_str().to_string(),
            text: t.text.to_string(),
        })
        .collect()
}

/// Recover a list of ideas from raw completion text.
#[napi]
pub fn normalize_ideas(raw: String) -> Result<Vec<Idea>> {
    let ideas = reelscript_core::normalize_ideas(&raw).map_err(normalization_error)?;
    Ok(ideas.into_iter().map(Into::into).collect())
}

/// Recover a tutorial script from raw completion text.
#[napi]
pub fn normalize_script(raw: String) -> Result<Script> {
    let script = reelscript_core::normalize_script(&raw).map_err(normalization_error)?;
    Ok(script.into())
}

/// Render source as a standalone HTML code card.
///
/// @param emphasized - 1-based line numbers to highlight.
#[napi]
pub fn render_code_card(source: String, title: Option<String>, emphasized: Option<Vec<u32>>) -> String {
    let mut card = reelscript_core::CodeCard::new()
        .with_emphasized(emphasized.unwrap_or_default().into_iter().map(|l| l as usize).collect());
    card.title = title;
    card.to_html(&source)
}

/// Narration of every step plus the closer, as read by text-to-speech.
#[napi]
pub fn narration_script(script: Script) -> String {
    TutorialScript::from(script).narration_script()
}

/// What each step adds to and removes from the previous step's code.
#[napi]
pub fn step_deltas(script: Script) -> Vec<StepDelta> {
    reelscript_core::step_deltas(&script.into())
        .into_iter()
        .map(Into::into)
        .collect()
}

/// Prompt asking for `count` ideas (clamped to 1-15).
#[napi]
pub fn idea_prompt(count: Option<u32>) -> Prompt {
    let count = count.map_or(reelscript_core::DEFAULT_IDEA_COUNT, |c| c as usize);
    reelscript_core::idea_prompt(count).into()
}

/// Prompt asking for a tutorial script for `idea`.
#[napi]
pub fn script_prompt(idea: Idea) -> Prompt {
    reelscript_core::script_prompt(&idea.into()).into()
}

/// Build a user-authored idea; returns null for blank input.
#[napi]
pub fn custom_idea(title: String) -> Option<Idea> {
    IdeaRecord::custom(&title).map(Into::into)
}

/// Idea history kept in memory and persisted by the caller as JSON.
///
/// The front end stores `toJson()` wherever it likes (e.g. localStorage)
/// and restores it with `IdeaHistory.fromJson`.
#[napi]
pub struct IdeaHistory {
    inner: Mutex<CoreHistory<MemoryStore>>,
}

#[napi]
impl IdeaHistory {
    #[napi(constructor)]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CoreHistory::new(MemoryStore::new())),
        }
    }

    /// Restore a history saved with `toJson`.
    #[napi(factory)]
    pub fn from_json(json: String) -> Result<Self> {
        let ideas: Vec<IdeaRecord> =
            serde_json::from_str(&json).map_err(|e| Error::from_reason(format!("Corrupt: {}", e)))?;
        let mut history = CoreHistory::new(MemoryStore::new());
        history.record(&ideas).map_err(|e| Error::from_reason(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(history),
        })
    }

    /// Append ideas, keeping the newest 200. Returns the stored count.
    #[napi]
    pub fn record(&self, ideas: Vec<Idea>) -> Result<u32> {
        let mut inner = self.inner.lock().map_err(|_| Error::from_reason("Lock poisoned"))?;
        let ideas: Vec<IdeaRecord> = ideas.into_iter().map(Into::into).collect();
        let stored = inner.record(&ideas).map_err(|e| Error::from_reason(e.to_string()))?;
        Ok(stored as u32)
    }

    /// Stored ideas, oldest first.
    #[napi]
    pub fn list(&self) -> Result<Vec<Idea>> {
        let inner = self.inner.lock().map_err(|_| Error::from_reason("Lock poisoned"))?;
        let ideas = inner.load().map_err(|e| Error::from_reason(e.to_string()))?;
        Ok(ideas.into_iter().map(Into::into).collect())
    }

    #[napi]
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::from_reason("Lock poisoned"))?;
        inner.clear().map_err(|e| Error::from_reason(e.to_string()))
    }

    #[napi]
    pub fn to_json(&self) -> Result<String> {
        let inner = self.inner.lock().map_err(|_| Error::from_reason("Lock poisoned"))?;
        let ideas = inner.load().map_err(|e| Error::from_reason(e.to_string()))?;
        serde_json::to_string(&ideas).map_err(|e| Error::from_reason(e.to_string()))
    }

    /// The history as CSV with a `title,caption,custom` header.
    #[napi]
    pub fn export_csv(&self) -> Result<String> {
        let inner = self.inner.lock().map_err(|_| Error::from_reason("Lock poisoned"))?;
        let ideas = inner.load().map_err(|e| Error::from_reason(e.to_string()))?;
        let mut buf = Vec::new();
        reelscript_core::export_csv(&ideas, &mut buf).map_err(|e| Error::from_reason(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| Error::from_reason(e.to_string()))
    }
}
