//! Recovery of structured values from completion text.
//!
//! Completions are asked for bare JSON but regularly arrive wrapped in code
//! fences or prose, with trailing commas or raw control characters. The
//! normalizer runs a fixed sequence of repair passes (see [`crate::helpers`])
//! and then validates the result against the expected [`Shape`]. It never
//! falls back to an empty or default value.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::helpers::{remove_trailing_separators, strip_control_chars, strip_fences, structure_span};
use crate::model::{IdeaRecord, Normalized, Shape, Step, TutorialScript};

const TITLE_FIELDS: &[&str] = &["video_idea", "title"];
const CAPTION_FIELDS: &[&str] = &["tiktok_caption", "caption"];
const STEPS_FIELDS: &[&str] = &["tts_script", "steps"];
const NARRATION_FIELDS: &[&str] = &["voiceover", "narration"];
const CODE_FIELDS: &[&str] = &["code_snippet", "code"];
const CLOSER_FIELDS: &[&str] = &["closer"];
const FULL_SOURCE_FIELDS: &[&str] = &["full_script", "full_source"];

#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("no JSON object or array found in the completion")]
    NoStructureFound,

    #[error("completion is not valid JSON even after repair: {message}")]
    UnparsableAfterRepair {
        /// Parse error from the first attempt, before repair.
        message: String,
        /// The text that was handed to the parser.
        cleaned: String,
    },

    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("expected {expected}, found {found}")]
    WrongShape { expected: Shape, found: &'static str },
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(items) if items.is_empty() => "an empty array",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Run the repair passes and parse, without checking the shape.
pub fn recover_json(raw: &str) -> Result<Value, NormalizationError> {
    let unfenced = strip_fences(raw);
    let span = structure_span(unfenced).ok_or(NormalizationError::NoStructureFound)?;
    debug!(span_len = span.len(), raw_len = raw.len(), "located structure span");

    let cleaned = strip_control_chars(span);
    let first_error = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    debug!(error = %first_error, "parse failed, removing trailing separators");

    let repaired = remove_trailing_separators(&cleaned);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            warn!(error = %first_error, "completion parsed only after removing trailing separators");
            Ok(value)
        }
        Err(_) => Err(NormalizationError::UnparsableAfterRepair {
            message: first_error.to_string(),
            cleaned,
        }),
    }
}

/// Normalize `raw` and validate it as `shape`.
pub fn normalize(raw: &str, shape: Shape) -> Result<Normalized, NormalizationError> {
    let value = recover_json(raw)?;
    match shape {
        Shape::IdeaList => ideas_from_value(&value).map(Normalized::Ideas),
        Shape::TutorialScript => script_from_value(&value).map(Normalized::Script),
    }
}

/// Normalize a completion that should hold a list of ideas.
pub fn normalize_ideas(raw: &str) -> Result<Vec<IdeaRecord>, NormalizationError> {
    ideas_from_value(&recover_json(raw)?)
}

/// Normalize a completion that should hold a tutorial script.
pub fn normalize_script(raw: &str) -> Result<TutorialScript, NormalizationError> {
    script_from_value(&recover_json(raw)?)
}

/// First of `names` present on `value` as a string.
fn text_field<'v>(value: &'v Value, names: &[&str]) -> Option<&'v str> {
    names.iter().find_map(|name| value.get(*name).and_then(Value::as_str))
}

/// Like [`text_field`] but the string must contain something besides whitespace.
fn required_text(value: &Value, names: &[&str], path: impl FnOnce() -> String) -> Result<String, NormalizationError> {
    text_field(value, names)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| NormalizationError::MissingField(path()))
}

fn ideas_from_value(value: &Value) -> Result<Vec<IdeaRecord>, NormalizationError> {
    let items = match value.as_array() {
        Some(items) if !items.is_empty() => items,
        _ => {
            return Err(NormalizationError::WrongShape {
                expected: Shape::IdeaList,
                found: describe(value),
            })
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<IdeaRecord, NormalizationError> {
            let title = required_text(item, TITLE_FIELDS, || format!("[{}].{}", i, TITLE_FIELDS[0]))?;
            let caption = required_text(item, CAPTION_FIELDS, || format!("[{}].{}", i, CAPTION_FIELDS[0]))?;
            Ok(IdeaRecord::new(title, caption))
        })
        .collect()
}

fn script_from_value(value: &Value) -> Result<TutorialScript, NormalizationError> {
    if !value.is_object() {
        return Err(NormalizationError::WrongShape {
            expected: Shape::TutorialScript,
            found: describe(value),
        });
    }

    let raw_steps = STEPS_FIELDS
        .iter()
        .find_map(|name| value.get(*name).and_then(Value::as_array))
        .filter(|steps| !steps.is_empty())
        .ok_or_else(|| NormalizationError::MissingField(STEPS_FIELDS[0].to_string()))?;
    let closer = required_text(value, CLOSER_FIELDS, || CLOSER_FIELDS[0].to_string())?;
    let full_source = required_text(value, FULL_SOURCE_FIELDS, || FULL_SOURCE_FIELDS[0].to_string())?;

    let steps = raw_steps
        .iter()
        .enumerate()
        .map(|(i, step)| -> Result<Step, NormalizationError> {
            let narration = text_field(step, NARRATION_FIELDS).ok_or_else(|| {
                NormalizationError::MissingField(format!("{}[{}].{}", STEPS_FIELDS[0], i, NARRATION_FIELDS[0]))
            })?;
            // absent or null code is an empty step; any other non-string is rejected
            let code = match CODE_FIELDS.iter().find_map(|name| step.get(*name)) {
                None | Some(Value::Null) => "",
                Some(Value::String(code)) => code.as_str(),
                Some(_) => {
                    return Err(NormalizationError::MissingField(format!(
                        "{}[{}].{}",
                        STEPS_FIELDS[0], i, CODE_FIELDS[0]
                    )))
                }
            };
            Ok(Step::new(narration, code))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TutorialScript {
        steps,
        closer,
        full_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDEAS: &str = r#"[{"video_idea":"A","tiktok_caption":"B #x #y #z #w"}]"#;

    const SCRIPT: &str = r#"{
  "tts_script": [
    {"voiceover": "Python just read every file name on my disk.", "code_snippet": ""},
    {"voiceover": "First we import os.", "code_snippet": "import os"},
    {"voiceover": "Then walk the tree.", "code_snippet": "import os\nfor root, dirs, files in os.walk(\"/\"):\n    print(files)"}
  ],
  "closer": "That simple. Follow for daily Python tricks.",
  "full_script": "import os\nfor root, dirs, files in os.walk(\"/\"):\n    print(files)"
}"#;

    #[test]
    fn test_end_to_end_idea_list() {
        let raw = "Here you go:\n```json\n[{\"video_idea\":\"A\",\"tiktok_caption\":\"B #x #y #z #w\"}]\n```";
        let result = normalize(raw, Shape::IdeaList).unwrap();
        assert_eq!(result, Normalized::Ideas(vec![IdeaRecord::new("A", "B #x #y #z #w")]));
    }

    #[test]
    fn test_fences_do_not_change_result() {
        let fenced = format!("```json\n{}\n```", IDEAS);
        assert_eq!(normalize_ideas(&fenced).unwrap(), normalize_ideas(IDEAS).unwrap());
    }

    #[test]
    fn test_prose_around_structure() {
        let raw = format!("Sure! Here is your script.\n{}\nLet me know if you need more.", SCRIPT);
        let script = normalize_script(&raw).unwrap();
        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.steps[0].code_so_far, "");
        assert!(script.full_source.contains("os.walk(\"/\")"));
    }

    #[test]
    fn test_trailing_separator_repair() {
        let raw = r#"[{"video_idea":"A","tiktok_caption":"B",},]"#;
        assert!(serde_json::from_str::<Value>(raw).is_err());
        assert_eq!(normalize_ideas(raw).unwrap(), vec![IdeaRecord::new("A", "B")]);
    }

    #[test]
    fn test_raw_control_characters_are_removed() {
        let raw = "{\"tts_script\":[{\"voiceover\":\"Hook\tline\",\"code_snippet\":\"\"}],\n\"closer\":\"Bye\",\"full_script\":\"x = 1\u{7}\"}";
        let script = normalize_script(raw).unwrap();
        assert_eq!(script.steps[0].narration, "Hookline");
        assert_eq!(script.full_source, "x = 1");
    }

    #[test]
    fn test_no_structure() {
        let err = normalize("I can't help with that.", Shape::IdeaList).unwrap_err();
        assert!(matches!(err, NormalizationError::NoStructureFound));
    }

    #[test]
    fn test_unparsable_keeps_original_error() {
        let err = normalize_ideas("[{'video_idea': 'A'}]").unwrap_err();
        match err {
            NormalizationError::UnparsableAfterRepair { message, cleaned } => {
                assert!(message.contains("line 1"));
                assert_eq!(cleaned, "[{'video_idea': 'A'}]");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_closer() {
        let raw = r#"{"tts_script":[{"voiceover":"Hook","code_snippet":""}],"full_script":"x = 1"}"#;
        let err = normalize(raw, Shape::TutorialScript).unwrap_err();
        assert!(matches!(err, NormalizationError::MissingField(ref f) if f == "closer"));
    }

    #[test]
    fn test_first_missing_field_is_reported() {
        let err = normalize_script(r#"{"closer": ""}"#).unwrap_err();
        assert!(matches!(err, NormalizationError::MissingField(ref f) if f == "tts_script"));

        let raw = r#"{"tts_script":[{"code_snippet":""}],"closer":"c","full_script":"x"}"#;
        let err = normalize_script(raw).unwrap_err();
        assert!(matches!(err, NormalizationError::MissingField(ref f) if f == "tts_script[0].voiceover"));
    }

    #[test]
    fn test_idea_requires_caption() {
        let err = normalize_ideas(r#"[{"video_idea":"A","tiktok_caption":"B"},{"video_idea":"C","tiktok_caption":" "}]"#)
            .unwrap_err();
        assert!(matches!(err, NormalizationError::MissingField(ref f) if f == "[1].tiktok_caption"));
    }

    #[test]
    fn test_idea_aliases() {
        let ideas = normalize_ideas(r#"[{"title":"A","caption":"B"}]"#).unwrap();
        assert_eq!(ideas, vec![IdeaRecord::new("A", "B")]);
    }

    #[test]
    fn test_wrong_shape() {
        let err = normalize(IDEAS, Shape::TutorialScript).unwrap_err();
        assert!(matches!(err, NormalizationError::WrongShape { expected: Shape::TutorialScript, found: "an array" }));

        let err = normalize("[]", Shape::IdeaList).unwrap_err();
        assert!(matches!(err, NormalizationError::WrongShape { found: "an empty array", .. }));
    }

    #[test]
    fn test_missing_code_snippet_defaults_to_empty() {
        let raw = r#"{"tts_script":[{"voiceover":"Hook"}],"closer":"c","full_script":"x"}"#;
        let script = normalize_script(raw).unwrap();
        assert_eq!(script.steps[0].code_so_far, "");
    }

    #[test]
    fn test_null_code_snippet_is_empty() {
        let raw = r#"{"tts_script":[{"voiceover":"Hook","code_snippet":null}],"closer":"c","full_script":"x"}"#;
        assert_eq!(normalize_script(raw).unwrap().steps[0].code_so_far, "");
    }

    #[test]
    fn test_non_string_code_snippet_is_rejected() {
        for code in ["7", "[\"import os\"]", "{\"line\":1}", "true"] {
            let raw = format!(
                r#"{{"tts_script":[{{"voiceover":"Hook","code_snippet":""}},{{"voiceover":"h","code_snippet":{}}}],"closer":"c","full_script":"x"}}"#,
                code
            );
            let err = normalize_script(&raw).unwrap_err();
            assert!(
                matches!(err, NormalizationError::MissingField(ref f) if f == "tts_script[1].code_snippet"),
                "{code}: {err:?}"
            );
        }

        let raw = r#"{"tts_script":[{"voiceover":"h","code":7}],"closer":"c","full_script":"x"}"#;
        assert!(matches!(normalize_script(raw), Err(NormalizationError::MissingField(_))));
    }
}
