//! Structured values recovered from completions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::helpers::{clean_text, fenced_block};

/// The top-level structure a completion is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    IdeaList,
    TutorialScript,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::IdeaList => "idea-list",
            Shape::TutorialScript => "tutorial-script",
        })
    }
}

impl FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idea-list" | "ideas" => Ok(Shape::IdeaList),
            "tutorial-script" | "script" => Ok(Shape::TutorialScript),
            other => Err(format!(
                "unknown shape '{}', expected 'idea-list' or 'tutorial-script'",
                other
            )),
        }
    }
}

/// A single video idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaRecord {
    #[serde(rename = "video_idea", alias = "title")]
    pub title: String,
    #[serde(rename = "tiktok_caption", alias = "caption", default)]
    pub caption: String,
    /// Typed in by the user rather than generated; carries no caption.
    #[serde(rename = "is_custom", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_custom: bool,
}

impl IdeaRecord {
    pub fn new(title: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            caption: caption.into(),
            is_custom: false,
        }
    }

    /// Build a user-authored idea. Returns `None` for blank input.
    pub fn custom(title: &str) -> Option<Self> {
        if title.trim().is_empty() {
            return None;
        }
        Some(Self {
            title: title.to_string(),
            caption: String::new(),
            is_custom: true,
        })
    }
}

/// One narrated step of a tutorial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "voiceover")]
    pub narration: String,
    /// Code shown on screen at this step, cumulative from the first step.
    #[serde(rename = "code_snippet", default)]
    pub code_so_far: String,
}

impl Step {
    pub fn new(narration: impl Into<String>, code_so_far: impl Into<String>) -> Self {
        Self {
            narration: narration.into(),
            code_so_far: code_so_far.into(),
        }
    }

    pub fn has_code(&self) -> bool {
        !self.code_so_far.trim().is_empty()
    }
}

/// A narrated, step-by-step tutorial built from one idea.
///
/// The first step is the hook and carries no code. Later steps are expected
/// to grow the code cumulatively up to `full_source`, but nothing enforces
/// that; see [`crate::progression`] for an informational check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialScript {
    #[serde(rename = "tts_script")]
    pub steps: Vec<Step>,
    pub closer: String,
    #[serde(rename = "full_script")]
    pub full_source: String,
}

impl TutorialScript {
    pub fn hook(&self) -> Option<&Step> {
        self.steps.first()
    }

    /// Every step after the hook.
    pub fn teaching_steps(&self) -> &[Step] {
        self.steps.get(1..).unwrap_or(&[])
    }

    /// Replace the narration of one step. Returns `false` if `index` is out of range.
    pub fn set_narration(&mut self, index: usize, narration: impl Into<String>) -> bool {
        match self.steps.get_mut(index) {
            Some(step) => {
                step.narration = narration.into();
                true
            }
            None => false,
        }
    }

    pub fn set_closer(&mut self, closer: impl Into<String>) {
        self.closer = closer.into();
    }

    /// Display label for a step: the hook first, then numbered steps.
    pub fn step_label(index: usize) -> String {
        if index == 0 {
            "Hook/Intro".to_string()
        } else {
            format!("Step {}", index)
        }
    }

    /// All narration in order with the closer last, separated by blank lines.
    ///
    /// This is the text handed to a text-to-speech tool.
    pub fn narration_script(&self) -> String {
        let mut parts: Vec<String> = self.steps.iter().map(|s| clean_text(&s.narration)).collect();
        parts.push(clean_text(&self.closer));
        parts.join("\n\n")
    }

    /// Markdown export: one section per step with its code fenced.
    pub fn to_markdown(&self, title: &str) -> String {
        let mut out = format!("# {}\n\n", title.trim());
        for (index, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("## {}\n\n{}\n\n", Self::step_label(index), clean_text(&step.narration)));
            if step.has_code() {
                out.push_str(&fenced_block(Some("python"), &step.code_so_far));
                out.push('\n');
            }
        }
        out.push_str(&format!("## Closer\n\n{}\n\n", clean_text(&self.closer)));
        out.push_str("## Full script\n\n");
        out.push_str(&fenced_block(Some("python"), &self.full_source));
        out
    }
}

/// The validated result of normalizing one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Ideas(Vec<IdeaRecord>),
    Script(TutorialScript),
}

impl Normalized {
    pub fn shape(&self) -> Shape {
        match self {
            Normalized::Ideas(_) => Shape::IdeaList,
            Normalized::Script(_) => Shape::TutorialScript,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_script() -> TutorialScript {
        TutorialScript {
            steps: vec![
                Step::new("Python just emptied my downloads folder.", ""),
                Step::new("First we import os.", "import os"),
                Step::new("Now list the files.", "import os\nfiles = os.listdir('.')"),
            ],
            closer: "That's it. Follow for more.".to_string(),
            full_source: "import os\nfiles = os.listdir('.')".to_string(),
        }
    }

    #[test]
    fn test_shape_parse_and_display() {
        assert_eq!("idea-list".parse::<Shape>(), Ok(Shape::IdeaList));
        assert_eq!("tutorial-script".parse::<Shape>(), Ok(Shape::TutorialScript));
        assert!("poem".parse::<Shape>().is_err());
        assert_eq!(Shape::TutorialScript.to_string(), "tutorial-script");
    }

    #[test]
    fn test_custom_idea() {
        assert!(IdeaRecord::custom("   ").is_none());
        let idea = IdeaRecord::custom("Rename 1000 files").unwrap();
        assert!(idea.is_custom);
        assert!(idea.caption.is_empty());
    }

    #[test]
    fn test_idea_wire_names() {
        let idea = IdeaRecord::new("A", "B #x");
        let json = serde_json::to_string(&idea).unwrap();
        assert_eq!(json, r#"{"video_idea":"A","tiktok_caption":"B #x"}"#);
        let back: IdeaRecord = serde_json::from_str(r#"{"title":"A","caption":"B #x"}"#).unwrap();
        assert_eq!(back, idea);
    }

    #[test]
    fn test_hook_and_teaching_steps() {
        let script = sample_script();
        assert!(!script.hook().unwrap().has_code());
        assert_eq!(script.teaching_steps().len(), 2);
        assert_eq!(TutorialScript::step_label(0), "Hook/Intro");
        assert_eq!(TutorialScript::step_label(2), "Step 2");
    }

    #[test]
    fn test_edits_and_narration_script() {
        let mut script = sample_script();
        assert!(script.set_narration(1, "Import os first."));
        assert!(!script.set_narration(9, "nope"));
        script.set_closer("Save this.");
        assert_eq!(
            script.narration_script(),
            "Python just emptied my downloads folder.\n\nImport os first.\n\nNow list the files.\n\nSave this."
        );
    }

    #[test]
    fn test_markdown_export() {
        let md = sample_script().to_markdown("Empty your downloads");
        assert!(md.starts_with("# Empty your downloads\n"));
        assert!(md.contains("## Hook/Intro"));
        assert!(md.contains("```python\nimport os\n```\n"));
        assert!(md.ends_with("```python\nimport os\nfiles = os.listdir('.')\n```\n"));
    }
}
