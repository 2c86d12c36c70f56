//! Prompt templates sent to the completion endpoint.
//!
//! Each template carries the [`Shape`] its completion has to be normalized
//! into, so a caller cannot pair a prompt with the wrong validator.

use crate::model::{IdeaRecord, Shape};

/// Fewest ideas a single request asks for.
pub const MIN_IDEA_COUNT: usize = 1;
/// Most ideas a single request asks for.
pub const MAX_IDEA_COUNT: usize = 15;
/// Ideas requested when the caller does not say.
pub const DEFAULT_IDEA_COUNT: usize = 10;

const IDEA_SYSTEM_INSTRUCTION: &str = "You generate JSON output only. Never wrap it in markdown code blocks and never add explanations. Escape every string properly, especially code with quotes and backslashes.";

const SCRIPT_SYSTEM_INSTRUCTION: &str = "You generate ONLY valid JSON. No markdown, no explanations, no text outside the JSON object. Escape backslashes and quotes inside code snippets and use double quotes for every JSON string.";

/// A fully rendered request for the completion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Shape the completion must normalize into.
    pub shape: Shape,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Clamp a requested idea count into the supported range.
pub fn clamp_idea_count(count: usize) -> usize {
    count.clamp(MIN_IDEA_COUNT, MAX_IDEA_COUNT)
}

/// Prompt asking for `count` short-form video ideas.
pub fn idea_prompt(count: usize) -> Prompt {
    let count = clamp_idea_count(count);
    let user = format!(
        r#"You write short-form videos for a programming channel that posts one-minute Python tutorials.
Generate {count} Python video ideas. Every idea should feel:
- slightly dangerous, but ethical
- curiosity-inducing and hacker-adjacent
- beginner-friendly
- demoable in under one minute

Return a JSON array in exactly this format:
[
  {{
    "video_idea": "Short, scroll-stopping title for the video",
    "tiktok_caption": "Viral caption with emojis, a curiosity hook, short punchy sentences and 4-5 hashtags"
  }}
]

Caption rules:
- open with a shocking or curious hook ("This Python script feels illegal...")
- use emojis naturally and keep sentences short
- make it feel exclusive or urgent ("Save this")
- include exactly 4 or 5 relevant hashtags such as #Python #Coding #LearnPython
- no disclaimers

Content rules:
- every idea is programming-related and different from the others

Output rules:
- valid JSON only, no markdown, no explanations, no extra text

Now generate {count} video ideas."#
    );

    Prompt {
        system: IDEA_SYSTEM_INSTRUCTION.to_string(),
        user,
        shape: Shape::IdeaList,
        temperature: 0.9,
        max_tokens: 4000,
    }
}

/// Prompt asking for a narrated tutorial script for one idea.
pub fn script_prompt(idea: &IdeaRecord) -> Prompt {
    let topic = idea.title.trim().replace('"', "'");
    let user = format!(
        r#"You write TikTok-style one-minute Python tutorials.
The video topic is: "{topic}"

Write a step-by-step Python tutorial script meant to be read aloud by a text-to-speech voice.

1. The FIRST step is the hook. Its code_snippet MUST be the empty string "".
   - Under 15 words, present tense, shocking outcome ("I just deleted 10,000 files in two seconds with Python.")
   - Use specific numbers where possible. Make it feel immediate and real.
2. Every later step teaches one small addition (1-3 lines):
   - voiceover: short and direct ("First we import this", "Now add this line")
   - code_snippet: ALL the code so far, cumulative from the first line to this step
3. closer: one or two sentences, understated confidence, a quick nod to how fast it was, and a call to action ("Follow for daily Python tricks").
4. full_script: the complete program, identical to the last step's code_snippet.

Voiceover text uses plain punctuation only: no emojis, no ellipses.
Use real libraries that fit the topic and keep the code runnable and beginner-friendly.

JSON formatting:
- escape quotes inside code as \" and backslashes as \\
- double quotes only, no trailing commas

Return exactly this structure:
{{
  "tts_script": [
    {{ "voiceover": "HOOK under 15 words", "code_snippet": "" }},
    {{ "voiceover": "First we import the library", "code_snippet": "import requests" }},
    {{ "voiceover": "Now we make the request", "code_snippet": "import requests\nresponse = requests.get(\"https://example.com\")" }}
  ],
  "closer": "That's it. Under a minute. Follow for daily Python tricks.",
  "full_script": "import requests\nresponse = requests.get(\"https://example.com\")"
}}

Output JSON only."#
    );

    Prompt {
        system: SCRIPT_SYSTEM_INSTRUCTION.to_string(),
        user,
        shape: Shape::TutorialScript,
        temperature: 0.8,
        max_tokens: 3000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idea_count_is_clamped() {
        assert_eq!(clamp_idea_count(0), 1);
        assert_eq!(clamp_idea_count(7), 7);
        assert_eq!(clamp_idea_count(40), 15);
        assert!(idea_prompt(40).user.contains("Generate 15 Python video ideas"));
    }

    #[test]
    fn test_prompts_carry_their_shape() {
        assert_eq!(idea_prompt(3).shape, Shape::IdeaList);
        let script = script_prompt(&IdeaRecord::new("Lock your screen with \"one\" line", ""));
        assert_eq!(script.shape, Shape::TutorialScript);
        assert!(script.user.contains("\"Lock your screen with 'one' line\""));
    }

    #[test]
    fn test_example_structures_are_literal_braces() {
        let prompt = script_prompt(&IdeaRecord::new("x", ""));
        assert!(prompt.user.contains("\"tts_script\": ["));
        assert!(!prompt.user.contains("{{"));
    }
}
