//! Prompt Builder — turns source text + schema into a completion payload.
//!
//! Pure functions. The only candidate-dependent bit is the structured-output hint.

use serde::{Deserialize, Serialize};

use crate::extraction::prompts::{
    EXTRACTION_PROMPT_V1, REWRITE_BULLET_PROMPT, REWRITE_SUMMARY_PROMPT,
};
use crate::llm_client::candidates::Candidate;
use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, PLAIN_TEXT_INSTRUCTION};
use crate::llm_client::{CompletionPayload, Content, GenerationConfig, Part};

const EXTRACTION_TEMPERATURE: f32 = 0.1;
const REWRITE_TEMPERATURE: f32 = 0.3;
const MAX_OUTPUT_TOKENS: u32 = 8192;
const JSON_MIME_TYPE: &str = "application/json";

/// Identifier of the target structured shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    #[default]
    V1,
}

impl SchemaVersion {
    fn template(self) -> &'static str {
        match self {
            SchemaVersion::V1 => EXTRACTION_PROMPT_V1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteKind {
    Bullet,
    #[default]
    Summary,
}

/// Candidate-independent part of a request. Built once per call.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub temperature: f32,
    /// Whether the answer is expected to be a JSON object.
    pub structured: bool,
}

/// Instruction first, source text appended verbatim.
pub fn extraction_prompt(source_text: &str, schema: SchemaVersion) -> Prompt {
    let instruction = schema
        .template()
        .replace("{json_only}", JSON_ONLY_INSTRUCTION);
    Prompt {
        text: format!("{instruction}{source_text}"),
        temperature: EXTRACTION_TEMPERATURE,
        structured: true,
    }
}

pub fn rewrite_prompt(text: &str, kind: RewriteKind) -> Prompt {
    let instruction = match kind {
        RewriteKind::Bullet => REWRITE_BULLET_PROMPT,
        RewriteKind::Summary => REWRITE_SUMMARY_PROMPT,
    };
    Prompt {
        text: format!("{instruction} {PLAIN_TEXT_INSTRUCTION}\n\nTEXT:\n\"{text}\""),
        temperature: REWRITE_TEMPERATURE,
        structured: false,
    }
}

/// Builds the wire payload for one candidate.
pub fn build_payload(prompt: &Prompt, candidate: &Candidate) -> CompletionPayload {
    let response_mime_type = (prompt.structured && candidate.supports_structured_output_hint)
        .then(|| JSON_MIME_TYPE.to_string());

    CompletionPayload {
        contents: vec![Content {
            parts: vec![Part {
                text: Some(prompt.text.clone()),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: prompt.temperature,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            response_mime_type,
        },
    }
}
