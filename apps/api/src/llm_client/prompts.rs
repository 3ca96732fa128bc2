// Shared prompt fragments used by every flow that talks to the completion service.
// Each flow defines its own templates alongside it (see extraction/prompts.rs).

/// Instruction fragment that enforces a single JSON object as the whole answer.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    You MUST respond with exactly one valid JSON object. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction fragment for plain-text rewrites shown verbatim in the CV.
pub const PLAIN_TEXT_INSTRUCTION: &str = "\
    Return ONLY the final text. No markdown, no bold, no quotes, \
    no introductory sentence.";
