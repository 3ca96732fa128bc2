// Extraction and rewrite prompt templates.
// The schema description is versioned: bump SchemaVersion when the output shape changes.

pub const EXTRACTION_PROMPT_V1: &str = r#"You are an expert technical recruiter. Analyze the CV text below and extract its data.

{json_only}

OUTPUT SCHEMA (return exactly this structure):
{
  "profile": {
    "firstname": "string",
    "lastname": "string",
    "current_role": "string",
    "years_experience": "string",
    "main_tech": "string",
    "summary": "string"
  },
  "experiences": [
    {
      "client_name": "string",
      "period": "string",
      "role": "string",
      "context": "string",
      "phases": "string",
      "tech_stack": ["string"]
    }
  ],
  "education": [ { "year": "string", "degree": "string", "location": "string" } ],
  "certifications": [ { "name": "string", "issuer": "string", "year": "string" } ],
  "skills_categories": {
    "Category name": [ { "name": "string", "rating": 1-5 } ]
  }
}

RULES:
1. Use an empty string for any profile field the CV does not mention.
2. List experiences most recent first.
3. Group skills by category; rate each from 1 (notions) to 5 (expert).

CV TEXT:
"#;

pub const REWRITE_BULLET_PROMPT: &str = "\
Rephrase this achievement for a CV as action + result. Be direct and professional.";

pub const REWRITE_SUMMARY_PROMPT: &str = "\
Rephrase this summary for a consultant CV. Corporate, punchy tone.";
