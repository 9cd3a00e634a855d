//! Prompt construction and model output parsing, shared by all providers.

use codevoice_core::generation::{GenerationKind, GenerationRequest};

use super::GenerationError;

/// Build the model prompt for a request.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let mut context = String::new();
    if let Some(language) = &request.language {
        context.push_str(&format!("- Language: {language}\n"));
    }
    if let Some(framework) = &request.framework {
        context.push_str(&format!("- Framework: {framework}\n"));
    }
    if !request.features.is_empty() {
        context.push_str(&format!("- Features: {}\n", request.features.join(", ")));
    }

    let code_block = |code: &str| {
        let lang = request.language.as_deref().unwrap_or("");
        format!("```{lang}\n{code}\n```")
    };

    match request.kind {
        GenerationKind::Generate => format!(
            "You are an expert software engineer. Write code for the following request.\n\n\
             Request: {spec}\n{context}\n\
             Respond with ONLY a JSON object of the form \
             {{\"code\": \"...\", \"language\": \"...\", \"explanation\": \"...\"}}.",
            spec = request.spec,
        ),
        GenerationKind::Project => format!(
            "You are an expert software architect. Generate a complete project structure.\n\n\
             Description: {spec}\n{context}\n\
             Respond with ONLY a JSON object of the form:\n\
             {{\n  \"project_structure\": {{\n    \"folders\": [\"src\"],\n    \
             \"files\": {{ \"path\": {{ \"content\": \"...\", \"description\": \"...\" }} }}\n  }},\n  \
             \"setup_instructions\": [\"...\"],\n  \
             \"recommended_dependencies\": {{ \"production\": [], \"development\": [] }},\n  \
             \"environment_variables\": {{}},\n  \"scripts\": {{}},\n  \
             \"architecture_notes\": \"...\"\n}}\n\
             Include a README.md. Generate ONLY the JSON response, no additional text.",
            spec = request.spec,
        ),
        GenerationKind::Explain => format!(
            "Explain what the following code does and how it works.\n\
             Focus: {spec}\n{context}\n{code}\n\n\
             Be concise. Prefer bullet points.",
            spec = request.spec,
            code = code_block(request.code.as_deref().unwrap_or_default()),
        ),
        GenerationKind::Debug => format!(
            "Find the bugs in the following code and propose a minimal fix.\n\
             Problem: {spec}\n{context}\n{code}\n\n\
             Respond with a JSON object of the form \
             {{\"issues\": [\"...\"], \"fixed_code\": \"...\", \"explanation\": \"...\"}}.",
            spec = request.spec,
            code = code_block(request.code.as_deref().unwrap_or_default()),
        ),
    }
}

/// Strip a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `rust`, ...) on the opening line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Turn raw model text into the task result.
///
/// JSON output is returned as-is. Other output is wrapped as
/// `{"text": ...}`, except for `project` requests, which must produce a
/// JSON object.
pub fn parse_output(
    kind: GenerationKind,
    text: &str,
) -> Result<serde_json::Value, GenerationError> {
    let body = strip_fences(text);
    if body.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "model returned no text".into(),
        ));
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value @ serde_json::Value::Object(_)) => Ok(value),
        Ok(_) | Err(_) if kind == GenerationKind::Project => Err(
            GenerationError::MalformedResponse("project output is not a JSON object".into()),
        ),
        Ok(value) => Ok(value),
        Err(_) => Ok(serde_json::json!({ "text": body })),
    }
}
