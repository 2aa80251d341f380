//! Prompt loader for the built-in RAG prompt and YAML overrides.

use crate::types::PromptDefinition;
use docqa_core::{AppError, AppResult};
use regex::Regex;
use std::path::Path;

/// Template variables every RAG prompt must reference.
pub const REQUIRED_VARIABLES: [&str; 2] = ["context", "question"];

const RAG_TEMPLATE: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\
Question: {{question}} \nContext: {{context}} \nAnswer:";

/// The built-in RAG prompt.
pub fn default_rag_prompt() -> PromptDefinition {
    PromptDefinition {
        id: "rag.default".to_string(),
        title: "Retrieval-augmented answer".to_string(),
        api_version: "1.0".to_string(),
        created_by: "docqa".to_string(),
        system: None,
        template: RAG_TEMPLATE.to_string(),
    }
}

/// Load a prompt definition from a YAML file.
///
/// # Example
/// ```no_run
/// use docqa_prompt::load_prompt_file;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt_file(Path::new(".docqa/prompts/strict.yml"))?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt_file(path: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            path
        )));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Validate a prompt definition.
pub fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    for variable in REQUIRED_VARIABLES {
        if !references_variable(&def.template, variable)? {
            return Err(AppError::Prompt(format!(
                "Prompt '{}' does not reference {{{{{}}}}}",
                def.id, variable
            )));
        }
    }

    Ok(())
}

fn references_variable(template: &str, variable: &str) -> AppResult<bool> {
    let pattern = format!(r"\{{\{{\{{?~?\s*{}\s*~?\}}?\}}\}}", regex::escape(variable));
    let re = Regex::new(&pattern)
        .map_err(|e| AppError::Prompt(format!("Invalid variable pattern: {}", e)))?;
    Ok(re.is_match(template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, template: &str) -> std::path::PathBuf {
        let content = format!(
            "id: rag.custom\ntitle: \"Custom\"\napiVersion: \"1.0\"\ntemplate: {:?}\n",
            template
        );
        let path = dir.join("custom.yml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_prompt_is_valid() {
        assert!(validate_prompt(&default_rag_prompt()).is_ok());
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_prompt(
            temp_dir.path(),
            "Context:\n{{ context }}\n\nQ: {{question}}\nAnswer:",
        );

        let prompt = load_prompt_file(&path).unwrap();
        assert_eq!(prompt.id, "rag.custom");
        assert_eq!(prompt.title, "Custom");
    }

    #[test]
    fn test_reject_template_without_context() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_prompt(temp_dir.path(), "Just answer {{question}}");

        let err = load_prompt_file(&path).unwrap_err();
        assert!(err.to_string().contains("{{context}}"));
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt_file(&temp_dir.path().join("missing.yml")).is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.yml");
        fs::write(&path, "invalid: yaml: content:").unwrap();

        assert!(load_prompt_file(&path).is_err());
    }

    #[test]
    fn test_references_variable_forms() {
        assert!(references_variable("{{context}}", "context").unwrap());
        assert!(references_variable("{{{context}}}", "context").unwrap());
        assert!(references_variable("{{~ context ~}}", "context").unwrap());
        assert!(!references_variable("context only", "context").unwrap());
        assert!(!references_variable("{{contexts}}", "context").unwrap());
    }
}
