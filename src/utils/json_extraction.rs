//! JSON extraction utilities for parsing LLM responses.
//!
//! Models are asked to answer with a bare JSON object but frequently wrap it in
//! a markdown fence or surround it with prose. The extraction functions try
//! the following strategies in order:
//! 1. Direct JSON (content starts with '{')
//! 2. JSON in a ```json fenced block
//! 3. JSON in a generic fenced block
//! 4. The first balanced JSON object anywhere in the content
//!
//! # Example
//!
//! ```
//! use ps_forge::utils::json_extraction::extract_json_object;
//!
//! let response = "Sure! Here it is:\n```json\n{\"title\": \"Paths\"}\n```";
//! let json = extract_json_object(response).unwrap();
//! assert_eq!(json, "{\"title\": \"Paths\"}");
//! ```

use regex::Regex;
use thiserror::Error;

const PREVIEW_LEN: usize = 80;

/// Error type for JSON extraction failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated: {unclosed_braces} unclosed braces. Partial: {partial_preview}...")]
    Truncated {
        partial_preview: String,
        unclosed_braces: usize,
    },
    #[error("No JSON object found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

/// Extracts the first complete JSON object from an LLM response.
///
/// # Errors
///
/// Returns [`JsonExtractionError::Truncated`] when an object starts but never
/// closes (typically a response cut off by the token limit), and
/// [`JsonExtractionError::NotFound`] when no object is present at all.
pub fn extract_json_object(content: &str) -> Result<String, JsonExtractionError> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') {
        if let Some(end) = find_matching_brace(trimmed) {
            return Ok(trimmed[..=end].to_string());
        }
    }

    if let Some(json) = extract_from_json_code_block(trimmed) {
        return Ok(json);
    }

    if let Some(json) = extract_from_generic_code_block(trimmed) {
        return Ok(json);
    }

    if let Some(start) = trimmed.find('{') {
        let candidate = &trimmed[start..];
        if let Some(end) = find_matching_brace(candidate) {
            return Ok(candidate[..=end].to_string());
        }
        return Err(JsonExtractionError::Truncated {
            partial_preview: preview(candidate),
            unclosed_braces: count_unclosed_braces(candidate),
        });
    }

    Err(JsonExtractionError::NotFound {
        content_preview: preview(trimmed),
    })
}

/// Finds the index of the brace closing the object that starts at `s[0]`.
///
/// Braces inside string literals (including escaped quotes) are ignored.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Extracts an object from a ```json fenced block.
pub fn extract_from_json_code_block(content: &str) -> Option<String> {
    let re = Regex::new(r"```json\s*\n?([\s\S]*?)\n?```").ok()?;
    let caps = re.captures(content)?;
    balanced_object(caps.get(1)?.as_str())
}

/// Extracts an object from the first generic ``` fenced block that holds one.
pub fn extract_from_generic_code_block(content: &str) -> Option<String> {
    let re = Regex::new(r"```[a-zA-Z]*\s*\n?([\s\S]*?)\n?```").ok()?;
    let found = re
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| balanced_object(m.as_str()));
    found
}

fn balanced_object(block: &str) -> Option<String> {
    let block = block.trim();
    if !block.starts_with('{') {
        return None;
    }
    find_matching_brace(block).map(|end| block[..=end].to_string())
}

fn count_unclosed_braces(s: &str) -> usize {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    depth
}

fn preview(s: &str) -> String {
    s.chars().take(PREVIEW_LEN).collect()
}
