#![deny(missing_docs)]
//! Output parser — turns the raw text an LLM returns for one ReAct turn
//! into a structured [`ParsedOutput`], plus a handful of independent value
//! parsers (JSON, list, boolean, enum) the tool layer and structured-output
//! callers can use directly.
//!
//! Parsing here is a fixed, ordered sequence of strategies with a named
//! error variant at the end — never a silent fallback that swallows
//! structure.

use agentkit_core::AgentError;

const FINAL_ANSWER_PREFIX: &str = "Final Answer:";
const ACTION_PREFIX: &str = "Action:";
const ACTION_INPUT_PREFIX: &str = "Action Input:";

/// The three things a ReAct turn can resolve to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    /// The model produced its final answer; the loop should terminate.
    FinalAnswer {
        /// The answer text (everything from the `Final Answer:` line onward).
        text: String,
    },
    /// The model chose to invoke a tool.
    Action {
        /// Tool name, trimmed, matched against the caller's registry.
        tool_name: String,
        /// The input: a JSON object if `Action Input:` was valid JSON,
        /// otherwise the raw trimmed string.
        action_input: serde_json::Value,
    },
    /// Neither pattern was found, or the patterns found don't form a
    /// complete, resolvable action.
    ParseError {
        /// Why classification failed.
        reason: String,
        /// The raw text that was classified.
        raw: String,
    },
}

/// Parse one ReAct turn's raw LLM text.
///
/// `known_tools` is the caller's tool registry's name list — an `Action`
/// naming a tool outside it is a [`ParsedOutput::ParseError`], not an
/// `Action`. If both a `Final Answer:` line and an `Action:` line appear,
/// `Final Answer` wins. Labels are matched case-sensitively; surrounding
/// whitespace on each line is tolerated.
pub fn parse_react_output(text: &str, known_tools: &[&str]) -> ParsedOutput {
    let lines: Vec<&str> = text.lines().collect();

    if let Some(final_idx) = lines.iter().position(|line| line.trim_start().starts_with(FINAL_ANSWER_PREFIX)) {
        let first = lines[final_idx].trim_start().strip_prefix(FINAL_ANSWER_PREFIX).unwrap_or("").trim_start();
        let mut answer = first.to_string();
        for line in &lines[final_idx + 1..] {
            answer.push('\n');
            answer.push_str(line);
        }
        return ParsedOutput::FinalAnswer { text: answer.trim().to_string() };
    }

    let action_idx = lines.iter().position(|line| line.trim_start().starts_with(ACTION_PREFIX));
    let Some(action_idx) = action_idx else {
        return ParsedOutput::ParseError {
            reason: "no Final Answer or Action line found".to_string(),
            raw: text.to_string(),
        };
    };

    let tool_name = lines[action_idx].trim_start().strip_prefix(ACTION_PREFIX).unwrap_or("").trim().to_string();

    let action_input_idx = lines.iter().position(|line| line.trim_start().starts_with(ACTION_INPUT_PREFIX));
    let Some(action_input_idx) = action_input_idx else {
        return ParsedOutput::ParseError {
            reason: "Action line without a matching Action Input line".to_string(),
            raw: text.to_string(),
        };
    };

    if !known_tools.contains(&tool_name.as_str()) {
        return ParsedOutput::ParseError { reason: format!("unknown tool: {tool_name}"), raw: text.to_string() };
    }

    let payload =
        lines[action_input_idx].trim_start().strip_prefix(ACTION_INPUT_PREFIX).unwrap_or("").trim().to_string();

    let action_input = match serde_json::from_str::<serde_json::Value>(&payload) {
        Ok(value) => value,
        Err(_) => serde_json::Value::String(payload),
    };

    ParsedOutput::Action { tool_name, action_input }
}

/// Parse a standalone JSON value from arbitrary model output.
pub fn parse_json(text: &str) -> Result<serde_json::Value, AgentError> {
    serde_json::from_str(text.trim()).map_err(|e| AgentError::parse(format!("invalid JSON: {e}"), text))
}

/// Parse a newline- or comma-separated list, tolerating `-`/`*` bullet
/// markers. Falls back to a JSON array if the text parses as one.
pub fn parse_list(text: &str) -> Result<Vec<String>, AgentError> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return Ok(items
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect());
        }
    }

    let items: Vec<String> = trimmed
        .lines()
        .flat_map(|line| line.split(','))
        .map(|item| item.trim().trim_start_matches(['-', '*']).trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    if items.is_empty() {
        return Err(AgentError::parse("no list items found", text));
    }
    Ok(items)
}

/// Parse a boolean from common model phrasings (`true`/`false`, `yes`/`no`,
/// `1`/`0`), case-insensitively.
pub fn parse_bool(text: &str) -> Result<bool, AgentError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(AgentError::parse(format!("not a boolean: {text:?}"), text)),
    }
}

/// Match model output against a fixed set of enum variants, case-insensitively.
/// Returns the canonical variant spelling from `variants` on success.
pub fn parse_enum(text: &str, variants: &[&str]) -> Result<String, AgentError> {
    let trimmed = text.trim();
    variants
        .iter()
        .find(|v| v.eq_ignore_ascii_case(trimmed))
        .map(|v| v.to_string())
        .ok_or_else(|| AgentError::parse(format!("not one of {variants:?}"), text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOOLS: &[&str] = &["calculator", "search"];

    #[test]
    fn final_answer_wins_over_action() {
        let text = "Thought: done\nAction: calculator\nAction Input: {}\nFinal Answer: 42";
        assert_eq!(parse_react_output(text, TOOLS), ParsedOutput::FinalAnswer { text: "42".to_string() });
    }

    #[test]
    fn final_answer_spans_to_end_of_text() {
        let text = "Final Answer: line one\nline two";
        match parse_react_output(text, TOOLS) {
            ParsedOutput::FinalAnswer { text } => assert_eq!(text, "line one\nline two"),
            other => panic!("expected FinalAnswer, got {other:?}"),
        }
    }

    #[test]
    fn action_with_json_input_is_parsed_as_a_map() {
        let text = "Thought: compute\nAction: calculator\nAction Input: {\"expr\":\"15*7\"}";
        match parse_react_output(text, TOOLS) {
            ParsedOutput::Action { tool_name, action_input } => {
                assert_eq!(tool_name, "calculator");
                assert_eq!(action_input, serde_json::json!({"expr": "15*7"}));
            }
            other => panic!("expected Action, got {other:?}"),
        }
    }

    #[test]
    fn action_with_non_json_input_is_delivered_as_a_string() {
        let text = "Action: search\nAction Input: rust async book";
        match parse_react_output(text, TOOLS) {
            ParsedOutput::Action { action_input, .. } => {
                assert_eq!(action_input, serde_json::Value::String("rust async book".to_string()));
            }
            other => panic!("expected Action, got {other:?}"),
        }
    }

    #[test]
    fn action_naming_an_unregistered_tool_is_a_parse_error() {
        let text = "Action: teleport\nAction Input: {}";
        assert!(matches!(parse_react_output(text, TOOLS), ParsedOutput::ParseError { .. }));
    }

    #[test]
    fn action_without_action_input_is_a_parse_error() {
        let text = "Action: calculator\nno input here";
        assert!(matches!(parse_react_output(text, TOOLS), ParsedOutput::ParseError { .. }));
    }

    #[test]
    fn neither_pattern_is_a_parse_error() {
        let text = "I am thinking about this.";
        assert!(matches!(parse_react_output(text, TOOLS), ParsedOutput::ParseError { .. }));
    }

    #[test]
    fn whitespace_around_labels_is_tolerated() {
        let text = "  Final Answer:   padded   ";
        assert_eq!(parse_react_output(text, TOOLS), ParsedOutput::FinalAnswer { text: "padded".to_string() });
    }

    #[test]
    fn labels_are_case_sensitive() {
        let text = "final answer: nope\nAction: search\nAction Input: x";
        // lowercase "final answer:" doesn't match the prefix, so this falls through to Action.
        assert!(matches!(parse_react_output(text, TOOLS), ParsedOutput::Action { .. }));
    }

    #[test]
    fn json_list_and_bulleted_list_both_parse() {
        assert_eq!(parse_list("[\"a\", \"b\"]").unwrap(), vec!["a", "b"]);
        assert_eq!(parse_list("- a\n- b\n- c").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn bool_accepts_common_phrasings() {
        assert!(parse_bool("Yes").unwrap());
        assert!(!parse_bool("no").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn enum_matches_case_insensitively_and_returns_canonical_spelling() {
        assert_eq!(parse_enum("HIGH", &["low", "medium", "high"]).unwrap(), "high");
        assert!(parse_enum("extreme", &["low", "medium", "high"]).is_err());
    }
}
