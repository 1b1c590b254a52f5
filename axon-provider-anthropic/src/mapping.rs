//! Request/response mapping between axon types and the Anthropic Messages
//! API format.
//!
//! Reference: <https://docs.anthropic.com/en/api/messages>

use axon_types::{
    ArgSpec, ArgType, ModelTurn, ProviderError, ReasoningBlock, TokenUsage, ToolCallRequest,
    ToolDecl, ToolOutcome,
};
use serde_json::{Value, json};

/// Convert one declared argument into its JSON Schema property.
fn arg_schema(arg: &ArgSpec) -> Value {
    let type_name = match arg.arg_type {
        ArgType::Text => "string",
        ArgType::Integer => "integer",
        ArgType::Real => "number",
        ArgType::Boolean => "boolean",
    };
    let mut schema = json!({
        "type": type_name,
        "description": arg.description,
    });
    if let Some(values) = &arg.allowed_values {
        let mut sorted = values.clone();
        sorted.sort();
        schema["enum"] = json!(sorted);
    }
    schema
}

/// Convert one tool declaration into Anthropic's tool schema object,
/// preserving required/optional and text enums.
pub(crate) fn tool_schema(tool: &ToolDecl) -> Value {
    let properties: serde_json::Map<String, Value> = tool
        .args
        .iter()
        .map(|arg| (arg.name.clone(), arg_schema(arg)))
        .collect();
    let required: Vec<&str> = tool
        .args
        .iter()
        .filter(|arg| !arg.optional)
        .map(|arg| arg.name.as_str())
        .collect();
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": {
            "type": "object",
            "properties": properties,
            "required": required,
        },
    })
}

/// Build the Messages API request body over the replay conversation.
pub(crate) fn request_body(
    model: &str,
    system: &str,
    messages: &[Value],
    tools: &[Value],
    max_tokens: u32,
    thinking_budget: Option<u32>,
) -> Value {
    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": messages,
    });
    if !system.is_empty() {
        body["system"] = json!(system);
    }
    if !tools.is_empty() {
        body["tools"] = json!(tools);
    }
    if let Some(budget) = thinking_budget {
        body["thinking"] = json!({
            "type": "enabled",
            "budget_tokens": budget,
        });
    }
    body
}

/// The user-role message carrying one turn's aggregated tool results.
pub(crate) fn tool_results_message(results: &[ToolOutcome]) -> Value {
    let blocks: Vec<Value> = results
        .iter()
        .map(|r| {
            json!({
                "type": "tool_result",
                "tool_use_id": r.tool_use_id,
                "content": r.output,
                "is_error": r.is_error,
            })
        })
        .collect();
    json!({ "role": "user", "content": blocks })
}

/// One parsed Messages API reply.
#[derive(Debug)]
pub(crate) struct ParsedResponse {
    /// Parsed turn for the agent loop.
    pub turn: ModelTurn,
    /// The assistant content blocks, verbatim, for the replay
    /// conversation. Thinking blocks and their signatures must be echoed
    /// back unmodified or the chain is lost across cycles.
    pub assistant_content: Value,
    /// Usage delta reported for this call.
    pub usage: TokenUsage,
}

/// Parse a Messages API reply into reasoning markers, text, and tool
/// requests.
pub(crate) fn parse_response(response: &Value) -> Result<ParsedResponse, ProviderError> {
    if let Some("max_tokens") = response["stop_reason"].as_str() {
        return Err(ProviderError::InvalidResponse(
            "response truncated at max_tokens".into(),
        ));
    }

    let content = response["content"]
        .as_array()
        .ok_or_else(|| ProviderError::InvalidResponse("response missing content array".into()))?;

    let mut reasoning = Vec::new();
    let mut text_chunks: Vec<&str> = Vec::new();
    let mut tool_calls = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(text) = block["text"].as_str() {
                    if !text.trim().is_empty() {
                        text_chunks.push(text);
                    }
                }
            }
            Some("thinking") => {
                reasoning.push(ReasoningBlock {
                    content: block["thinking"].as_str().unwrap_or_default().to_string(),
                    redacted: false,
                    signature: block["signature"].as_str().map(str::to_string),
                });
            }
            Some("redacted_thinking") => {
                // Content is hidden; the opaque data blob is the signature
                // that keeps the chain intact.
                reasoning.push(ReasoningBlock {
                    content: String::new(),
                    redacted: true,
                    signature: block["data"].as_str().map(str::to_string),
                });
            }
            Some("tool_use") => {
                let id = block["id"]
                    .as_str()
                    .ok_or_else(|| {
                        ProviderError::InvalidResponse("tool_use block missing id".into())
                    })?
                    .to_string();
                let name = block["name"]
                    .as_str()
                    .ok_or_else(|| {
                        ProviderError::InvalidResponse("tool_use block missing name".into())
                    })?
                    .to_string();
                tool_calls.push(ToolCallRequest {
                    tool_use_id: id,
                    tool_name: name,
                    args: block["input"].clone(),
                });
            }
            _ => {}
        }
    }

    let usage = parse_usage(&response["usage"])?;

    Ok(ParsedResponse {
        turn: ModelTurn {
            reasoning,
            text: text_chunks.join("\n"),
            tool_calls,
        },
        assistant_content: response["content"].clone(),
        usage,
    })
}

fn parse_usage(usage: &Value) -> Result<TokenUsage, ProviderError> {
    let input = usage["input_tokens"]
        .as_u64()
        .ok_or_else(|| ProviderError::InvalidResponse("usage missing input_tokens".into()))?;
    let output = usage["output_tokens"]
        .as_u64()
        .ok_or_else(|| ProviderError::InvalidResponse("usage missing output_tokens".into()))?;
    let cache_read = usage["cache_read_input_tokens"].as_u64().unwrap_or(0);

    // Anthropic reports cache reads separately from input_tokens.
    Ok(TokenUsage {
        input_tokens_total: input + cache_read,
        input_tokens_regular: input,
        input_tokens_cache_read: cache_read,
        output_tokens_total: output,
        output_tokens_text: None,
        output_tokens_reasoning: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl() -> ToolDecl {
        ToolDecl {
            name: "view_file".into(),
            description: "Read a file.".into(),
            args: vec![
                ArgSpec::new("path", ArgType::Text, "absolute path"),
                ArgSpec::new("limit", ArgType::Integer, "max lines").optional(),
                ArgSpec::new("mode", ArgType::Text, "read mode").allowed(["full", "head"]),
            ],
        }
    }

    #[test]
    fn tool_schema_preserves_required_and_enums() {
        let schema = tool_schema(&decl());
        assert_eq!(schema["name"], "view_file");
        assert_eq!(schema["input_schema"]["properties"]["path"]["type"], "string");
        assert_eq!(schema["input_schema"]["properties"]["limit"]["type"], "integer");
        assert_eq!(
            schema["input_schema"]["properties"]["mode"]["enum"],
            json!(["full", "head"])
        );
        assert_eq!(schema["input_schema"]["required"], json!(["path", "mode"]));
    }

    #[test]
    fn request_body_shape() {
        let tools = vec![tool_schema(&decl())];
        let messages = vec![json!({"role": "user", "content": "hello"})];
        let body = request_body("claude-opus-4-1-20250805", "be terse", &messages, &tools, 4096, Some(2048));
        assert_eq!(body["model"], "claude-opus-4-1-20250805");
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["thinking"]["budget_tokens"], 2048);
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn request_body_omits_empty_sections() {
        let body = request_body("m", "", &[], &[], 1024, None);
        assert!(body.get("system").is_none());
        assert!(body.get("tools").is_none());
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn parse_text_response() {
        let parsed = parse_response(&json!({
            "content": [{"type": "text", "text": "Hello!"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5},
        }))
        .unwrap();
        assert!(parsed.turn.is_final());
        assert_eq!(parsed.turn.text, "Hello!");
        assert_eq!(parsed.usage.input_tokens_total, 10);
        assert_eq!(parsed.usage.output_tokens_total, 5);
    }

    #[test]
    fn parse_tool_use_response() {
        let parsed = parse_response(&json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "tu_1", "name": "view_file",
                 "input": {"path": "/tmp/x"}},
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 20, "output_tokens": 30},
        }))
        .unwrap();
        assert_eq!(parsed.turn.tool_calls.len(), 1);
        assert_eq!(parsed.turn.tool_calls[0].tool_use_id, "tu_1");
        assert_eq!(parsed.turn.tool_calls[0].tool_name, "view_file");
        assert_eq!(parsed.turn.tool_calls[0].args["path"], "/tmp/x");
    }

    #[test]
    fn parse_thinking_blocks() {
        let parsed = parse_response(&json!({
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "sig-a"},
                {"type": "redacted_thinking", "data": "blob-b"},
                {"type": "text", "text": "Answer."},
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 1},
        }))
        .unwrap();
        assert_eq!(parsed.turn.reasoning.len(), 2);
        assert_eq!(parsed.turn.reasoning[0].content, "hmm");
        assert_eq!(parsed.turn.reasoning[0].signature.as_deref(), Some("sig-a"));
        assert!(!parsed.turn.reasoning[0].redacted);
        assert!(parsed.turn.reasoning[1].redacted);
        assert_eq!(parsed.turn.reasoning[1].signature.as_deref(), Some("blob-b"));
        assert!(parsed.turn.reasoning[1].content.is_empty());
        // The raw content is preserved verbatim for replay.
        assert_eq!(parsed.assistant_content.as_array().unwrap().len(), 3);
    }

    #[test]
    fn parse_cache_read_tokens() {
        let parsed = parse_response(&json!({
            "content": [{"type": "text", "text": "cached"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 100, "output_tokens": 10,
                      "cache_read_input_tokens": 40},
        }))
        .unwrap();
        assert_eq!(parsed.usage.input_tokens_regular, 100);
        assert_eq!(parsed.usage.input_tokens_cache_read, 40);
        assert_eq!(parsed.usage.input_tokens_total, 140);
    }

    #[test]
    fn parse_max_tokens_is_an_error() {
        let err = parse_response(&json!({
            "content": [{"type": "text", "text": "trunca"}],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 1, "output_tokens": 1},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn parse_missing_usage_is_an_error() {
        let err = parse_response(&json!({
            "content": [{"type": "text", "text": "x"}],
            "stop_reason": "end_turn",
            "usage": {},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("input_tokens"));
    }

    #[test]
    fn tool_results_aggregate_into_one_user_message() {
        let message = tool_results_message(&[
            ToolOutcome {
                tool_use_id: "tu_1".into(),
                tool_name: "a".into(),
                output: "ok".into(),
                is_error: false,
            },
            ToolOutcome {
                tool_use_id: "tu_2".into(),
                tool_name: "b".into(),
                output: "boom".into(),
                is_error: true,
            },
        ]);
        assert_eq!(message["role"], "user");
        let blocks = message["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["tool_use_id"], "tu_1");
        assert_eq!(blocks[0]["is_error"], false);
        assert_eq!(blocks[1]["tool_use_id"], "tu_2");
        assert_eq!(blocks[1]["is_error"], true);
    }

    #[test]
    fn multiple_text_blocks_join_with_newline() {
        let parsed = parse_response(&json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "  "},
                {"type": "text", "text": "second"},
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 1},
        }))
        .unwrap();
        assert_eq!(parsed.turn.text, "first\nsecond");
    }
}
