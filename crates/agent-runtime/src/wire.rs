//! Gemini wire model shared by the REST and live clients.

use agent_core::{
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, TokenUsage},
    tool::{ToolArgs, ToolCall, ToolSchema},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    /// Set on "thinking" parts, which are never shown to the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclaration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_declarations: Option<Vec<FunctionDeclaration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<Value>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,
    pub generation_config: GenerationConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    pub web_search_queries: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: Option<u32>,
    #[serde(default)]
    pub candidates_token_count: Option<u32>,
    #[serde(default)]
    pub total_token_count: Option<u32>,
}

impl From<&UsageMetadata> for TokenUsage {
    fn from(u: &UsageMetadata) -> Self {
        let prompt = u.prompt_token_count.unwrap_or(0);
        let completion = u.candidates_token_count.unwrap_or(0);
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: u.total_token_count.unwrap_or(prompt + completion),
        }
    }
}

/// `{"error": {...}}` body returned with non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Split messages into the system instruction and the turn list.
///
/// Consecutive turns with the same role are merged, since the API rejects
/// back-to-back turns from one side (e.g. several function responses).
pub fn to_contents(messages: &[Message]) -> (Option<Content>, Vec<Content>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let system_instruction = (!system.is_empty()).then(|| Content::text(None, system.join("\n\n")));

    let mut contents: Vec<Content> = Vec::new();
    for message in messages.iter().filter(|m| m.role != Role::System) {
        let content = to_content(message);
        match contents.last_mut() {
            Some(last) if last.role == content.role => last.parts.extend(content.parts),
            _ => contents.push(content),
        }
    }

    (system_instruction, contents)
}

/// One message as a content turn
pub fn to_content(message: &Message) -> Content {
    match message.role {
        Role::System | Role::User => Content::text(Some("user"), message.content.clone()),
        Role::Assistant => {
            let mut parts = Vec::new();
            if !message.content.is_empty() {
                parts.push(Part::text(message.content.clone()));
            }
            parts.extend(message.tool_calls.iter().map(|call| Part {
                function_call: Some(FunctionCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    args: Value::Object(call.arguments.clone().into_iter().collect()),
                }),
                ..Default::default()
            }));
            Content {
                role: Some("model".into()),
                parts,
            }
        }
        Role::Tool => {
            let response = match serde_json::from_str::<Value>(&message.content) {
                Ok(value @ Value::Object(_)) => value,
                _ => json!({ "result": message.content }),
            };
            Content {
                role: Some("user".into()),
                parts: vec![Part {
                    function_response: Some(FunctionResponse {
                        id: message.tool_call_id().map(str::to_string),
                        name: message.name.clone().unwrap_or_else(|| "tool".into()),
                        response,
                    }),
                    ..Default::default()
                }],
            }
        }
    }
}

/// Function declarations for the registered tools
pub fn function_declarations(tools: &[ToolSchema]) -> Vec<FunctionDeclaration> {
    tools
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: (!tool.parameters.is_empty())
                .then(|| gemini_schema(tool.parameters_json_schema())),
        })
        .collect()
}

/// Rewrite JSON-schema `type` names into the API's upper-case enum
pub fn gemini_schema(mut schema: Value) -> Value {
    uppercase_types(&mut schema);
    schema
}

fn uppercase_types(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                match child {
                    Value::String(s) if key == "type" => *s = s.to_uppercase(),
                    _ => uppercase_types(child),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(uppercase_types),
        _ => {}
    }
}

/// Full request body for `generateContent`
pub fn build_request(messages: &[Message], options: &GenerationOptions) -> GenerateContentRequest {
    let (mut system_instruction, contents) = to_contents(messages);
    if system_instruction.is_none() {
        system_instruction = options
            .system_prompt
            .as_ref()
            .map(|prompt| Content::text(None, prompt.clone()));
    }

    let mut tools = Vec::new();
    if !options.tools.is_empty() {
        tools.push(ToolDeclaration {
            function_declarations: Some(function_declarations(&options.tools)),
            ..Default::default()
        });
    }
    if options.builtin_search {
        tools.push(ToolDeclaration {
            google_search: Some(json!({})),
            ..Default::default()
        });
    }

    GenerateContentRequest {
        contents,
        system_instruction,
        tools,
        generation_config: GenerationConfig {
            temperature: options.temperature,
            top_p: options.top_p,
            max_output_tokens: options.max_tokens,
            stop_sequences: options.stop_sequences.clone(),
            response_mime_type: options.response_mime_type.clone(),
            response_schema: options.response_schema.clone().map(gemini_schema),
        },
    }
}

/// Text of a content, skipping thought parts
pub fn content_text(content: &Content) -> String {
    content
        .parts
        .iter()
        .filter(|p| !p.thought.unwrap_or(false))
        .filter_map(|p| p.text.as_deref())
        .collect()
}

/// Function calls of a content as tool calls
pub fn content_tool_calls(content: &Content) -> Vec<ToolCall> {
    content
        .parts
        .iter()
        .filter_map(|p| p.function_call.as_ref())
        .map(function_call_to_tool_call)
        .collect()
}

pub fn function_call_to_tool_call(call: &FunctionCall) -> ToolCall {
    let arguments: ToolArgs = match &call.args {
        Value::Object(map) => map.clone().into_iter().collect(),
        _ => ToolArgs::new(),
    };
    let mut tool_call = ToolCall::new(call.name.clone(), arguments);
    tool_call.id = call.id.clone();
    tool_call
}

fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Error,
    }
}

/// Convert a response into a completion (first candidate only)
pub fn to_completion(response: &GenerateContentResponse, model: &str) -> Completion {
    let candidate = response.candidates.first();
    let content = candidate.and_then(|c| c.content.as_ref());

    let text = content.map(content_text).unwrap_or_default();
    let tool_calls = content.map(content_tool_calls).unwrap_or_default();

    let mut reason = candidate
        .and_then(|c| c.finish_reason.as_deref())
        .map(finish_reason);
    if !tool_calls.is_empty() {
        reason = Some(FinishReason::ToolUse);
    }

    Completion {
        content: text,
        tool_calls,
        model: response.model_version.clone().unwrap_or_else(|| model.to_string()),
        usage: response.usage_metadata.as_ref().map(TokenUsage::from),
        truncated: reason == Some(FinishReason::Length),
        finish_reason: reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_contents_maps_roles_and_merges_tool_responses() {
        let mut args = ToolArgs::new();
        args.insert("tickers".into(), json!(["NVDA"]));
        let call = ToolCall::new("get_financial_context", args).with_id("c1");

        let messages = vec![
            Message::system("Be brief."),
            Message::user("NVDA?"),
            Message::assistant_with_tool_calls("", vec![call.clone(), call.with_id("c2")]),
            Message::tool_response("get_financial_context", Some("c1".into()), &json!({"NVDA": "$1.00 (+1.00%)"})),
            Message::tool_response("get_financial_context", Some("c2".into()), &json!({"NVDA": "$1.00 (+1.00%)"})),
            Message::assistant("Up one percent."),
        ];

        let (system, contents) = to_contents(&messages);
        assert_eq!(system.unwrap().parts[0].text.as_deref(), Some("Be brief."));
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(contents[1].parts.len(), 2);
        assert_eq!(contents[1].parts[0].function_call.as_ref().unwrap().args, json!({"tickers": ["NVDA"]}));

        let responses = &contents[2];
        assert_eq!(responses.role.as_deref(), Some("user"));
        assert_eq!(responses.parts.len(), 2);
        let first = responses.parts[0].function_response.as_ref().unwrap();
        assert_eq!(first.name, "get_financial_context");
        assert_eq!(first.id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_plain_tool_output_is_wrapped() {
        let content = to_content(&Message::tool("done", None).with_name("x"));
        let response = content.parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.response, json!({"result": "done"}));
    }

    #[test]
    fn test_gemini_schema_uppercases_nested_types() {
        let schema = gemini_schema(json!({
            "type": "object",
            "properties": {
                "type": {"type": "string"},
                "items": {"type": "array", "items": {"type": "string"}}
            }
        }));
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["type"]["type"], "STRING");
        assert_eq!(schema["properties"]["items"]["items"]["type"], "STRING");
    }

    #[test]
    fn test_build_request_with_search_and_schema() {
        let options = GenerationOptions {
            builtin_search: true,
            response_mime_type: Some("application/json".into()),
            response_schema: Some(json!({"type": "object"})),
            ..Default::default()
        };
        let request = build_request(&[Message::user("hi")], &options);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["tools"], json!([{"googleSearch": {}}]));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_to_completion_with_function_call() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking", "thought": true},
                    {"functionCall": {"name": "google_search", "args": {"query": "AI news"}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
        }))
        .unwrap();

        let completion = to_completion(&response, "gemini-2.0-flash");
        assert_eq!(completion.content, "");
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].str_arg("query"), Some("AI news"));
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_to_completion_max_tokens_is_truncated() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "partial"}]}, "finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();
        let completion = to_completion(&response, "m");
        assert!(completion.truncated);
        assert_eq!(completion.content, "partial");
    }
}
