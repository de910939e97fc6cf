//! Typed views over MCP operation results.
//!
//! The protocol crate gives the raw wire shapes; these wrappers add the
//! accessors callers actually want, like "all the text in this tool
//! result" or "the first assistant message of this prompt".

use serde_json::Value;

use mcp_rig_protocol::mcp::{
    CallToolResult, ContentBlock, GetPromptResult as RawGetPromptResult, PromptMessage,
    ReadResourceResult as RawReadResourceResult, ResourceContents, Role,
};

use crate::error::{McpError, Result};

/// Content block discriminator, for filtering mixed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Image,
    Audio,
    Resource,
}

impl ContentKind {
    fn of(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::Text { .. } => Self::Text,
            ContentBlock::Image { .. } => Self::Image,
            ContentBlock::Audio { .. } => Self::Audio,
            ContentBlock::Resource { .. } => Self::Resource,
        }
    }
}

/// Result of a tool call.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    raw: CallToolResult,
}

impl ToolCallResult {
    pub(crate) fn new(raw: CallToolResult) -> Self {
        Self { raw }
    }

    /// The content blocks the tool produced.
    pub fn content(&self) -> &[ContentBlock] {
        &self.raw.content
    }

    /// Structured output, when the tool returned any.
    pub fn structured_content(&self) -> Option<&Value> {
        self.raw.structured_content.as_ref()
    }

    /// Whether the server flagged this call as failed.
    pub fn is_error(&self) -> bool {
        self.raw.is_error.unwrap_or(false)
    }

    /// All text blocks joined with newlines; `None` when there are none.
    pub fn text_content(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .raw
            .content
            .iter()
            .filter_map(|block| block.as_text())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// All blocks of the given kind.
    pub fn content_of_type(&self, kind: ContentKind) -> Vec<&ContentBlock> {
        self.raw
            .content
            .iter()
            .filter(|block| ContentKind::of(block) == kind)
            .collect()
    }

    /// The first block of the given kind.
    pub fn find_content(&self, kind: ContentKind) -> Option<&ContentBlock> {
        self.raw
            .content
            .iter()
            .find(|block| ContentKind::of(block) == kind)
    }

    /// Fail when the server flagged the call as an error, carrying the
    /// tool's text output as the message.
    pub fn expect_success(&self) -> Result<()> {
        if !self.is_error() {
            return Ok(());
        }
        let detail = self
            .text_content()
            .unwrap_or_else(|| "(no text content available)".to_string());
        Err(McpError::tool_call(format!(
            "Tool call failed with error: {detail}"
        )))
    }

    /// The underlying protocol result.
    pub fn into_inner(self) -> CallToolResult {
        self.raw
    }
}

/// Result of a resource read.
#[derive(Debug, Clone)]
pub struct ReadResourceResult {
    raw: RawReadResourceResult,
}

impl ReadResourceResult {
    pub(crate) fn new(raw: RawReadResourceResult) -> Self {
        Self { raw }
    }

    /// The contents entries the server returned.
    pub fn contents(&self) -> &[ResourceContents] {
        &self.raw.contents
    }

    /// Text of the first text entry.
    pub fn text_content(&self) -> Option<&str> {
        self.raw.contents.iter().find_map(|entry| entry.as_text())
    }

    /// Base64 payload of the first binary entry.
    pub fn blob_content(&self) -> Option<&str> {
        self.raw.contents.iter().find_map(|entry| entry.as_blob())
    }

    /// The entry with the given URI.
    pub fn find_by_uri(&self, uri: &str) -> Option<&ResourceContents> {
        self.raw.contents.iter().find(|entry| entry.uri() == uri)
    }

    /// All text entries.
    pub fn text_resources(&self) -> Vec<&ResourceContents> {
        self.raw
            .contents
            .iter()
            .filter(|entry| entry.as_text().is_some())
            .collect()
    }

    /// All binary entries.
    pub fn blob_resources(&self) -> Vec<&ResourceContents> {
        self.raw
            .contents
            .iter()
            .filter(|entry| entry.as_blob().is_some())
            .collect()
    }

    /// Whether any entry carries text.
    pub fn has_text_content(&self) -> bool {
        self.text_content().is_some()
    }

    /// Whether any entry carries binary data.
    pub fn has_blob_content(&self) -> bool {
        self.blob_content().is_some()
    }

    /// The underlying protocol result.
    pub fn into_inner(self) -> RawReadResourceResult {
        self.raw
    }
}

/// Result of a prompt fetch.
#[derive(Debug, Clone)]
pub struct GetPromptResult {
    raw: RawGetPromptResult,
}

impl GetPromptResult {
    pub(crate) fn new(raw: RawGetPromptResult) -> Self {
        Self { raw }
    }

    /// The prompt's description, when the server provided one.
    pub fn description(&self) -> Option<&str> {
        self.raw.description.as_deref()
    }

    /// The rendered messages.
    pub fn messages(&self) -> &[PromptMessage] {
        &self.raw.messages
    }

    /// The first message with the user role.
    pub fn first_user_message(&self) -> Option<&PromptMessage> {
        self.raw
            .messages
            .iter()
            .find(|message| message.role == Role::User)
    }

    /// The first message with the assistant role.
    pub fn first_assistant_message(&self) -> Option<&PromptMessage> {
        self.raw
            .messages
            .iter()
            .find(|message| message.role == Role::Assistant)
    }

    /// All messages with the user role.
    pub fn user_messages(&self) -> Vec<&PromptMessage> {
        self.raw
            .messages
            .iter()
            .filter(|message| message.role == Role::User)
            .collect()
    }

    /// All messages with the assistant role.
    pub fn assistant_messages(&self) -> Vec<&PromptMessage> {
        self.raw
            .messages
            .iter()
            .filter(|message| message.role == Role::Assistant)
            .collect()
    }

    /// Whether any message has the user role.
    pub fn has_user_messages(&self) -> bool {
        self.first_user_message().is_some()
    }

    /// Whether any message has the assistant role.
    pub fn has_assistant_messages(&self) -> bool {
        self.first_assistant_message().is_some()
    }

    /// The underlying protocol result.
    pub fn into_inner(self) -> RawGetPromptResult {
        self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_result(value: Value) -> ToolCallResult {
        ToolCallResult::new(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_text_content_joins_blocks() {
        let result = tool_result(json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "text", "text": "line two"},
            ]
        }));
        assert_eq!(result.text_content().as_deref(), Some("line one\nline two"));
        assert!(!result.is_error());
        assert!(result.expect_success().is_ok());
    }

    #[test]
    fn test_text_content_empty_when_no_text_blocks() {
        let result = tool_result(json!({
            "content": [{"type": "image", "data": "aGk=", "mimeType": "image/png"}]
        }));
        assert_eq!(result.text_content(), None);
        assert_eq!(result.content_of_type(ContentKind::Image).len(), 1);
        assert!(result.find_content(ContentKind::Text).is_none());
    }

    #[test]
    fn test_expect_success_carries_tool_text() {
        let result = tool_result(json!({
            "content": [{"type": "text", "text": "disk on fire"}],
            "isError": true
        }));
        let err = result.expect_success().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tool call failed with error: disk on fire"
        );
    }

    #[test]
    fn test_expect_success_without_text() {
        let result = tool_result(json!({"content": [], "isError": true}));
        let err = result.expect_success().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tool call failed with error: (no text content available)"
        );
    }

    #[test]
    fn test_structured_content_passthrough() {
        let result = tool_result(json!({
            "content": [],
            "structuredContent": {"sum": 5}
        }));
        assert_eq!(result.structured_content(), Some(&json!({"sum": 5})));
    }

    #[test]
    fn test_resource_accessors() {
        let raw: RawReadResourceResult = serde_json::from_value(json!({
            "contents": [
                {"uri": "file:///a.txt", "mimeType": "text/plain", "text": "hello"},
                {"uri": "file:///b.png", "mimeType": "image/png", "blob": "aGVsbG8="},
            ]
        }))
        .unwrap();
        let result = ReadResourceResult::new(raw);
        assert_eq!(result.text_content(), Some("hello"));
        assert_eq!(result.blob_content(), Some("aGVsbG8="));
        assert_eq!(result.text_resources().len(), 1);
        assert_eq!(result.blob_resources().len(), 1);
        assert!(result.has_text_content());
        assert!(result.has_blob_content());
        let entry = result.find_by_uri("file:///b.png").unwrap();
        assert_eq!(entry.mime_type(), Some("image/png"));
        assert!(result.find_by_uri("file:///missing").is_none());
    }

    #[test]
    fn test_prompt_accessors() {
        let raw: RawGetPromptResult = serde_json::from_value(json!({
            "description": "a greeting",
            "messages": [
                {"role": "user", "content": {"type": "text", "text": "Hello!"}},
                {"role": "assistant", "content": {"type": "text", "text": "Hi there."}},
                {"role": "user", "content": {"type": "text", "text": "Bye."}},
            ]
        }))
        .unwrap();
        let result = GetPromptResult::new(raw);
        assert_eq!(result.description(), Some("a greeting"));
        assert_eq!(result.messages().len(), 3);
        assert_eq!(result.user_messages().len(), 2);
        assert_eq!(result.assistant_messages().len(), 1);
        assert_eq!(result.first_user_message().unwrap().text(), Some("Hello!"));
        assert_eq!(
            result.first_assistant_message().unwrap().text(),
            Some("Hi there.")
        );
        assert!(result.has_user_messages());
        assert!(result.has_assistant_messages());
    }
}
