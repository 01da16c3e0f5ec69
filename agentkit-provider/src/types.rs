//! Wire types for the LLM client boundary.
//!
//! The reasoning loop drives tools by *parsing the model's text*, so this
//! boundary carries plain conversation — text in both directions, images on
//! the way in — and nothing else. There is no native tool-call traffic
//! here: a tool request is just lines in the completion text, and a tool
//! result is just lines in the next message. Providers translate these
//! types into their own wire formats.

use agentkit_core::TokenUsage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions to the model.
    System,
    /// The caller (or an observation fed back to the model).
    User,
    /// The model.
    Assistant,
}

/// Source for image input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Base64-encoded image data.
    Base64 {
        /// The base64-encoded data.
        data: String,
    },
    /// URL pointing to an image.
    Url {
        /// The image URL.
        url: String,
    },
}

/// One part of an input message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// An image for the model to look at.
    Image {
        /// Where the image bytes come from.
        source: ImageSource,
        /// MIME type of the image.
        media_type: String,
    },
}

/// A conversation message sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The message author.
    pub role: Role,
    /// The message body.
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    /// A message with arbitrary parts.
    pub fn new(role: Role, parts: Vec<MessagePart>) -> Self {
        Self { role, parts }
    }

    /// A plain-text system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![MessagePart::Text { text: text.into() }])
    }

    /// A plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![MessagePart::Text { text: text.into() }])
    }

    /// A plain-text assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![MessagePart::Text { text: text.into() }])
    }
}

/// Request for one model completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model to use. `None` lets the provider pick its default.
    pub model: Option<String>,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// System prompt, kept out of `messages` so providers that take it as a
    /// separate field don't have to fish it back out.
    pub system: Option<String>,
    /// Maximum output tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Nucleus-sampling cutoff.
    pub top_p: Option<f64>,
    /// Stop sequences: generation halts when the model emits any of these.
    #[serde(default)]
    pub stop: Vec<String>,
    /// Provider-specific config passthrough.
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl CompletionRequest {
    /// A request carrying `messages` and provider defaults for everything else.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: None,
            messages,
            system: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop: Vec::new(),
            extra: serde_json::Value::Null,
        }
    }

    /// Request a specific model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Cap output tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set stop sequences.
    #[must_use]
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model finished its turn on its own.
    Stop,
    /// Output hit the `max_tokens` cap; the text is likely cut off.
    MaxTokens,
    /// A configured stop sequence was emitted.
    StopSequence,
    /// Content was filtered by the provider.
    Filtered,
}

/// One model completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text.
    pub content: String,
    /// The model that actually served the request.
    pub model: String,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Token accounting for this call.
    pub usage: TokenUsage,
    /// Cost calculated by the provider, if it knows its own pricing.
    pub cost: Option<Decimal>,
}

impl Completion {
    /// A plain-text completion with zeroed usage and no cost. Handy for
    /// stubs and tests; real providers fill every field.
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::default(),
            cost: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_constructors_build_single_text_parts() {
        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.parts, vec![MessagePart::Text { text: "hello".into() }]);

        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn message_part_serde_is_type_tagged() {
        let part = MessagePart::Text { text: "hi".into() };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "text");

        let image = MessagePart::Image {
            source: ImageSource::Url { url: "https://example.com/img.png".into() },
            media_type: "image/png".into(),
        };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["source"]["type"], "url");
    }

    #[test]
    fn request_builder_fills_only_what_is_asked() {
        let request = CompletionRequest::new(vec![ChatMessage::user("q")])
            .with_model("small-model")
            .with_max_tokens(64)
            .with_temperature(0.0);

        assert_eq!(request.model.as_deref(), Some("small-model"));
        assert_eq!(request.max_tokens, Some(64));
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.top_p, None);
        assert!(request.stop.is_empty());
        assert_eq!(request.system, None);
    }

    #[test]
    fn request_serde_round_trips() {
        let request = CompletionRequest::new(vec![ChatMessage::user("q")])
            .with_system("be brief")
            .with_stop(vec!["Observation:".into()]);
        let json = serde_json::to_value(&request).unwrap();
        let back: CompletionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.messages, request.messages);
        assert_eq!(back.system.as_deref(), Some("be brief"));
        assert_eq!(back.stop, vec!["Observation:"]);
    }

    #[test]
    fn finish_reason_serde_round_trips() {
        for reason in [FinishReason::Stop, FinishReason::MaxTokens, FinishReason::StopSequence, FinishReason::Filtered] {
            let json = serde_json::to_string(&reason).unwrap();
            let back: FinishReason = serde_json::from_str(&json).unwrap();
            assert_eq!(reason, back);
        }
    }

    #[test]
    fn completion_text_helper_defaults_the_bookkeeping() {
        let completion = Completion::text("answer", "stub");
        assert_eq!(completion.content, "answer");
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.usage.input_tokens, 0);
        assert!(completion.cost.is_none());
    }
}
