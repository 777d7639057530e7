//! Wire types for the gateway.
//!
//! The request side (`ChatRequest`, `Message`, `Content`) is the minimal subset of the OpenAI chat
//! completions body the gateway understands. The response side mirrors the OpenAI envelopes and is
//! only used when the gateway is configured with [`ResponseFormat::OpenAi`].
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The local model that should serve the request.
    pub model: String,
    /// The conversation, in order.
    pub messages: Vec<Message>,
    /// Accepted for compatibility with OpenAI clients. Not forwarded to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Free-form role (`user`, `system`, ...). Not validated.
    pub role: String,
    #[serde(deserialize_with = "deserialize_content_blocks")]
    pub content: Vec<Content>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message {
            role: "user".into(),
            content: vec![Content::text(text)],
        }
    }
}

/// One content block of a message.
///
/// On the wire the variant is decided by which field is present: `{"text": ...}` or
/// `{"image_url": {"url": ...}}`. A block carrying both, or neither, is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Content {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Content::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// Image reference. Either a remote URL or a data URI; the gateway never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// The shape every content object is read into before we pick a variant. Anything else on the
/// object (including an OpenAI style `type` tag) is ignored.
#[derive(Deserialize)]
struct RawContent {
    text: Option<String>,
    image_url: Option<ImageUrl>,
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawContent::deserialize(deserializer)?;
        match (raw.text, raw.image_url) {
            (Some(text), None) => Ok(Content::Text { text }),
            (None, Some(image_url)) => Ok(Content::ImageUrl { image_url }),
            (Some(_), Some(_)) => Err(de::Error::custom(
                "ambiguous content block: both `text` and `image_url` are present",
            )),
            (None, None) => Err(de::Error::custom(
                "content block has neither `text` nor `image_url`",
            )),
        }
    }
}

/// `content` is normally an array of blocks, but plenty of clients send a bare string. Treat that
/// as a single text block.
fn deserialize_content_blocks<'de, D>(deserializer: D) -> Result<Vec<Content>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ContentBlocks;

    impl<'de> Visitor<'de> for ContentBlocks {
        type Value = Vec<Content>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or an array of content blocks")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![Content::text(v)])
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(vec![Content::Text { text: v }])
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut blocks = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(block) = seq.next_element::<Content>()? {
                blocks.push(block);
            }
            Ok(blocks)
        }
    }

    deserializer.deserialize_any(ContentBlocks)
}

/// How the gateway shapes its response bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResponseFormat {
    /// Completions return the engine output verbatim; `/v1/models` returns an array of names.
    #[default]
    Raw,
    /// Completions and model listings are wrapped in the OpenAI envelopes.
    OpenAi,
}

/// Response from `POST /v1/chat/completions` in [`ResponseFormat::OpenAi`] mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<Choice>,
}

/// A completion choice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

/// A single entry of the OpenAI style `/v1/models` listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Model {
    /// The model identifier, which can be referenced in the API endpoints.
    pub id: String,
    /// Local models have no creation time, so this is always `None`.
    pub created: Option<u32>,
    /// The object type, which is always "model".
    pub object: String,
    /// The organization that owns the model.
    pub owned_by: String,
}

impl Model {
    pub fn local(id: &str) -> Self {
        Model {
            id: id.to_owned(),
            created: None,
            object: "model".into(),
            owned_by: "local".into(),
        }
    }
}

/// The OpenAI style response from the /v1/models endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ListModelResponse {
    /// The object type, which is always "list".
    pub object: String,
    /// A list of model objects.
    pub data: Vec<Model>,
}

impl ListModelResponse {
    pub fn from_names(names: &[String]) -> Self {
        ListModelResponse {
            object: "list".into(),
            data: names.iter().map(|name| Model::local(name)).collect(),
        }
    }
}
