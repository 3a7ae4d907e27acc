use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::client::{ChatClient, ChatRequest, ChatResponse, Message};

// Opening tag of a reasoning block, e.g. `<think>` or `<reasoning mode="x">`
static OPEN_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9_-]*)(?:\s[^<>]*)?>").expect("invalid tag regex"));

/// A chat response together with its user-facing text.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedResponse {
    #[serde(flatten)]
    pub response: ChatResponse,
    /// The message body with the reasoning block removed and trimmed
    pub non_reasoning_content: String,
}

impl SanitizedResponse {
    pub fn content(&self) -> &str {
        &self.non_reasoning_content
    }
}

/// Sends every chat request to one fixed model and strips reasoning markup
/// from the answer.
///
/// The wrapper only holds the client; it does not expose the client's other
/// operations.
///
/// ```compile_fail
/// use ollama_bench::{ChatWrapper, OllamaClient};
///
/// fn inner(wrapper: &ChatWrapper<OllamaClient>) -> &OllamaClient {
///     wrapper.client()
/// }
/// ```
pub struct ChatWrapper<C> {
    client: C,
    model: String,
}

impl<C: ChatClient> ChatWrapper<C> {
    pub fn new(client: C, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[cfg(test)]
    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    /// Send `messages` to the configured model.
    ///
    /// Client errors are returned as-is; nothing is retried.
    pub async fn send(&self, messages: Vec<Message>) -> Result<SanitizedResponse> {
        if messages.is_empty() {
            anyhow::bail!("chat request to {} has no messages", self.model);
        }

        let request = ChatRequest::new(self.model.clone(), messages);
        let response = self.client.chat(request).await?;
        let non_reasoning_content = strip_reasoning(&response.message.content);

        log::debug!(
            "{} answered {} bytes ({} after stripping reasoning)",
            self.model,
            response.message.content.len(),
            non_reasoning_content.len()
        );

        Ok(SanitizedResponse {
            response,
            non_reasoning_content,
        })
    }
}

/// Remove the first `<tag>...</tag>` block from `content` and trim the rest.
///
/// The block ends at the first `</tag>` with the same name as the opening tag,
/// compared ignoring ASCII case. Later blocks are kept. An opening tag without
/// its closing tag is left in place.
pub fn strip_reasoning(content: &str) -> String {
    // ASCII lowercasing keeps byte offsets valid for `content`
    let folded = content.to_ascii_lowercase();

    for caps in OPEN_TAG_RE.captures_iter(content) {
        let (Some(open), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let close_tag = format!("</{}>", name.as_str().to_ascii_lowercase());
        if let Some(offset) = folded[open.end()..].find(&close_tag) {
            let end = open.end() + offset + close_tag.len();
            let mut remainder = String::with_capacity(content.len() - (end - open.start()));
            remainder.push_str(&content[..open.start()]);
            remainder.push_str(&content[end..]);
            return remainder.trim().to_string();
        }
    }

    content.trim().to_string()
}
