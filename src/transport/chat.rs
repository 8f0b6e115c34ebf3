use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A reply from the chat backend
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    /// Backend conversation handle, echoed back on later turns
    pub session_id: Option<String>,
}

/// An image payload for `chat-with-image`
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

/// Client for the `chat` and `chat-with-image` endpoints
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Send a transcript or typed message and return the tutor's reply
    pub async fn chat(&self, text: &str, session_id: Option<&str>) -> Result<ChatReply> {
        debug!(chars = text.len(), "sending chat request");

        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(&ChatRequest { text, session_id })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Chat(e.to_string()))?;

        Self::parse_reply(response).await
    }

    /// Send a message with an optional image attachment
    ///
    /// With an attachment the request is multipart (`text`, optional
    /// `session_id`, `file` part); without one it degrades to plain JSON.
    pub async fn chat_with_image(
        &self,
        text: &str,
        session_id: Option<&str>,
        image: Option<&ImageAttachment>,
    ) -> Result<ChatReply> {
        let url = format!("{}/chat-with-image", self.base_url);

        let request = match image {
            Some(image) => {
                let part = reqwest::multipart::Part::bytes(image.bytes.clone())
                    .file_name("whiteboard.png")
                    .mime_str(&image.content_type)
                    .map_err(|e| Error::Chat(format!("bad image content type: {e}")))?;

                let mut form = reqwest::multipart::Form::new()
                    .text("text", text.to_string())
                    .part("file", part);
                if let Some(id) = session_id {
                    form = form.text("session_id", id.to_string());
                }

                self.client.post(url).multipart(form)
            }
            None => self.client.post(url).json(&ChatRequest { text, session_id }),
        };

        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Chat(e.to_string()))?;

        Self::parse_reply(response).await
    }

    /// Parse a chat response: JSON replies carry the text under `response`,
    /// `transcription` or `text`; anything else is taken verbatim
    async fn parse_reply(response: reqwest::Response) -> Result<ChatReply> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "chat request rejected");
            return Err(Error::Chat(format!("backend returned {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.contains("application/json") {
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| Error::Chat(e.to_string()))?;

            let text = body
                .get("response")
                .or_else(|| body.get("transcription"))
                .or_else(|| body.get("text"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let session_id = body
                .get("session_id")
                .and_then(|v| v.as_str())
                .map(ToString::to_string);

            if text.is_empty() {
                return Err(Error::Chat("reply carried no text".to_string()));
            }

            Ok(ChatReply { text, session_id })
        } else {
            let text = response
                .text()
                .await
                .map_err(|e| Error::Chat(e.to_string()))?;
            if text.trim().is_empty() {
                return Err(Error::Chat("reply carried no text".to_string()));
            }
            Ok(ChatReply {
                text,
                session_id: None,
            })
        }
    }
}
