//! Video metadata suggestions from a generative model
//!
//! Given a short free-text summary of a video, asks Gemini for a title, a
//! description and a tag string the user can paste into a submission.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::error::MetadataError;

const PROMPT_TEMPLATE: &str = r#"You are a YouTube content marketing specialist. Your task is to write optimized metadata for a video based on the summary below.
Reply ONLY with a valid JSON object, with no text or formatting before or after it.

The JSON object must have the keys "title", "description" and "tags".

- "title": a compelling, search-optimized title of at most 70 characters.
- "description": a description of 3 paragraphs. The first summarizes the video. The second details the main points. The third is a call to action to subscribe to the channel and follow on social media.
- "tags": a single string containing 10 to 15 relevant hashtags, separated by commas.

Video summary:
---
{summary}
---"#;

/// Suggested metadata for a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMetadata {
    pub title: String,
    pub description: String,
    /// Comma-separated, ready for the submission `tags` field
    pub tags: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagsField {
    Joined(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
struct RawMetadata {
    title: String,
    description: String,
    tags: TagsField,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

pub struct MetadataGenerator {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    model: String,
    api_base: String,
}

impl MetadataGenerator {
    pub fn new(api_key: Option<SecretString>, config: &GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Build with the key from `GEMINI_API_KEY`, if set and non-empty
    pub fn from_env(config: &GeminiConfig) -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);
        Self::new(api_key, config)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask the model for a title, description and tags
    pub async fn generate(&self, summary: &str) -> Result<GeneratedMetadata, MetadataError> {
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(MetadataError::Validation("A summary is required".to_string()));
        }
        let api_key = self.api_key.as_ref().ok_or(MetadataError::MissingApiKey)?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": PROMPT_TEMPLATE.replace("{summary}", summary) }]
            }]
        });

        tracing::debug!(model = %self.model, "Requesting metadata suggestions");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(status, body = %text, "Gemini API error");
            return Err(MetadataError::Api {
                status,
                message: text,
            });
        }

        let api_resp: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| MetadataError::Parse(e.to_string()))?;

        let text = api_resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        parse_model_reply(&text)
    }
}

/// Parse the model's reply, tolerating a Markdown code fence around it
pub fn parse_model_reply(text: &str) -> Result<GeneratedMetadata, MetadataError> {
    let cleaned = strip_code_fence(text);
    if cleaned.is_empty() {
        return Err(MetadataError::Parse("model returned an empty reply".to_string()));
    }

    let raw: RawMetadata = serde_json::from_str(cleaned)
        .map_err(|e| MetadataError::Parse(format!("{}: {}", e, cleaned)))?;

    let tags = match raw.tags {
        TagsField::Joined(tags) => tags,
        TagsField::List(tags) => tags.join(", "),
    };

    Ok(GeneratedMetadata {
        title: raw.title,
        description: raw.description,
        tags,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json)
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches("json"),
    };
    rest.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer, key: Option<&str>) -> MetadataGenerator {
        let config = GeminiConfig {
            model: "gemini-2.5-flash".to_string(),
            api_base: server.uri(),
        };
        MetadataGenerator::new(key.map(|k| SecretString::from(k.to_string())), &config)
    }

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_parse_plain_json() {
        let meta =
            parse_model_reply(r##"{"title":"T","description":"D","tags":"#a, #b"}"##).unwrap();
        assert_eq!(meta.title, "T");
        assert_eq!(meta.tags, "#a, #b");
    }

    #[test]
    fn test_parse_fenced_json_with_tag_list() {
        let text = "```json\n{\"title\":\"T\",\"description\":\"D\",\"tags\":[\"#a\",\"#b\"]}\n```";
        let meta = parse_model_reply(text).unwrap();
        assert_eq!(meta.description, "D");
        assert_eq!(meta.tags, "#a, #b");
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(matches!(
            parse_model_reply(r#"{"headline":"T"}"#),
            Err(MetadataError::Parse(_))
        ));
        assert!(matches!(
            parse_model_reply("Sure! Here is your metadata."),
            Err(MetadataError::Parse(_))
        ));
        assert!(matches!(parse_model_reply(""), Err(MetadataError::Parse(_))));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_string_contains("Rust async internals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(
                "```json\n{\"title\":\"Async Rust Explained\",\"description\":\"P1\\n\\nP2\\n\\nP3\",\"tags\":\"#rust, #async\"}\n```",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let meta = generator(&server, Some("test-key"))
            .generate("A talk about Rust async internals")
            .await
            .unwrap();
        assert_eq!(meta.title, "Async Rust Explained");
        assert_eq!(meta.tags, "#rust, #async");
        assert!(meta.description.contains("P3"));
    }

    #[tokio::test]
    async fn test_generate_without_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let gen = generator(&server, None);
        assert!(!gen.is_configured());
        assert!(matches!(
            gen.generate("summary").await,
            Err(MetadataError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn test_generate_empty_summary() {
        let server = MockServer::start().await;
        assert!(matches!(
            generator(&server, Some("k")).generate("   ").await,
            Err(MetadataError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        match generator(&server, Some("bad")).generate("summary").await {
            Err(MetadataError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("API key not valid"));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_unparseable_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("I cannot help with that")))
            .mount(&server)
            .await;

        assert!(matches!(
            generator(&server, Some("k")).generate("summary").await,
            Err(MetadataError::Parse(_))
        ));
    }
}
