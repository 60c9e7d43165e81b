use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use utoipa::ToSchema;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Best-effort provider timeout; a slow model must not hang the search.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Structured filters extracted from a free-text query. Every field is
/// optional; an all-`None` value means "no structure recognized".
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ExtractedFilters {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl ExtractedFilters {
    /// The degraded form: treat the whole query as a free-text search term.
    pub fn fallback(query: &str) -> Self {
        Self {
            search: Some(query.to_string()),
            ..Self::default()
        }
    }
}

/// Natural-language search against the item catalog, backed by Gemini.
/// Provider or parse failures never fail the request; they degrade to the
/// fallback filters and a canned summary.
pub struct AiSearchClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl AiSearchClient {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Extract structured filters from the user query.
    pub async fn extract_filters(&self, query: &str) -> ExtractedFilters {
        let prompt = format!(
            "You are a search assistant for a \"Lost & Found\" application.\n\
             Analyze the following user query and extract key search filters.\n\n\
             User Query: \"{query}\"\n\n\
             Return ONLY a valid JSON object with the following fields (all optional, use null if not present):\n\
             - search: (string) keywords for title/description matching (e.g. \"red wallet\", \"iphone\")\n\
             - type: (string) \"lost\" or \"found\". If user says \"I lost...\", type is \"lost\". If \"I found...\", type is \"found\".\n\
             - category: (string) One of: [\"Electronics\", \"Accessories\", \"Documents\", \"Clothing\", \"Keys\", \"Other\"]. Guess based on context.\n\
             - location: (string) General location text (e.g. \"Central Park\").\n\
             - country: (string) ISO country name if mentioned.\n\
             - city: (string) City name if mentioned."
        );

        match self.generate(&prompt).await {
            Ok(text) => parse_filters(&text, query),
            Err(e) => {
                warn!("AI filter extraction failed, falling back: {}", e);
                ExtractedFilters::fallback(query)
            }
        }
    }

    /// Produce a short natural-language summary of the search results.
    pub async fn summarize(&self, query: &str, found: &[(String, String)]) -> String {
        let listing = serde_json::to_string(
            &found
                .iter()
                .map(|(title, location)| json!({ "title": title, "location": location }))
                .collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string());

        let prompt = format!(
            "User Query: \"{query}\"\n\
             Found Items: {listing}\n\n\
             Write a helpful, friendly, short response summarizing what was found.\n\
             If items were found, mention the top 1-2 briefly.\n\
             If no items found, suggest expanding the search.\n\
             Do not include JSON, just plain text or markdown."
        );

        match self.generate(&prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("AI summary failed, using canned text: {}", e);
                if found.is_empty() {
                    "No matching items were found. Try broadening your search.".to_string()
                } else {
                    format!("Found {} item(s) matching your search.", found.len())
                }
            }
        }
    }

    /// One `generateContent` round-trip, returning the first candidate text.
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GEMINI_API_KEY is not configured"))?;

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_BASE_URL, self.model, api_key
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: GenerateContentResponse = response.json().await?;
        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow!("empty model response"))?;

        debug!("Gemini raw response: {}", text);
        Ok(text)
    }
}

/// Parse the model's filter JSON, tolerating markdown code fences. Any
/// parse failure degrades to the fallback filters.
pub fn parse_filters(text: &str, query: &str) -> ExtractedFilters {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    match serde_json::from_str::<ExtractedFilters>(cleaned) {
        Ok(filters) => filters,
        Err(e) => {
            warn!("AI filter JSON did not parse ({}), falling back", e);
            ExtractedFilters::fallback(query)
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: String,
}
