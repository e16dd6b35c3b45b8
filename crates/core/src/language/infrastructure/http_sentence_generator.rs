use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::language::domain::sentence_generator::SentenceGenerator;

#[derive(Serialize)]
struct SentenceRequest<'a> {
    words: &'a [String],
}

#[derive(Deserialize)]
struct SentenceResponse {
    #[serde(default)]
    sentence: String,
}

/// Posts glosses to a hosted text-generation endpoint.
pub struct HttpSentenceGenerator {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpSentenceGenerator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SentenceGenerator for HttpSentenceGenerator {
    fn generate(&mut self, words: &[String]) -> Result<String, Box<dyn std::error::Error>> {
        let body = self
            .client
            .post(&self.url)
            .json(&SentenceRequest { words })
            .send()
            .and_then(|r| r.error_for_status())?
            .text()?;
        parse_sentence(&body)
    }
}

/// Extract `sentence` from a response body. A missing key yields `""`.
pub fn parse_sentence(body: &str) -> Result<String, Box<dyn std::error::Error>> {
    let response: SentenceResponse = serde_json::from_str(body)?;
    Ok(response.sentence)
}
