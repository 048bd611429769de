//! Post summarization.
//!
//! With a configured API key, summaries come from the Gemini generateContent
//! endpoint. Without one, a local extractive heuristic picks the most
//! representative sentences by stopword-filtered term frequency. Results are
//! cached on the post document either way.

use std::collections::HashMap;

use chrono::Utc;

use crate::{
    config::{Config, SUMMARY_MAX_SENTENCES},
    error::AppError,
    models::post::AiSummary,
};

pub const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-lite:generateContent";

/// Words too common to carry topical signal.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "because",
    "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have",
    "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more",
    "most", "my", "no", "not", "of", "on", "one", "only", "or", "other", "our", "out", "over",
    "she", "so", "some", "such", "than", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "to", "up", "was", "we", "were", "what", "when", "which", "who", "will",
    "with", "would", "you", "your",
];

pub async fn summarize(
    http: &reqwest::Client,
    config: &Config,
    text: &str,
) -> Result<AiSummary, AppError> {
    match &config.gemini_api_key {
        Some(key) => gemini_summary(http, config, key, text).await,
        None => Ok(AiSummary {
            text: extractive_summary(text, SUMMARY_MAX_SENTENCES),
            source: "local".to_string(),
            updated_at: Utc::now(),
        }),
    }
}

async fn gemini_summary(
    http: &reqwest::Client,
    config: &Config,
    key: &str,
    text: &str,
) -> Result<AiSummary, AppError> {
    let url = config.gemini_api_url.as_deref().unwrap_or(GEMINI_API_URL);

    let prompt = format!(
        "Summarize the following post in 2-3 short sentences.\n\
         Avoid copying exact sentences. Avoid adding new information.\n\nText:\n{text}"
    );
    let body = serde_json::json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
    });

    let response = http
        .post(format!("{url}?key={key}"))
        .json(&body)
        .send()
        .await
        .map_err(|e| AppError::InternalServerError(format!("Gemini request failed: {e}")))?;

    let data: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AppError::InternalServerError(format!("Gemini response unreadable: {e}")))?;

    if let Some(error) = data.get("error") {
        tracing::error!("Gemini API error: {}", error);
        return Err(AppError::InternalServerError(
            "Gemini summarization failed".to_string(),
        ));
    }

    let summary = data
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            tracing::error!("Gemini response missing summary: {}", data);
            AppError::InternalServerError("No summary returned from Gemini".to_string())
        })?;

    Ok(AiSummary {
        text: summary.to_string(),
        source: "gemini".to_string(),
        updated_at: Utc::now(),
    })
}

/// Extractive fallback: every sentence is scored by the summed document-wide
/// frequency of its non-stopword terms (normalized by sentence length), and
/// the best `max_sentences` are returned in their original order.
pub fn extractive_summary(text: &str, max_sentences: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.len() <= max_sentences {
        return sentences.join(" ");
    }

    let mut freq: HashMap<String, f64> = HashMap::new();
    for word in tokens(text) {
        if !STOPWORDS.contains(&word.as_str()) {
            *freq.entry(word).or_insert(0.0) += 1.0;
        }
    }

    let mut scored: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let words = tokens(sentence);
            let sum: f64 = words
                .iter()
                .map(|w| freq.get(w).copied().unwrap_or(0.0))
                .sum();
            (i, sum / words.len().max(1) as f64)
        })
        .collect();

    // Stable sort: equal scores keep the earlier sentence first.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut picked: Vec<usize> = scored.iter().take(max_sentences).map(|&(i, _)| i).collect();
    picked.sort_unstable();

    picked
        .into_iter()
        .map(|i| sentences[i].clone())
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}
