//! Phase 1 — Sense
//!
//! Turns raw input into a `TaskSpec`. Short inputs get a cheap heuristic
//! (keyword domain detection plus a handful of structural signals);
//! longer inputs are handed to the LLM, with the heuristic as a parse
//! failure fallback — the same "fast path first, LLM as the satisfied
//! case for everything else" shape a keyword-based router uses before
//! falling back to model-driven classification.

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::agent::provider::{CompletionParams, LLMProvider};
use crate::message::Message;

#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub input: String,
    pub domains: Vec<String>,
    pub complexity: f32,
    pub token_budget: usize,
}

fn domain_keywords() -> HashMap<&'static str, &'static [&'static str]> {
    let mut map = HashMap::new();
    map.insert("code", &["function", "code", "bug", "compile", "refactor", "class", "variable"][..]);
    map.insert("data", &["dataset", "csv", "sql", "dataframe", "pipeline", "etl"][..]);
    map.insert("writing", &["essay", "draft", "write", "paragraph", "tone", "copy"][..]);
    map.insert("math", &["equation", "solve", "integral", "derivative", "proof", "calculate"][..]);
    map.insert("research", &["research", "survey", "literature", "cite", "sources"][..]);
    map
}

fn detect_domains(input: &str) -> Vec<String> {
    let lower = input.to_lowercase();
    let keywords = domain_keywords();
    let mut found: Vec<String> = keywords
        .iter()
        .filter(|(_, kws)| kws.iter().any(|k| lower.contains(k)))
        .map(|(domain, _)| domain.to_string())
        .collect();
    found.sort();
    if found.is_empty() {
        vec!["general".to_string()]
    } else {
        found
    }
}

fn has_list(input: &str) -> bool {
    let bullet_re = Regex::new(r"(?m)^\s*([-*]|\d+[.)])\s").unwrap();
    bullet_re.is_match(input)
}

/// `score = min(words/200, 0.5) + 0.15*(sentences>2) + 0.10*(has_list) +
/// 0.15*(len(domains)>2)`, clamped to [0,1].
fn heuristic_complexity(input: &str, domains: &[String]) -> f32 {
    let words = input.split_whitespace().count() as f32;
    let sentences = input.matches(['.', '!', '?']).count();
    let mut score = (words / 200.0).min(0.5);
    if sentences > 2 {
        score += 0.15;
    }
    if has_list(input) {
        score += 0.10;
    }
    if domains.len() > 2 {
        score += 0.15;
    }
    score.clamp(0.0, 1.0)
}

#[derive(Debug, Deserialize)]
struct LlmSenseResponse {
    score: f32,
    domains: Vec<String>,
    #[allow(dead_code)]
    reasoning: Option<String>,
}

fn token_budget_for(complexity: f32) -> usize {
    if complexity < 0.4 {
        2048
    } else if complexity < 0.7 {
        4096
    } else {
        8192
    }
}

pub struct Sensor {
    provider: std::sync::Arc<dyn LLMProvider>,
    llm_threshold_chars: usize,
}

impl Sensor {
    pub fn new(provider: std::sync::Arc<dyn LLMProvider>, llm_threshold_chars: usize) -> Self {
        Self { provider, llm_threshold_chars }
    }

    /// Produce a `TaskSpec`, applying `calibration_bias` (per domain,
    /// additive) to the resulting complexity score.
    pub async fn sense(&self, input: &str, calibration_bias: &HashMap<String, f64>) -> TaskSpec {
        let (mut complexity, domains) = if input.len() < self.llm_threshold_chars {
            let domains = detect_domains(input);
            (heuristic_complexity(input, &domains), domains)
        } else {
            match self.llm_sense(input).await {
                Some((score, domains)) => (score, domains),
                None => {
                    debug!("sense: llm parse failed, falling back to heuristic");
                    let domains = detect_domains(input);
                    (heuristic_complexity(input, &domains), domains)
                }
            }
        };

        let bias: f64 = domains.iter().filter_map(|d| calibration_bias.get(d)).sum();
        complexity = (complexity as f64 + bias).clamp(0.0, 1.0) as f32;

        TaskSpec { input: input.to_string(), token_budget: token_budget_for(complexity), complexity, domains }
    }

    async fn llm_sense(&self, input: &str) -> Option<(f32, Vec<String>)> {
        let prompt = format!(
            "Classify this task's complexity (0-1) and domains as JSON \
             {{\"score\": f, \"domains\": [..], \"reasoning\": \"...\"}}: {input}"
        );
        let params = CompletionParams {
            messages: vec![Message::user(prompt)],
            tools: vec![],
            max_tokens: 256,
            temperature: 0.0,
            stop: None,
        };
        let response = self.provider.complete(params).await.ok()?;
        let start = response.content.find('{')?;
        let end = response.content.rfind('}')?;
        let parsed: LlmSenseResponse = serde_json::from_str(&response.content[start..=end]).ok()?;
        Some((parsed.score.clamp(0.0, 1.0), parsed.domains))
    }
}
