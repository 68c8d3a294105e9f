//! Pattern-matched fallback responses.
//!
//! Last line of defense: when a call fails terminally (circuit open,
//! retries exhausted, admission rejected), the executor answers with a
//! canned task payload instead of an error. Matching is intent-based
//! keyword detection over the prompt; rules are checked in a fixed
//! order and the first match wins, so a prompt that mentions both
//! "mine" and "build" always gets the same answer. Prompts that match
//! nothing get a safe wait action.
//!
//! Fallback responses are transparent about their origin: provider id
//! [`FALLBACK_PROVIDER_ID`], model [`FALLBACK_MODEL`], zero tokens and
//! latency, and the thoughts field is tagged `[Fallback]`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::SvalinnError;
use crate::types::LlmResponse;

/// Provider id stamped on fallback responses.
pub const FALLBACK_PROVIDER_ID: &str = "fallback";

/// Model name stamped on fallback responses.
pub const FALLBACK_MODEL: &str = "fallback-pattern-matcher";

struct Rule {
    category: &'static str,
    pattern: Regex,
    response: &'static str,
}

fn rule(category: &'static str, pattern: &str, response: &'static str) -> Rule {
    Rule {
        category,
        // The alternations are fixed valid regexes; this cannot fail.
        pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid fallback pattern: {e}")),
        response,
    }
}

/// Intent rules in fixed precedence: mining, building, combat,
/// following, movement, placement, stop. Matching runs on the
/// lowercased prompt so the patterns themselves stay case-sensitive.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(
            "mine",
            r"mine|dig|collect|gather|ore|diamond|iron|coal|stone",
            r#"{"thoughts":"[Fallback] Mining action detected","tasks":[{"action":"mine","target":"iron_ore","quantity":10}]}"#,
        ),
        rule(
            "build",
            r"(build|construct|create|make).*(house|home|shelter|structure|base)",
            r#"{"thoughts":"[Fallback] Building action detected","tasks":[{"action":"build","structure":"house","size":"small"}]}"#,
        ),
        rule(
            "attack",
            r"attack|fight|kill|destroy|hostile|monster|zombie|skeleton|creeper",
            r#"{"thoughts":"[Fallback] Combat action detected","tasks":[{"action":"attack","target":"nearest_hostile"}]}"#,
        ),
        rule(
            "follow",
            r"follow|come|here|with me|accompany",
            r#"{"thoughts":"[Fallback] Follow action detected","tasks":[{"action":"follow","target":"player"}]}"#,
        ),
        rule(
            "move",
            r"go to|move to|walk to|travel|path|navigate",
            r#"{"thoughts":"[Fallback] Movement action detected","tasks":[{"action":"pathfind","target":"player"}]}"#,
        ),
        rule(
            "place",
            r"(place|put|set).*(block|torch|door)",
            r#"{"thoughts":"[Fallback] Placement action detected","tasks":[{"action":"place_block","block":"torch","position":"here"}]}"#,
        ),
        rule(
            "stop",
            r"stop|halt|cancel|wait|pause|stay",
            r#"{"thoughts":"[Fallback] Stop action detected","tasks":[{"action":"wait","duration":5}]}"#,
        ),
    ]
});

const DEFAULT_RESPONSE: &str =
    r#"{"thoughts":"[Fallback] No pattern matched, waiting","tasks":[{"action":"wait","duration":5}]}"#;

/// Generates canned responses when the provider pipeline fails.
#[derive(Debug, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Produce a fallback response for a failed prompt.
    ///
    /// Total: always returns a response, never an error.
    pub fn generate(&self, prompt: &str, error: &SvalinnError) -> LlmResponse {
        warn!(
            prompt = %truncate(prompt, 50),
            error = %error,
            "generating fallback response"
        );
        let content = self.match_prompt(prompt);
        LlmResponse::new(content, FALLBACK_MODEL, FALLBACK_PROVIDER_ID)
            .tokens_used(0)
            .latency_ms(0)
    }

    /// Whether a prompt would hit a rule rather than the default.
    pub fn would_match(&self, prompt: &str) -> bool {
        let lower = prompt.to_lowercase();
        !prompt.is_empty() && RULES.iter().any(|r| r.pattern.is_match(&lower))
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        RULES.len()
    }

    fn match_prompt(&self, prompt: &str) -> &'static str {
        if prompt.is_empty() {
            return DEFAULT_RESPONSE;
        }
        let lower = prompt.to_lowercase();
        for rule in RULES.iter() {
            if rule.pattern.is_match(&lower) {
                debug!(category = rule.category, "fallback rule matched");
                return rule.response;
            }
        }
        debug!("no fallback rule matched, using wait action");
        DEFAULT_RESPONSE
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}
