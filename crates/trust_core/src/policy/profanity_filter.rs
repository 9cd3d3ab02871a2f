//! Profanity detection: taxonomy-driven term matching with leetspeak
//! variation and whitelist suppression.
//!
//! Grounded on `policy_guards.py`'s `ProfanityFilter`. The taxonomy itself
//! (terms, whitelist, leetspeak table, per-mode thresholds) is untrusted
//! input loaded by [`crate::taxonomy`]; this module only holds the detection
//! algorithm.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustError};

/// Four severity bands a profane term can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfanitySeverity {
    Mild,
    Moderate,
    Strong,
    Extreme,
}

impl ProfanitySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::Extreme => "extreme",
        }
    }
}

/// Enforcement mode, from most to least permissive downstream, matching the
/// original's four named levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfanityMode {
    Clean,
    MildAllowed,
    ModerateAllowed,
    Explicit,
}

/// Per-mode limits: `-1` in the source means unlimited, modeled here as
/// `None`.
#[derive(Debug, Clone)]
pub struct ModeThreshold {
    pub max_count: HashMap<ProfanitySeverity, Option<u32>>,
    pub max_score: f64,
}

/// One detected profane occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfanityHit {
    pub term: String,
    pub position: usize,
    pub severity: ProfanitySeverity,
    pub context: String,
    pub normalized_form: String,
    pub original_form: String,
}

/// The compiled, ready-to-match form of the taxonomy. Built once from a
/// [`crate::taxonomy::ProfanityTaxonomyDoc`] at load time and shared
/// read-only thereafter (see §5 of the design notes on pattern caching).
pub struct ProfanityFilter {
    category_terms: Vec<(ProfanitySeverity, Vec<String>)>,
    word_patterns: HashMap<String, Regex>,
    variation_patterns: HashMap<String, Vec<Regex>>,
    whitelist: Vec<String>,
    severity_weights: HashMap<ProfanitySeverity, f64>,
    thresholds: HashMap<ProfanityMode, ModeThreshold>,
    leetspeak: HashMap<char, Vec<char>>,
}

const MAX_VARIATIONS_PER_TERM: usize = 10;
const WHITELIST_WINDOW: usize = 20;

impl ProfanityFilter {
    pub fn new(
        categories: Vec<(ProfanitySeverity, Vec<String>)>,
        whitelist: Vec<String>,
        severity_weights: HashMap<ProfanitySeverity, f64>,
        thresholds: HashMap<ProfanityMode, ModeThreshold>,
        leetspeak: HashMap<char, Vec<char>>,
    ) -> Result<Self> {
        let mut category_terms = categories;
        for (_, terms) in category_terms.iter_mut() {
            terms.sort();
        }

        let mut word_patterns = HashMap::new();
        let mut variation_patterns = HashMap::new();
        for (_, terms) in &category_terms {
            for term in terms {
                if word_patterns.contains_key(term) {
                    continue;
                }
                let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
                let compiled = Regex::new(&pattern)
                    .map_err(|e| TrustError::BadRequest(format!("invalid profanity term '{term}': {e}")))?;
                word_patterns.insert(term.clone(), compiled);

                let variants = generate_leetspeak_variants(term, &leetspeak, MAX_VARIATIONS_PER_TERM);
                let mut compiled_variants = Vec::with_capacity(variants.len());
                for variant in variants {
                    let pattern = format!(r"(?i)\b{}\b", regex::escape(&variant));
                    compiled_variants.push(Regex::new(&pattern).map_err(|e| {
                        TrustError::BadRequest(format!("invalid profanity variant '{variant}': {e}"))
                    })?);
                }
                variation_patterns.insert(term.clone(), compiled_variants);
            }
        }

        Ok(Self {
            category_terms,
            word_patterns,
            variation_patterns,
            whitelist,
            severity_weights,
            thresholds,
            leetspeak,
        })
    }

    /// Collapse in-word masking (`f*ck`, `f-u-c-k`) and single-character
    /// spacing (`f u c k`) into a contiguous word, for variation matching
    /// only — the original text and its offsets are never altered.
    fn normalize(&self, text: &str) -> String {
        let masked = Regex::new(r"(?i)([a-z])[*_-]([a-z])").unwrap();
        let mut normalized = text.to_string();
        // masking chars can chain ("f*u*c*k"), so collapse until stable.
        loop {
            let next = masked.replace_all(&normalized, "$1$2").into_owned();
            if next == normalized {
                break;
            }
            normalized = next;
        }

        let spaced = Regex::new(r"(?i)\b([a-z])(?:\s+([a-z])){2,}\b").unwrap();
        spaced
            .replace_all(&normalized, |caps: &regex::Captures| {
                caps.iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str())
                    .collect::<String>()
            })
            .into_owned()
    }

    fn window(&self, text: &str, start: usize, end: usize) -> String {
        let lo = start.saturating_sub(WHITELIST_WINDOW);
        let hi = (end + WHITELIST_WINDOW).min(text.len());
        text.get(lo..hi).unwrap_or(text).to_string()
    }

    fn is_whitelisted(&self, window: &str) -> bool {
        let lower = window.to_lowercase();
        self.whitelist.iter().any(|w| lower.contains(&w.to_lowercase()))
    }

    fn redacted_context(&self, text: &str, start: usize, end: usize) -> String {
        let window = self.window(text, start, end);
        let rel_start = start.saturating_sub(start.saturating_sub(WHITELIST_WINDOW));
        let span_len = end - start;
        let mut out = String::new();
        out.push_str(window.get(..rel_start.min(window.len())).unwrap_or(""));
        out.push_str(&"*".repeat(span_len));
        let after = rel_start + span_len;
        out.push_str(window.get(after.min(window.len())..).unwrap_or(""));
        out
    }

    /// Run the full detection pipeline against one block of text: word
    /// boundary matches first, then leetspeak variation matches, in
    /// taxonomy (severity) order; whitelist hits are dropped.
    pub fn detect(&self, text: &str) -> Vec<ProfanityHit> {
        let normalized = self.normalize(text);
        let mut hits = Vec::new();

        for (severity, terms) in &self.category_terms {
            for term in terms {
                if let Some(pattern) = self.word_patterns.get(term) {
                    for m in pattern.find_iter(text) {
                        let window = self.window(text, m.start(), m.end());
                        if self.is_whitelisted(&window) {
                            continue;
                        }
                        hits.push(ProfanityHit {
                            term: term.clone(),
                            position: m.start(),
                            severity: *severity,
                            context: self.redacted_context(text, m.start(), m.end()),
                            normalized_form: term.clone(),
                            original_form: m.as_str().to_string(),
                        });
                    }
                }
            }
        }

        for (severity, terms) in &self.category_terms {
            for term in terms {
                let Some(variants) = self.variation_patterns.get(term) else {
                    continue;
                };
                for variant in variants {
                    for m in variant.find_iter(&normalized) {
                        let window = self.window(&normalized, m.start(), m.end());
                        if self.is_whitelisted(&window) {
                            continue;
                        }
                        hits.push(ProfanityHit {
                            term: term.clone(),
                            position: m.start(),
                            severity: *severity,
                            context: self.redacted_context(&normalized, m.start(), m.end()),
                            normalized_form: m.as_str().to_string(),
                            original_form: m.as_str().to_string(),
                        });
                    }
                }
            }
        }

        hits
    }

    /// `sum(severity_weight * count) / word_count * 100`, clamped to 1.0.
    pub fn score(&self, hits: &[ProfanityHit], word_count: usize) -> f64 {
        if word_count == 0 {
            return 0.0;
        }
        let weighted: f64 = hits
            .iter()
            .map(|h| self.severity_weights.get(&h.severity).copied().unwrap_or(0.0))
            .sum();
        (weighted / word_count as f64 * 100.0).min(1.0)
    }

    /// Whether `hits` breach `mode`'s per-severity counts or overall score.
    pub fn exceeds_threshold(&self, hits: &[ProfanityHit], mode: ProfanityMode, word_count: usize) -> bool {
        let Some(threshold) = self.thresholds.get(&mode) else {
            return !hits.is_empty();
        };

        let mut counts: HashMap<ProfanitySeverity, u32> = HashMap::new();
        for hit in hits {
            *counts.entry(hit.severity).or_insert(0) += 1;
        }

        for (severity, max) in &threshold.max_count {
            if let Some(max) = max {
                if counts.get(severity).copied().unwrap_or(0) > *max {
                    return true;
                }
            }
        }

        self.score(hits, word_count) > threshold.max_score
    }

    /// Runs [`detect`](Self::detect) and [`exceeds_threshold`] together —
    /// the combined shape the original exposes as `get_violation_report`.
    pub fn violation_report(&self, text: &str, mode: ProfanityMode) -> ProfanityReport {
        let word_count = text.split_whitespace().count();
        let hits = self.detect(text);
        let score = self.score(&hits, word_count);
        let exceeds = self.exceeds_threshold(&hits, mode, word_count);
        ProfanityReport {
            score,
            exceeds_threshold: exceeds,
            hits,
        }
    }

    pub fn leetspeak_table(&self) -> &HashMap<char, Vec<char>> {
        &self.leetspeak
    }
}

#[derive(Debug, Clone)]
pub struct ProfanityReport {
    pub hits: Vec<ProfanityHit>,
    pub score: f64,
    pub exceeds_threshold: bool,
}

fn generate_leetspeak_variants(term: &str, table: &HashMap<char, Vec<char>>, cap: usize) -> Vec<String> {
    let mut variants: Vec<String> = vec![term.to_string()];
    let chars: Vec<char> = term.chars().collect();

    for (i, ch) in chars.iter().enumerate() {
        if variants.len() >= cap {
            break;
        }
        let Some(subs) = table.get(&ch.to_ascii_lowercase()) else {
            continue;
        };
        let base = variants.clone();
        'subs: for sub in subs {
            for v in &base {
                if variants.len() >= cap {
                    break 'subs;
                }
                let mut v_chars: Vec<char> = v.chars().collect();
                v_chars[i] = *sub;
                let candidate: String = v_chars.into_iter().collect();
                if !variants.contains(&candidate) {
                    variants.push(candidate);
                }
            }
        }
    }

    variants.retain(|v| v != term);
    variants.truncate(cap);
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_filter() -> ProfanityFilter {
        let mut leetspeak = HashMap::new();
        leetspeak.insert('a', vec!['4', '@']);
        leetspeak.insert('s', vec!['5', '$']);

        let mut weights = HashMap::new();
        weights.insert(ProfanitySeverity::Mild, 0.1);
        weights.insert(ProfanitySeverity::Moderate, 0.3);
        weights.insert(ProfanitySeverity::Strong, 0.6);
        weights.insert(ProfanitySeverity::Extreme, 1.0);

        let mut clean_counts = HashMap::new();
        clean_counts.insert(ProfanitySeverity::Mild, Some(0));
        clean_counts.insert(ProfanitySeverity::Moderate, Some(0));
        clean_counts.insert(ProfanitySeverity::Strong, Some(0));
        clean_counts.insert(ProfanitySeverity::Extreme, Some(0));
        let mut mild_counts = HashMap::new();
        mild_counts.insert(ProfanitySeverity::Mild, None);
        mild_counts.insert(ProfanitySeverity::Moderate, Some(0));
        mild_counts.insert(ProfanitySeverity::Strong, Some(0));
        mild_counts.insert(ProfanitySeverity::Extreme, Some(0));

        let mut thresholds = HashMap::new();
        thresholds.insert(
            ProfanityMode::Clean,
            ModeThreshold {
                max_count: clean_counts,
                max_score: 0.0,
            },
        );
        thresholds.insert(
            ProfanityMode::MildAllowed,
            ModeThreshold {
                max_count: mild_counts,
                max_score: 1.0,
            },
        );

        ProfanityFilter::new(
            vec![
                (ProfanitySeverity::Mild, vec!["damn".to_string()]),
                (ProfanitySeverity::Extreme, vec!["ass".to_string()]),
            ],
            vec!["classic".to_string()],
            weights,
            thresholds,
            leetspeak,
        )
        .unwrap()
    }

    #[test]
    fn detects_mild_term_and_reports_severity() {
        let filter = sample_filter();
        let hits = filter.detect("damn this is awful");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, ProfanitySeverity::Mild);
    }

    #[test]
    fn clean_mode_flags_any_hit_mild_mode_does_not() {
        let filter = sample_filter();
        let text = "damn this is awful";
        let hits = filter.detect(text);
        let word_count = text.split_whitespace().count();
        assert!(filter.exceeds_threshold(&hits, ProfanityMode::Clean, word_count));
        assert!(!filter.exceeds_threshold(&hits, ProfanityMode::MildAllowed, word_count));
    }

    #[test]
    fn whitelist_suppresses_embedded_term() {
        let filter = sample_filter();
        let hits = filter.detect("that's a classic ass-kicking film");
        assert!(hits.is_empty());
    }

    #[test]
    fn leetspeak_variant_is_detected_in_normalized_text() {
        let filter = sample_filter();
        let hits = filter.detect("4$$ kicking scene");
        assert!(hits.iter().any(|h| h.term == "ass"));
    }

    #[test]
    fn detection_is_deterministic_across_runs() {
        let filter = sample_filter();
        let text = "damn, that 4$$ joke landed";
        let first = filter.detect(text);
        let second = filter.detect(text);
        let positions = |hits: &[ProfanityHit]| hits.iter().map(|h| (h.position, h.term.clone())).collect::<Vec<_>>();
        assert_eq!(positions(&first), positions(&second));
    }
}
