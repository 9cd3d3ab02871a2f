//! Rubric Scorer: five independent metric calculators combined with
//! genre-specific weights/thresholds from a Blueprint, with override and
//! A/B-test precedence.
//!
//! Grounded on `rubric_scorer.py`'s `RubricScorer`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::policy::profanity_filter::{ProfanityFilter, ProfanityMode};
use crate::taxonomy::{Blueprint, GenreOverride, RubricOverrideDoc};

/// One section of a generated lyric artifact: a raw label (`"Pre-Chorus 1"`)
/// and its lines, already split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub label: String,
    pub lines: Vec<String>,
}

/// The full artifact bundle the Rubric Scorer evaluates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub genre: String,
    pub sections: Vec<Section>,
}

impl Artifact {
    fn all_lines(&self) -> Vec<&str> {
        self.sections.iter().flat_map(|s| s.lines.iter().map(String::as_str)).collect()
    }
}

/// `verse | chorus | bridge | prechorus | intro | outro | other`.
pub const SECTION_TYPES: &[&str] = &["verse", "chorus", "bridge", "prechorus", "intro", "outro"];

/// Maps a raw section label to one of [`SECTION_TYPES`] (or `"other"`).
///
/// The substring checks are deliberately ordered `chorus` before
/// `prechorus`, so a label literally containing "Pre-Chorus" matches the
/// `chorus` branch first. This reproduces the original's behavior verbatim
/// (see the "Section-type normalization" Design Note) rather than fixing
/// what looks like an oversight — fixing it would change every rubric score
/// computed against this metric.
pub fn normalize_section_type(label: &str) -> &'static str {
    let lower = label.to_lowercase();
    if lower.contains("chorus") {
        "chorus"
    } else if lower.contains("verse") {
        "verse"
    } else if lower.contains("bridge") {
        "bridge"
    } else if lower.contains("prechorus") || lower.contains("pre-chorus") || lower.contains("pre chorus") {
        "prechorus"
    } else if lower.contains("intro") {
        "intro"
    } else if lower.contains("outro") {
        "outro"
    } else {
        "other"
    }
}

fn count_syllables(word: &str) -> usize {
    let lower: Vec<char> = word.to_lowercase().chars().filter(|c| c.is_alphabetic()).collect();
    if lower.is_empty() {
        return 1;
    }
    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut groups = 0;
    let mut in_group = false;
    for &c in &lower {
        if is_vowel(c) {
            if !in_group {
                groups += 1;
                in_group = true;
            }
        } else {
            in_group = false;
        }
    }
    if lower.len() > 1 && lower[lower.len() - 1] == 'e' && groups > 1 {
        groups -= 1;
    }
    groups.max(1)
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Extract all contiguous word n-grams of length >= 3 from `line`.
fn ngrams_at_least_3(line: &str) -> Vec<String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let mut out = Vec::new();
    for n in 3..=words.len() {
        for window in words.windows(n) {
            out.push(window.join(" ").to_lowercase());
        }
    }
    out
}

fn words_rhyme(a: &str, b: &str) -> bool {
    let a = a.trim_end_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    let b = b.trim_end_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    if a == b || a.len() < 2 || b.len() < 2 {
        return false;
    }
    let suffix2 = |s: &str| s.chars().rev().take(2).collect::<String>();
    let suffix3 = |s: &str| s.chars().rev().take(3).collect::<String>();
    // Both the 2- and 3-letter checks are kept, even though the 3-letter
    // match implies the 2-letter one whenever both words are long enough —
    // preserved as two independent ORed conditions, matching the original.
    suffix2(&a) == suffix2(&b) || (a.len() >= 3 && b.len() >= 3 && suffix3(&a) == suffix3(&b))
}

fn last_word(line: &str) -> Option<&str> {
    line.split_whitespace().last()
}

/// Decision produced by [`validate_thresholds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdDecision {
    Pass,
    Borderline,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub metrics: HashMap<String, f64>,
    pub total: f64,
    pub weights: HashMap<String, f64>,
    pub min_total: f64,
    pub max_profanity: f64,
    pub explanations: HashMap<String, String>,
    pub decision: ThresholdDecision,
    pub margin: f64,
    pub debug: HashMap<String, serde_json::Value>,
}

pub struct RubricScorer {
    blueprint: Blueprint,
    overrides: RubricOverrideDoc,
}

const METRIC_NAMES: &[&str] = &[
    "hook_density",
    "singability",
    "rhyme_tightness",
    "section_completeness",
    "profanity_score",
];

impl RubricScorer {
    pub fn new(blueprint: Blueprint, overrides: RubricOverrideDoc) -> Self {
        Self { blueprint, overrides }
    }

    /// Weight resolution precedence (highest first): first enabled A/B test
    /// whose genre list contains `genre` (one-shot — the first match wins,
    /// no further tests are consulted) → genre-specific override → Blueprint
    /// default. An override (or A/B branch) whose weights don't sum to 1.0
    /// within tolerance, or that names a weight outside `[0,1]`, is rejected
    /// wholesale and resolution falls through to the next tier.
    fn resolve_weights(&self, genre: &str) -> HashMap<String, f64> {
        let tolerance = self.overrides.validation.weight_sum_tolerance;

        let mut test_ids: Vec<&String> = self.overrides.ab_tests.keys().collect();
        test_ids.sort();
        for id in test_ids {
            let test = &self.overrides.ab_tests[id];
            if test.enabled && test.genres.iter().any(|g| g == genre) {
                if let Some(weights) = &test.overrides.weights {
                    if valid_weight_map(weights, tolerance) {
                        return weights.clone();
                    }
                }
                break;
            }
        }

        if let Some(genre_override) = self.overrides.overrides.get(genre) {
            if let Some(weights) = &genre_override.weights {
                if valid_weight_map(weights, tolerance) {
                    return weights.clone();
                }
            }
        }

        self.blueprint.rubric.weights.clone()
    }

    fn resolve_thresholds(&self, genre: &str) -> (f64, f64) {
        let mut test_ids: Vec<&String> = self.overrides.ab_tests.keys().collect();
        test_ids.sort();
        for id in test_ids {
            let test = &self.overrides.ab_tests[id];
            if test.enabled && test.genres.iter().any(|g| g == genre) {
                if let Some(t) = &test.overrides.thresholds {
                    if let (Some(min_total), Some(max_profanity)) = (t.get("min_total"), t.get("max_profanity")) {
                        return (*min_total, *max_profanity);
                    }
                }
                break;
            }
        }

        if let Some(genre_override) = self.overrides.overrides.get(genre) {
            if let Some(t) = &genre_override.thresholds {
                if let (Some(min_total), Some(max_profanity)) = (t.get("min_total"), t.get("max_profanity")) {
                    return (*min_total, *max_profanity);
                }
            }
        }

        (self.blueprint.rubric.min_total, self.blueprint.rubric.max_profanity)
    }

    pub fn calculate_hook_density(&self, artifact: &Artifact) -> (f64, String) {
        let mut ngram_counts: HashMap<String, usize> = HashMap::new();
        let mut line_ngrams: Vec<Vec<String>> = Vec::new();
        let mut is_chorus: Vec<bool> = Vec::new();

        for section in &artifact.sections {
            let chorus = normalize_section_type(&section.label) == "chorus";
            for line in &section.lines {
                let grams = ngrams_at_least_3(line);
                for g in &grams {
                    *ngram_counts.entry(g.clone()).or_insert(0) += 1;
                }
                line_ngrams.push(grams);
                is_chorus.push(chorus);
            }
        }

        if line_ngrams.is_empty() {
            return (0.0, "no lines to evaluate".to_string());
        }

        let recurring: HashSet<&String> = ngram_counts.iter().filter(|(_, &c)| c >= 2).map(|(g, _)| g).collect();

        let mut weighted_hits = 0.0;
        for (grams, chorus) in line_ngrams.iter().zip(is_chorus.iter()) {
            if grams.iter().any(|g| recurring.contains(g)) {
                weighted_hits += if *chorus { 1.5 } else { 1.0 };
            }
        }

        let score = (weighted_hits / line_ngrams.len() as f64).min(1.0);
        (score, format!("{:.0} of {} lines contain a recurring hook phrase", weighted_hits, line_ngrams.len()))
    }

    pub fn calculate_singability(&self, artifact: &Artifact) -> (f64, String) {
        let mut syllables_by_type: HashMap<&'static str, Vec<f64>> = HashMap::new();
        let mut lengths_by_type: HashMap<&'static str, Vec<f64>> = HashMap::new();
        let mut total_words = 0usize;
        let mut complex_words = 0usize;

        for section in &artifact.sections {
            let kind = normalize_section_type(&section.label);
            for line in &section.lines {
                let syllables: usize = line.split_whitespace().map(count_syllables).sum();
                syllables_by_type.entry(kind).or_default().push(syllables as f64);
                lengths_by_type.entry(kind).or_default().push(line.chars().count() as f64);

                for word in line.split_whitespace() {
                    total_words += 1;
                    if count_syllables(word) > 3 {
                        complex_words += 1;
                    }
                }
            }
        }

        let syllable_consistency = average_normalized_variance(&syllables_by_type, 25.0);
        let length_consistency = average_normalized_variance(&lengths_by_type, 400.0);

        let complex_ratio = if total_words == 0 { 0.0 } else { complex_words as f64 / total_words as f64 };
        let complexity_score = (1.0 - (complex_ratio / 0.3)).clamp(0.0, 1.0);

        let score = 0.4 * syllable_consistency + 0.3 * complexity_score + 0.3 * length_consistency;
        (
            score.clamp(0.0, 1.0),
            format!(
                "syllable consistency {syllable_consistency:.2}, word complexity ratio {complex_ratio:.2}, \
                 line-length consistency {length_consistency:.2}"
            ),
        )
    }

    pub fn calculate_rhyme_tightness(&self, artifact: &Artifact) -> (f64, String) {
        let lines: Vec<&str> = artifact.all_lines();
        let total_lines = lines.len();
        let expected_pairs = total_lines / 2;
        if expected_pairs == 0 {
            return (0.0, "not enough lines to evaluate rhyme scheme".to_string());
        }

        let last_words: Vec<Option<&str>> = lines.iter().map(|l| last_word(l)).collect();

        let mut candidate_pairs: Vec<(usize, usize)> = Vec::new();
        let mut i = 0;
        while i + 1 < total_lines {
            candidate_pairs.push((i, i + 1));
            i += 2;
        }
        let mut j = 0;
        while j + 3 < total_lines {
            candidate_pairs.push((j, j + 2));
            candidate_pairs.push((j + 1, j + 3));
            j += 4;
        }
        candidate_pairs.sort();
        candidate_pairs.dedup();

        let mut matched = 0usize;
        for (a, b) in &candidate_pairs {
            if let (Some(wa), Some(wb)) = (last_words.get(*a).copied().flatten(), last_words.get(*b).copied().flatten()) {
                if words_rhyme(wa, wb) {
                    matched += 1;
                }
            }
        }

        let score = (matched as f64 / expected_pairs as f64).min(1.0);
        (score, format!("{matched} of {expected_pairs} expected rhyme pairs matched"))
    }

    pub fn calculate_section_completeness(&self, artifact: &Artifact, required: &[String]) -> (f64, String) {
        if required.is_empty() {
            return (1.0, "no required sections configured".to_string());
        }

        let mut present: HashMap<&str, usize> = HashMap::new();
        for section in &artifact.sections {
            let kind = normalize_section_type(&section.label);
            let non_empty = section.lines.iter().filter(|l| !l.trim().is_empty()).count();
            *present.entry(kind).or_insert(0) = present.get(kind).copied().unwrap_or(0).max(non_empty);
        }

        let required_set: HashSet<&str> = required.iter().map(String::as_str).collect();
        let present_types: HashSet<&str> = present.keys().copied().collect();
        let intersection = required_set.intersection(&present_types).count();

        let mut score = intersection as f64 / required_set.len() as f64;
        let mut thin_sections = 0;
        for kind in &required_set {
            if let Some(&lines) = present.get(kind) {
                if lines < 2 {
                    score -= 0.1;
                    thin_sections += 1;
                }
            }
        }

        (
            score.clamp(0.0, 1.0),
            format!("{intersection}/{} required sections present, {thin_sections} too thin", required_set.len()),
        )
    }

    pub fn calculate_profanity_score(&self, artifact: &Artifact, filter: &ProfanityFilter, mode: ProfanityMode) -> (f64, String) {
        let lines: Vec<&str> = artifact.all_lines();
        if lines.is_empty() {
            return (1.0, "no lines to evaluate".to_string());
        }

        let violating = lines
            .iter()
            .filter(|line| {
                let hits = filter.detect(line);
                filter.exceeds_threshold(&hits, mode, word_count(line))
            })
            .count();

        let score = 1.0 - (violating as f64 / lines.len() as f64);
        (score, format!("{violating} of {} lines exceeded the profanity threshold", lines.len()))
    }

    /// Run all five metrics, resolve weights/thresholds for `artifact.genre`,
    /// and produce the combined report.
    pub fn score_artifacts(&self, artifact: &Artifact, filter: &ProfanityFilter, mode: ProfanityMode) -> ScoreReport {
        let weights = self.resolve_weights(&artifact.genre);
        let (min_total, max_profanity) = self.resolve_thresholds(&artifact.genre);

        let (hook_density, hook_explanation) = self.calculate_hook_density(artifact);
        let (singability, singability_explanation) = self.calculate_singability(artifact);
        let (rhyme_tightness, rhyme_explanation) = self.calculate_rhyme_tightness(artifact);
        let (section_completeness, section_explanation) =
            self.calculate_section_completeness(artifact, &self.blueprint.rules.required_sections);
        let (profanity_score, profanity_explanation) = self.calculate_profanity_score(artifact, filter, mode);

        let mut metrics = HashMap::new();
        metrics.insert("hook_density".to_string(), hook_density);
        metrics.insert("singability".to_string(), singability);
        metrics.insert("rhyme_tightness".to_string(), rhyme_tightness);
        metrics.insert("section_completeness".to_string(), section_completeness);
        metrics.insert("profanity_score".to_string(), profanity_score);

        let mut explanations = HashMap::new();
        explanations.insert("hook_density".to_string(), hook_explanation);
        explanations.insert("singability".to_string(), singability_explanation);
        explanations.insert("rhyme_tightness".to_string(), rhyme_explanation);
        explanations.insert("section_completeness".to_string(), section_explanation);
        explanations.insert("profanity_score".to_string(), profanity_explanation);

        let total: f64 = METRIC_NAMES
            .iter()
            .map(|name| weights.get(*name).copied().unwrap_or(0.0) * metrics.get(*name).copied().unwrap_or(0.0))
            .sum();

        let mut debug = HashMap::new();
        debug.insert("genre".to_string(), serde_json::json!(artifact.genre));
        debug.insert("section_count".to_string(), serde_json::json!(artifact.sections.len()));

        let (decision, margin) = validate_thresholds(total, profanity_score, min_total, max_profanity);

        ScoreReport {
            metrics,
            total,
            weights,
            min_total,
            max_profanity,
            explanations,
            decision,
            margin,
            debug,
        }
    }

    /// Per-metric improvement messages for anything scoring below 0.75, plus
    /// targeted notes for missing sections and excess profanity.
    pub fn suggest_improvements(&self, report: &ScoreReport) -> Vec<String> {
        let mut suggestions = Vec::new();
        for name in METRIC_NAMES {
            if let Some(&score) = report.metrics.get(*name) {
                if score < 0.75 {
                    suggestions.push(format!(
                        "{name} scored {score:.2} (below 0.75): {}",
                        report.explanations.get(*name).cloned().unwrap_or_default()
                    ));
                }
            }
        }
        if report.metrics.get("section_completeness").copied().unwrap_or(1.0) < 1.0 {
            suggestions.push("add the missing required sections for this genre's blueprint".to_string());
        }
        if report.metrics.get("profanity_score").copied().unwrap_or(1.0) < 1.0 {
            suggestions.push("reduce profanity violations to raise the profanity_score metric".to_string());
        }
        suggestions
    }
}

fn valid_weight_map(weights: &HashMap<String, f64>, tolerance: f64) -> bool {
    if weights.values().any(|w| !(0.0..=1.0).contains(w)) {
        return false;
    }
    let sum: f64 = weights.values().sum();
    (sum - 1.0).abs() <= tolerance
}

fn average_normalized_variance(by_type: &HashMap<&'static str, Vec<f64>>, max_expected_variance: f64) -> f64 {
    if by_type.is_empty() {
        return 1.0;
    }
    let scores: Vec<f64> = by_type
        .values()
        .map(|values| (1.0 - variance(values) / max_expected_variance).clamp(0.0, 1.0))
        .collect();
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// `PASS` if both the total and inverse-profanity margins clear the
/// threshold with more than a flat 0.05 to spare; `BORDERLINE` if passing
/// but within that margin; `FAIL` otherwise.
///
/// The original's `validate_thresholds` tests `0 <= total_margin <= 0.05` —
/// a flat absolute margin, not "5% of the threshold value" as the
/// distilled spec's prose might suggest. This preserves the original's
/// literal behavior; see DESIGN.md for the explicit decision record.
pub fn validate_thresholds(total: f64, profanity_score: f64, min_total: f64, max_profanity: f64) -> (ThresholdDecision, f64) {
    let violation_ratio = 1.0 - profanity_score;
    let passed = total >= min_total && violation_ratio <= max_profanity;

    let margin_total = total - min_total;
    let margin_profanity = max_profanity - violation_ratio;
    let margin = margin_total.min(margin_profanity);

    let decision = if !passed {
        ThresholdDecision::Fail
    } else if (0.0..=0.05).contains(&margin) {
        ThresholdDecision::Borderline
    } else {
        ThresholdDecision::Pass
    };

    (decision, margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{default_rubric_thresholds, default_rubric_weights, Blueprint, BlueprintRubric, BlueprintRules};
    use std::collections::HashMap as Map;

    fn blueprint() -> Blueprint {
        let (min_total, max_profanity) = default_rubric_thresholds();
        Blueprint {
            genre: "pop".to_string(),
            version: "1.0".to_string(),
            rules: BlueprintRules {
                tempo_min: Some(100),
                tempo_max: Some(120),
                required_sections: vec!["verse".to_string(), "chorus".to_string()],
                duration_min_minutes: None,
                duration_max_minutes: None,
            },
            rubric: BlueprintRubric {
                weights: default_rubric_weights(),
                min_total,
                max_profanity,
            },
            tag_categories: Map::new(),
            conflict_matrix: Map::new(),
        }
    }

    fn scorer() -> RubricScorer {
        RubricScorer::new(blueprint(), RubricOverrideDoc::default())
    }

    fn profanity_filter() -> ProfanityFilter {
        ProfanityFilter::new(vec![], vec![], Map::new(), Map::new(), Map::new()).unwrap()
    }

    #[test]
    fn prechorus_label_normalizes_to_chorus() {
        assert_eq!(normalize_section_type("Pre-Chorus 1"), "chorus");
        assert_eq!(normalize_section_type("Verse 2"), "verse");
        assert_eq!(normalize_section_type("Outro"), "outro");
    }

    #[test]
    fn words_rhyme_checks_suffix_match() {
        assert!(words_rhyme("night", "light"));
        assert!(!words_rhyme("night", "night"));
        assert!(!words_rhyme("love", "move"));
    }

    #[test]
    fn hook_density_rewards_repeated_chorus_phrase() {
        let artifact = Artifact {
            genre: "pop".to_string(),
            sections: vec![
                Section {
                    label: "Verse 1".to_string(),
                    lines: vec!["walking down the street today".to_string()],
                },
                Section {
                    label: "Chorus".to_string(),
                    lines: vec!["we are never going back".to_string()],
                },
                Section {
                    label: "Chorus".to_string(),
                    lines: vec!["we are never going back".to_string()],
                },
            ],
        };
        let scorer = scorer();
        let (score, _) = scorer.calculate_hook_density(&artifact);
        assert!(score > 0.0);
    }

    #[test]
    fn section_completeness_detects_missing_required_section() {
        let artifact = Artifact {
            genre: "pop".to_string(),
            sections: vec![Section {
                label: "Verse 1".to_string(),
                lines: vec!["line one".to_string(), "line two".to_string()],
            }],
        };
        let scorer = scorer();
        let (score, _) = scorer.calculate_section_completeness(&artifact, &scorer.blueprint.rules.required_sections);
        assert_eq!(score, 0.5);
    }

    #[test]
    fn validate_thresholds_flat_margin_behavior() {
        let (decision, margin) = validate_thresholds(0.79, 1.0, 0.75, 0.1);
        assert_eq!(decision, ThresholdDecision::Borderline);
        assert!((margin - 0.04).abs() < 1e-9);

        let (decision, _) = validate_thresholds(0.95, 1.0, 0.75, 0.1);
        assert_eq!(decision, ThresholdDecision::Pass);

        let (decision, _) = validate_thresholds(0.5, 1.0, 0.75, 0.1);
        assert_eq!(decision, ThresholdDecision::Fail);
    }

    #[test]
    fn suggest_improvements_flags_low_scoring_metrics() {
        let mut report = ScoreReport {
            metrics: HashMap::new(),
            total: 0.5,
            weights: default_rubric_weights(),
            min_total: 0.75,
            max_profanity: 0.1,
            explanations: HashMap::new(),
            decision: ThresholdDecision::Fail,
            margin: -0.2,
            debug: HashMap::new(),
        };
        report.metrics.insert("hook_density".to_string(), 0.3);
        report.metrics.insert("singability".to_string(), 0.9);
        report.metrics.insert("rhyme_tightness".to_string(), 0.9);
        report.metrics.insert("section_completeness".to_string(), 1.0);
        report.metrics.insert("profanity_score".to_string(), 1.0);

        let scorer = scorer();
        let suggestions = scorer.suggest_improvements(&report);
        assert!(suggestions.iter().any(|s| s.starts_with("hook_density")));
    }

    #[test]
    fn profanity_score_is_perfect_with_no_violations() {
        let artifact = Artifact {
            genre: "pop".to_string(),
            sections: vec![Section {
                label: "Verse 1".to_string(),
                lines: vec!["an upbeat summer anthem".to_string()],
            }],
        };
        let scorer = scorer();
        let filter = profanity_filter();
        let (score, _) = scorer.calculate_profanity_score(&artifact, &filter, ProfanityMode::Clean);
        assert_eq!(score, 1.0);
    }
}
