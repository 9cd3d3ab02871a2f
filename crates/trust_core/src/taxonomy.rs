//! Taxonomy Store: loads and validates the four taxonomy file kinds (§6 of
//! the design notes) plus genre Blueprints, and builds the concrete guard
//! instances (`ProfanityFilter`, `PiiDetector`, `ArtistNormalizer`) the rest
//! of the crate consumes.
//!
//! Grounded on `policy_guards.py`'s `_load_taxonomy` loaders and
//! `rubric_scorer.py`'s blueprint/override loading. Invalid override
//! documents are rejected as a whole — the previously loaded taxonomy stays
//! in place (§7 of the design notes; see `TaxonomyStore::reload`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{Result, TrustError};
use crate::policy::artist_normalizer::{ArtistNormalizer, FuzzyConfig, LivingArtist, NormalizationPattern};
use crate::policy::pii_detector::{NamePattern, PiiDetector, PiiKind, PiiPattern};
use crate::policy::profanity_filter::{ModeThreshold, ProfanityFilter, ProfanityMode, ProfanitySeverity};

fn load_yaml(path: &Path) -> Result<Json> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| TrustError::BadRequest(format!("cannot read taxonomy file '{}': {e}", path.display())))?;
    serde_yaml::from_str(&raw)
        .map_err(|e| TrustError::BadRequest(format!("invalid YAML in '{}': {e}", path.display())))
}

fn validate(schema: &Json, instance: &Json, what: &str) -> Result<()> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| TrustError::Internal(anyhow::anyhow!("invalid built-in {what} schema: {e}")))?;
    validator
        .validate(instance)
        .map_err(|e| TrustError::BadRequest(format!("{what} document failed schema validation: {e}")))
}

fn parse_severity(raw: &str) -> Result<ProfanitySeverity> {
    match raw.to_lowercase().as_str() {
        "mild" => Ok(ProfanitySeverity::Mild),
        "moderate" => Ok(ProfanitySeverity::Moderate),
        "strong" => Ok(ProfanitySeverity::Strong),
        "extreme" => Ok(ProfanitySeverity::Extreme),
        other => Err(TrustError::BadRequest(format!("unknown profanity severity '{other}'"))),
    }
}

fn parse_mode(raw: &str) -> Result<ProfanityMode> {
    match raw.to_lowercase().as_str() {
        "clean" => Ok(ProfanityMode::Clean),
        "mild_allowed" => Ok(ProfanityMode::MildAllowed),
        "moderate_allowed" => Ok(ProfanityMode::ModerateAllowed),
        "explicit" => Ok(ProfanityMode::Explicit),
        other => Err(TrustError::BadRequest(format!("unknown profanity mode '{other}'"))),
    }
}

fn parse_pii_kind(raw: &str) -> Result<PiiKind> {
    match raw.to_lowercase().as_str() {
        "email" => Ok(PiiKind::Email),
        "phone_us" => Ok(PiiKind::PhoneUs),
        "phone_intl" => Ok(PiiKind::PhoneIntl),
        "ssn" => Ok(PiiKind::Ssn),
        "credit_card" => Ok(PiiKind::CreditCard),
        "url" => Ok(PiiKind::Url),
        "address" => Ok(PiiKind::Address),
        "name" => Ok(PiiKind::Name),
        other => Err(TrustError::BadRequest(format!("unknown PII kind '{other}'"))),
    }
}

// --- Profanity taxonomy ----------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProfanityThresholdDoc {
    #[serde(default)]
    max_mild_count: Option<i64>,
    #[serde(default)]
    max_moderate_count: Option<i64>,
    #[serde(default)]
    max_strong_count: Option<i64>,
    #[serde(default)]
    max_extreme_count: Option<i64>,
    max_score: f64,
}

#[derive(Debug, Deserialize)]
struct ProfanityDoc {
    categories: HashMap<String, Vec<String>>,
    severity_weights: HashMap<String, f64>,
    thresholds: HashMap<String, ProfanityThresholdDoc>,
    whitelist: ProfanityWhitelistDoc,
    #[serde(default)]
    variations: ProfanityVariationsDoc,
}

#[derive(Debug, Deserialize)]
struct ProfanityWhitelistDoc {
    #[serde(default)]
    terms: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ProfanityVariationsDoc {
    #[serde(default)]
    leetspeak_patterns: HashMap<String, Vec<char>>,
}

fn profanity_schema() -> Json {
    serde_json::json!({
        "type": "object",
        "required": ["categories", "severity_weights", "thresholds", "whitelist"],
        "properties": {
            "categories": { "type": "object" },
            "severity_weights": { "type": "object" },
            "thresholds": { "type": "object" },
            "whitelist": { "type": "object" }
        }
    })
}

fn build_profanity_filter(doc: ProfanityDoc) -> Result<ProfanityFilter> {
    let mut categories = Vec::new();
    for (severity_name, terms) in &doc.categories {
        let severity = parse_severity(severity_name)?;
        categories.push((severity, terms.clone()));
    }
    categories.sort_by_key(|(s, _)| format!("{s:?}"));

    let mut severity_weights = HashMap::new();
    for (name, weight) in &doc.severity_weights {
        severity_weights.insert(parse_severity(name)?, *weight);
    }

    let mut thresholds = HashMap::new();
    for (mode_name, threshold) in &doc.thresholds {
        let mode = parse_mode(mode_name)?;
        let mut max_count = HashMap::new();
        max_count.insert(ProfanitySeverity::Mild, non_negative(threshold.max_mild_count));
        max_count.insert(ProfanitySeverity::Moderate, non_negative(threshold.max_moderate_count));
        max_count.insert(ProfanitySeverity::Strong, non_negative(threshold.max_strong_count));
        max_count.insert(ProfanitySeverity::Extreme, non_negative(threshold.max_extreme_count));
        thresholds.insert(
            mode,
            ModeThreshold {
                max_count,
                max_score: threshold.max_score,
            },
        );
    }

    ProfanityFilter::new(
        categories,
        doc.whitelist.terms,
        severity_weights,
        thresholds,
        doc.variations.leetspeak_patterns,
    )
}

/// `-1` (or absent) means "unlimited", modeled as `None`.
fn non_negative(value: Option<i64>) -> Option<u32> {
    match value {
        None => None,
        Some(v) if v < 0 => None,
        Some(v) => Some(v as u32),
    }
}

fn load_profanity(path: &Path) -> Result<ProfanityFilter> {
    let raw = load_yaml(path)?;
    validate(&profanity_schema(), &raw, "profanity taxonomy")?;
    let doc: ProfanityDoc = serde_json::from_value(raw)
        .map_err(|e| TrustError::BadRequest(format!("malformed profanity taxonomy: {e}")))?;
    build_profanity_filter(doc)
}

// --- PII taxonomy -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PiiPatternDoc {
    regex: String,
    placeholder: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct PiiDoc {
    patterns: HashMap<String, PiiPatternDoc>,
    #[serde(default)]
    name_patterns: PiiNamePatternsDoc,
    #[serde(default)]
    allowlist: Vec<String>,
    #[serde(default)]
    validation: PiiValidationDoc,
}

/// A single named template entry, carrying its own confidence and
/// placeholder independent of every other template.
#[derive(Debug, Deserialize)]
struct PiiNameTemplateDoc {
    regex: String,
    #[serde(default = "default_name_placeholder")]
    placeholder: String,
    #[serde(default = "default_min_name_confidence")]
    confidence: f64,
}

fn default_name_placeholder() -> String {
    "[NAME]".to_string()
}

#[derive(Debug, Deserialize, Default)]
struct PiiNamePatternsDoc {
    #[serde(default)]
    pattern_templates: HashMap<String, PiiNameTemplateDoc>,
}

#[derive(Debug, Deserialize)]
struct PiiValidationDoc {
    #[serde(default = "default_min_name_confidence")]
    min_name_confidence: f64,
}

impl Default for PiiValidationDoc {
    fn default() -> Self {
        Self {
            min_name_confidence: default_min_name_confidence(),
        }
    }
}

fn default_min_name_confidence() -> f64 {
    0.7
}

fn pii_schema() -> Json {
    serde_json::json!({
        "type": "object",
        "required": ["patterns"],
        "properties": {
            "patterns": { "type": "object" }
        }
    })
}

fn load_pii(path: &Path) -> Result<PiiDetector> {
    let raw = load_yaml(path)?;
    validate(&pii_schema(), &raw, "PII taxonomy")?;
    let doc: PiiDoc =
        serde_json::from_value(raw).map_err(|e| TrustError::BadRequest(format!("malformed PII taxonomy: {e}")))?;

    let mut names: Vec<&String> = doc.patterns.keys().collect();
    names.sort();
    let mut structured = Vec::with_capacity(names.len());
    for name in names {
        let pattern = &doc.patterns[name];
        let kind = parse_pii_kind(name)?;
        let regex = Regex::new(&pattern.regex)
            .map_err(|e| TrustError::BadRequest(format!("invalid PII regex for '{name}': {e}")))?;
        structured.push(PiiPattern {
            kind,
            regex,
            placeholder: Box::leak(pattern.placeholder.clone().into_boxed_str()),
            confidence: pattern.confidence,
        });
    }
    structured.sort_by_key(|p| pii_detection_order(p.kind));

    let mut template_names: Vec<&String> = doc.name_patterns.pattern_templates.keys().collect();
    template_names.sort();
    let mut name_patterns = Vec::with_capacity(template_names.len());
    for template_name in template_names {
        let template = &doc.name_patterns.pattern_templates[template_name];
        let regex = Regex::new(&template.regex).map_err(|e| {
            TrustError::BadRequest(format!("invalid name-detection pattern '{template_name}': {e}"))
        })?;
        name_patterns.push(NamePattern {
            regex,
            placeholder: Box::leak(template.placeholder.clone().into_boxed_str()),
            confidence: template.confidence,
        });
    }

    Ok(PiiDetector::new(
        structured,
        name_patterns,
        doc.allowlist,
        doc.validation.min_name_confidence,
    ))
}

/// Fixed structured-detector order from §4.4: email, phone (US then intl),
/// SSN, credit card, URL, address.
fn pii_detection_order(kind: PiiKind) -> u8 {
    match kind {
        PiiKind::Email => 0,
        PiiKind::PhoneUs => 1,
        PiiKind::PhoneIntl => 2,
        PiiKind::Ssn => 3,
        PiiKind::CreditCard => 4,
        PiiKind::Url => 5,
        PiiKind::Address => 6,
        PiiKind::Name => 7,
    }
}

// --- Artist registry ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ArtistDoc {
    living_artists: HashMap<String, Vec<LivingArtist>>,
    #[serde(default)]
    normalization_patterns: Vec<NormalizationPattern>,
    #[serde(default)]
    fuzzy_matching: FuzzyMatchingDoc,
}

#[derive(Debug, Deserialize)]
struct FuzzyMatchingDoc {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_similarity_threshold")]
    min_similarity_threshold: f64,
}

impl Default for FuzzyMatchingDoc {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            min_similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn artist_schema() -> Json {
    serde_json::json!({
        "type": "object",
        "required": ["living_artists"],
        "properties": {
            "living_artists": { "type": "object" }
        }
    })
}

fn load_artist(path: &Path) -> Result<ArtistNormalizer> {
    let raw = load_yaml(path)?;
    validate(&artist_schema(), &raw, "artist registry")?;
    let doc: ArtistDoc =
        serde_json::from_value(raw).map_err(|e| TrustError::BadRequest(format!("malformed artist registry: {e}")))?;

    let fuzzy = FuzzyConfig {
        enabled: doc.fuzzy_matching.enabled,
        min_similarity_threshold: doc.fuzzy_matching.min_similarity_threshold,
    };
    ArtistNormalizer::new(doc.living_artists, doc.normalization_patterns, fuzzy)
}

// --- Rubric overrides ---------------------------------------------------------

/// Per-genre weight/threshold override, plus A/B test branches. Consumed by
/// `crate::rubric`'s weight/threshold resolution precedence chain.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RubricOverrideDoc {
    #[serde(default)]
    pub overrides: HashMap<String, GenreOverride>,
    #[serde(default)]
    pub ab_tests: HashMap<String, AbTest>,
    #[serde(default)]
    pub validation: RubricValidationDoc,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenreOverride {
    #[serde(default)]
    pub weights: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub thresholds: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbTest {
    pub enabled: bool,
    pub genres: Vec<String>,
    #[serde(default)]
    pub overrides: GenreOverride,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RubricValidationDoc {
    #[serde(default = "default_true")]
    pub require_weights_sum_to_one: bool,
    #[serde(default = "default_weight_sum_tolerance")]
    pub weight_sum_tolerance: f64,
    #[serde(default)]
    pub required_metrics: Vec<String>,
}

impl Default for RubricValidationDoc {
    fn default() -> Self {
        Self {
            require_weights_sum_to_one: true,
            weight_sum_tolerance: default_weight_sum_tolerance(),
            required_metrics: Vec::new(),
        }
    }
}

fn default_weight_sum_tolerance() -> f64 {
    0.01
}

fn rubric_override_schema() -> Json {
    serde_json::json!({
        "type": "object",
        "properties": {
            "overrides": { "type": "object" },
            "ab_tests": { "type": "object" }
        }
    })
}

/// Rejects the whole document (instead of partially applying it) if present
/// but structurally invalid, matching §7's "override files that fail
/// validation are rejected as a whole" rule.
pub fn load_rubric_overrides(path: &Path) -> Result<RubricOverrideDoc> {
    if !path.exists() {
        return Ok(RubricOverrideDoc::default());
    }
    let raw = load_yaml(path)?;
    validate(&rubric_override_schema(), &raw, "rubric override")?;
    serde_json::from_value(raw).map_err(|e| TrustError::BadRequest(format!("malformed rubric override: {e}")))
}

// --- Blueprint ------------------------------------------------------------

/// Standard pop rubric defaults, restored verbatim from §6 for any
/// blueprint section the markdown document omits.
pub fn default_rubric_weights() -> HashMap<String, f64> {
    HashMap::from([
        ("hook_density".to_string(), 0.25),
        ("singability".to_string(), 0.20),
        ("rhyme_tightness".to_string(), 0.15),
        ("section_completeness".to_string(), 0.20),
        ("profanity_score".to_string(), 0.20),
    ])
}

pub fn default_rubric_thresholds() -> (f64, f64) {
    // (min_total, max_profanity)
    (0.75, 0.1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintRules {
    pub tempo_min: Option<u32>,
    pub tempo_max: Option<u32>,
    pub required_sections: Vec<String>,
    pub duration_min_minutes: Option<f64>,
    pub duration_max_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintRubric {
    pub weights: HashMap<String, f64>,
    pub min_total: f64,
    pub max_profanity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub genre: String,
    pub version: String,
    pub rules: BlueprintRules,
    pub rubric: BlueprintRubric,
    #[serde(default)]
    pub tag_categories: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub conflict_matrix: HashMap<String, Vec<String>>,
}

/// Parses the handful of fixed markdown idioms named in §6 (`**Tempo:** N–M
/// BPM`, `**Form:** Verse → Chorus → ...`, `N–M minutes`); any section the
/// document omits falls back to the standard pop rubric defaults.
pub fn parse_blueprint(genre: &str, version: &str, markdown: &str) -> Blueprint {
    let tempo_re = Regex::new(r"\*\*Tempo:\*\*\s*(\d+)\s*[–-]\s*(\d+)\s*BPM").unwrap();
    let form_re = Regex::new(r"\*\*Form:\*\*\s*(.+)").unwrap();
    let duration_re = Regex::new(r"(\d+(?:\.\d+)?)\s*[–-]\s*(\d+(?:\.\d+)?)\s*minutes").unwrap();

    let (tempo_min, tempo_max) = tempo_re
        .captures(markdown)
        .and_then(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?)))
        .map(|(a, b)| (Some(a), Some(b)))
        .unwrap_or((None, None));

    let required_sections = form_re
        .captures(markdown)
        .map(|c| {
            c[1].split('→')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let (duration_min_minutes, duration_max_minutes) = duration_re
        .captures(markdown)
        .and_then(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?)))
        .map(|(a, b)| (Some(a), Some(b)))
        .unwrap_or((None, None));

    let (min_total, max_profanity) = default_rubric_thresholds();

    Blueprint {
        genre: genre.to_string(),
        version: version.to_string(),
        rules: BlueprintRules {
            tempo_min,
            tempo_max,
            required_sections,
            duration_min_minutes,
            duration_max_minutes,
        },
        rubric: BlueprintRubric {
            weights: default_rubric_weights(),
            min_total,
            max_profanity,
        },
        tag_categories: HashMap::new(),
        conflict_matrix: HashMap::new(),
    }
}

pub fn load_blueprint(genre: &str, version: &str, path: &Path) -> Result<Blueprint> {
    let markdown = std::fs::read_to_string(path)
        .map_err(|e| TrustError::BadRequest(format!("cannot read blueprint '{}': {e}", path.display())))?;
    Ok(parse_blueprint(genre, version, &markdown))
}

// --- Taxonomy bundle & hot-reload store --------------------------------------

/// The fully-built, ready-to-use taxonomy: one immutable snapshot swapped
/// atomically on reload (§9 design notes — "never mutate in place").
pub struct Taxonomy {
    pub profanity: Arc<ProfanityFilter>,
    pub pii: Arc<PiiDetector>,
    pub artist: Arc<ArtistNormalizer>,
    pub rubric_overrides: Arc<RubricOverrideDoc>,
}

pub struct TaxonomyPaths {
    pub profanity: PathBuf,
    pub pii: PathBuf,
    pub artist: PathBuf,
    pub rubric_overrides: PathBuf,
}

impl TaxonomyPaths {
    pub fn under(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            profanity: dir.join("profanity.yaml"),
            pii: dir.join("pii_patterns.yaml"),
            artist: dir.join("artist_registry.yaml"),
            rubric_overrides: dir.join("rubric_overrides.yaml"),
        }
    }
}

fn build_taxonomy(paths: &TaxonomyPaths) -> Result<Taxonomy> {
    Ok(Taxonomy {
        profanity: Arc::new(load_profanity(&paths.profanity)?),
        pii: Arc::new(load_pii(&paths.pii)?),
        artist: Arc::new(load_artist(&paths.artist)?),
        rubric_overrides: Arc::new(load_rubric_overrides(&paths.rubric_overrides)?),
    })
}

/// Owns the live `Taxonomy` snapshot behind an `ArcSwap`. Reload failures
/// leave the previous snapshot in place (§7: "failures on a hot reload leave
/// the previously loaded taxonomy in place").
pub struct TaxonomyStore {
    current: ArcSwap<Taxonomy>,
    paths: TaxonomyPaths,
}

impl TaxonomyStore {
    /// Initial load is fatal on failure — there is no "previous taxonomy" to
    /// fall back to yet (§7: "Taxonomy load failures at startup are fatal").
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let paths = TaxonomyPaths::under(dir);
        let taxonomy = build_taxonomy(&paths)?;
        Ok(Self {
            current: ArcSwap::from_pointee(taxonomy),
            paths,
        })
    }

    pub fn current(&self) -> Arc<Taxonomy> {
        self.current.load_full()
    }

    pub fn reload(&self) -> Result<()> {
        let taxonomy = build_taxonomy(&self.paths)?;
        self.current.store(Arc::new(taxonomy));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blueprint_parses_tempo_form_and_duration() {
        let markdown = "**Tempo:** 100–120 BPM\n**Form:** Verse → Chorus → Verse → Chorus → Bridge → Chorus\nRuns 3–4 minutes.";
        let blueprint = parse_blueprint("pop", "1.0", markdown);
        assert_eq!(blueprint.rules.tempo_min, Some(100));
        assert_eq!(blueprint.rules.tempo_max, Some(120));
        assert_eq!(blueprint.rules.required_sections[0], "verse");
        assert_eq!(blueprint.rules.duration_min_minutes, Some(3.0));
    }

    #[test]
    fn blueprint_falls_back_to_pop_defaults_when_sections_absent() {
        let blueprint = parse_blueprint("unlabeled", "1.0", "no structured hints here");
        assert!(blueprint.rules.required_sections.is_empty());
        assert_eq!(blueprint.rubric.weights.get("hook_density"), Some(&0.25));
        assert_eq!(blueprint.rubric.min_total, 0.75);
    }

    #[test]
    fn missing_override_file_yields_empty_document_not_an_error() {
        let doc = load_rubric_overrides(Path::new("/nonexistent/rubric_overrides.yaml")).unwrap();
        assert!(doc.overrides.is_empty());
        assert!(doc.ab_tests.is_empty());
    }

    #[test]
    fn malformed_profanity_yaml_is_rejected() {
        let dir = std::env::temp_dir().join(format!("trust_core_taxonomy_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let bad_path = dir.join("profanity.yaml");
        std::fs::write(&bad_path, "not: valid: because: no: structure").unwrap();
        let result = load_profanity(&bad_path);
        assert!(result.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
