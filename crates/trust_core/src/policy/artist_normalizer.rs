//! Living-artist reference detection and normalization.
//!
//! Grounded on `policy_guards.py`'s `ArtistNormalizer`. Detects phrases like
//! "style of Taylor Swift" or "sounds like Drake" and replaces them with a
//! genre-neutral description, so generated output never ships a living
//! artist's name in a public release without going through
//! [`super::policy_enforcer::PolicyEnforcer`].

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustError};

/// One living artist entry, scoped to a genre.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivingArtist {
    pub name: String,
    pub aliases: Vec<String>,
    pub generic_description: String,
    pub style_tags: Vec<String>,
}

#[derive(Debug, Clone)]
struct IndexedArtist {
    name: String,
    genre: String,
    generic_description: String,
    style_tags: Vec<String>,
}

/// A template for recognizing an influence reference, e.g. `"style of
/// {artist}"` replaced with `"{generic_description}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationPattern {
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub context: Option<String>,
}

struct CompiledPattern {
    pattern_template: String,
    regex: Regex,
    replacement_template: String,
}

#[derive(Debug, Clone, Copy)]
pub struct FuzzyConfig {
    pub enabled: bool,
    pub min_similarity_threshold: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_similarity_threshold: 0.85,
        }
    }
}

/// One detected living-artist reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistReference {
    pub artist_name: String,
    pub position: usize,
    pub pattern_used: String,
    pub matched_text: String,
    pub generic_replacement: String,
    pub requires_normalization: bool,
    pub confidence: f64,
    pub genre: String,
    pub style_tags: Vec<String>,
}

/// One applied normalization, documenting what was replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationChange {
    pub original: String,
    pub replacement: String,
    pub artist: String,
    pub position: usize,
    pub pattern: String,
}

pub struct ArtistNormalizer {
    artist_index: HashMap<String, IndexedArtist>,
    alias_index: HashMap<String, String>,
    compiled_patterns: Vec<CompiledPattern>,
    fuzzy: FuzzyConfig,
}

impl ArtistNormalizer {
    /// Build the normalizer from a loaded taxonomy. `living_artists` maps
    /// genre name to its artist roster.
    pub fn new(
        living_artists: HashMap<String, Vec<LivingArtist>>,
        normalization_patterns: Vec<NormalizationPattern>,
        fuzzy: FuzzyConfig,
    ) -> Result<Self> {
        let mut artist_index = HashMap::new();
        let mut alias_index = HashMap::new();

        // Deterministic build order: genres sorted, then artists as listed.
        let mut genres: Vec<&String> = living_artists.keys().collect();
        genres.sort();
        for genre in genres {
            for artist in &living_artists[genre] {
                let key = artist.name.to_lowercase();
                artist_index.insert(
                    key.clone(),
                    IndexedArtist {
                        name: artist.name.clone(),
                        genre: genre.clone(),
                        generic_description: artist.generic_description.clone(),
                        style_tags: artist.style_tags.clone(),
                    },
                );
                for alias in &artist.aliases {
                    alias_index.insert(alias.to_lowercase(), key.clone());
                }
            }
        }

        let mut compiled_patterns = Vec::with_capacity(normalization_patterns.len());
        for cfg in &normalization_patterns {
            let escaped = regex::escape(&cfg.pattern).replace("artist\\}", "artist}");
            // `{artist}` survives `regex::escape` as a literal brace pair;
            // swap it for a capturing group after escaping the rest.
            let escaped = escaped.replace(r"\{artist\}", "(.+?)");
            let pattern_src = format!(r"(?i)\b{escaped}\b");
            let regex = Regex::new(&pattern_src).map_err(|e| {
                TrustError::BadRequest(format!(
                    "invalid artist normalization pattern '{}': {e}",
                    cfg.pattern
                ))
            })?;
            compiled_patterns.push(CompiledPattern {
                pattern_template: cfg.pattern.clone(),
                regex,
                replacement_template: cfg.replacement.clone(),
            });
        }

        Ok(Self {
            artist_index,
            alias_index,
            compiled_patterns,
            fuzzy,
        })
    }

    fn fuzzy_match(&self, text: &str) -> Option<String> {
        if !self.fuzzy.enabled {
            return None;
        }
        let lower = text.to_lowercase();
        let lower = lower.trim();
        if let Some(artist) = self.artist_index.get(lower) {
            return Some(artist.name.to_lowercase());
        }
        if let Some(canonical) = self.alias_index.get(lower) {
            return Some(canonical.clone());
        }

        let mut best: Option<(String, f64)> = None;
        for key in self.artist_index.keys() {
            let score = strsim::normalized_levenshtein(lower, key);
            if score >= self.fuzzy.min_similarity_threshold
                && best.as_ref().map(|(_, s)| score > *s).unwrap_or(true)
            {
                best = Some((key.clone(), score));
            }
        }
        for (alias, canonical) in &self.alias_index {
            let score = strsim::normalized_levenshtein(lower, alias);
            if score >= self.fuzzy.min_similarity_threshold
                && best.as_ref().map(|(_, s)| score > *s).unwrap_or(true)
            {
                best = Some((canonical.clone(), score));
            }
        }
        best.map(|(key, _)| key)
    }

    fn resolve(&self, captured: &str) -> Option<(&IndexedArtist, f64)> {
        let lower = captured.to_lowercase();
        let lower = lower.trim();
        if let Some(artist) = self.artist_index.get(lower) {
            return Some((artist, 1.0));
        }
        if let Some(canonical) = self.alias_index.get(lower) {
            return self.artist_index.get(canonical).map(|a| (a, 1.0));
        }
        let fuzzy = self.fuzzy_match(captured)?;
        self.artist_index.get(&fuzzy).map(|a| (a, 0.9))
    }

    /// Detect every living-artist reference in `text`, one per position, in
    /// pattern-then-position order, then sorted by position.
    pub fn detect_artist_references(&self, text: &str) -> Vec<ArtistReference> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut references = Vec::new();
        let mut claimed_positions: std::collections::HashSet<usize> = std::collections::HashSet::new();

        for compiled in &self.compiled_patterns {
            for m in compiled.regex.find_iter(text) {
                let position = m.start();
                if claimed_positions.contains(&position) {
                    continue;
                }
                let Some(captures) = compiled.regex.captures(&text[position..]) else {
                    continue;
                };
                let Some(captured) = captures.get(1) else {
                    continue;
                };

                let Some((artist, confidence)) = self.resolve(captured.as_str()) else {
                    continue;
                };

                let generic_replacement = if compiled.replacement_template.contains("{generic_description}") {
                    compiled
                        .replacement_template
                        .replace("{generic_description}", &artist.generic_description)
                } else if compiled.replacement_template.contains("{genre}") {
                    compiled.replacement_template.replace("{genre}", &artist.genre)
                } else {
                    artist.generic_description.clone()
                };

                references.push(ArtistReference {
                    artist_name: artist.name.clone(),
                    position,
                    pattern_used: compiled.pattern_template.clone(),
                    matched_text: m.as_str().to_string(),
                    generic_replacement,
                    requires_normalization: true,
                    confidence,
                    genre: artist.genre.clone(),
                    style_tags: artist.style_tags.clone(),
                });
                claimed_positions.insert(position);
            }
        }

        references.sort_by_key(|r| r.position);
        references
    }

    /// Replace every detected reference with its generic description,
    /// working in reverse-position order to avoid offset drift.
    pub fn normalize_influences(&self, text: &str) -> (String, Vec<NormalizationChange>) {
        if text.is_empty() {
            return (text.to_string(), Vec::new());
        }

        let references = self.detect_artist_references(text);
        if references.is_empty() {
            return (text.to_string(), Vec::new());
        }

        let mut sorted = references;
        sorted.sort_by(|a, b| b.position.cmp(&a.position));

        let mut normalized = text.to_string();
        let mut changes = Vec::with_capacity(sorted.len());
        for reference in &sorted {
            let start = reference.position;
            let end = start + reference.matched_text.len();
            if end > normalized.len() {
                continue;
            }
            normalized.replace_range(start..end, &reference.generic_replacement);
            changes.push(NormalizationChange {
                original: reference.matched_text.clone(),
                replacement: reference.generic_replacement.clone(),
                artist: reference.artist_name.clone(),
                position: start,
                pattern: reference.pattern_used.clone(),
            });
        }

        // Changes were built in reverse-position order above; report them
        // forward for readability.
        changes.reverse();
        (normalized, changes)
    }

    /// `Ok(())` if `text` carries no living-artist reference (or references
    /// are explicitly allowed), else the list of human-readable violations.
    pub fn check_public_release_compliance(&self, text: &str, allow_artist_names: bool) -> (bool, Vec<String>) {
        if allow_artist_names {
            return (true, Vec::new());
        }
        let references = self.detect_artist_references(text);
        let violations: Vec<String> = references
            .iter()
            .map(|r| {
                format!(
                    "Living artist reference detected: '{}' (artist: {}, pattern: {}). \
                     Public releases cannot contain 'style of [Living Artist]' patterns.",
                    r.matched_text, r.artist_name, r.pattern_used
                )
            })
            .collect();
        (violations.is_empty(), violations)
    }

    pub fn get_generic_description(&self, artist_name: &str) -> Option<String> {
        self.resolve(artist_name).map(|(a, _)| a.generic_description.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_normalizer() -> ArtistNormalizer {
        let mut living = HashMap::new();
        living.insert(
            "pop".to_string(),
            vec![LivingArtist {
                name: "Taylor Swift".to_string(),
                aliases: vec!["Tay".to_string()],
                generic_description: "pop-influenced with storytelling vocals and melodic hooks".to_string(),
                style_tags: vec!["storytelling".to_string(), "melodic".to_string()],
            }],
        );
        let patterns = vec![
            NormalizationPattern {
                pattern: "style of {artist}".to_string(),
                replacement: "{generic_description}".to_string(),
                context: None,
            },
            NormalizationPattern {
                pattern: "sounds like {artist}".to_string(),
                replacement: "{generic_description}".to_string(),
                context: None,
            },
        ];
        ArtistNormalizer::new(living, patterns, FuzzyConfig::default()).unwrap()
    }

    #[test]
    fn detects_reference_and_resolves_generic_description() {
        let normalizer = sample_normalizer();
        let refs = normalizer.detect_artist_references("write this in the style of Taylor Swift please");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].artist_name, "Taylor Swift");
        assert!(refs[0].generic_replacement.contains("storytelling"));
    }

    #[test]
    fn alias_resolves_to_canonical_artist() {
        let normalizer = sample_normalizer();
        let refs = normalizer.detect_artist_references("sounds like Tay");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].artist_name, "Taylor Swift");
    }

    #[test]
    fn normalize_influences_replaces_reference() {
        let normalizer = sample_normalizer();
        let (normalized, changes) = normalizer.normalize_influences("style of Taylor Swift vibes");
        assert_eq!(changes.len(), 1);
        assert!(normalized.contains("storytelling"));
        assert!(!normalized.contains("Taylor Swift"));
    }

    #[test]
    fn normalize_influences_is_idempotent() {
        let normalizer = sample_normalizer();
        let (once, _) = normalizer.normalize_influences("style of Taylor Swift vibes");
        let (twice, _) = normalizer.normalize_influences(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn compliance_check_flags_reference_in_strict_mode() {
        let normalizer = sample_normalizer();
        let (compliant, violations) = normalizer.check_public_release_compliance("style of Taylor Swift", false);
        assert!(!compliant);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn compliance_check_allows_reference_when_permitted() {
        let normalizer = sample_normalizer();
        let (compliant, violations) = normalizer.check_public_release_compliance("style of Taylor Swift", true);
        assert!(compliant);
        assert!(violations.is_empty());
    }

    #[test]
    fn clean_text_has_no_references() {
        let normalizer = sample_normalizer();
        assert!(normalizer.detect_artist_references("an upbeat summer anthem").is_empty());
    }
}
