//! PII detection and redaction: fixed-order structured pattern matching
//! plus a name-template pass, both respecting an allowlist.
//!
//! Grounded on `policy_guards.py`'s `PIIDetector`.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The kinds of PII this detector recognizes, in the fixed detection order
/// the original applies: structured patterns first, names last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Email,
    PhoneUs,
    PhoneIntl,
    Ssn,
    CreditCard,
    Url,
    Address,
    Name,
}

#[derive(Debug, Clone)]
pub struct PiiPattern {
    pub kind: PiiKind,
    pub regex: Regex,
    pub placeholder: &'static str,
    pub confidence: f64,
}

/// One free-text name-reference template, with its own confidence and
/// placeholder — different templates fire different placeholders and are
/// suppressed independently against the configured minimum confidence.
#[derive(Debug, Clone)]
pub struct NamePattern {
    pub regex: Regex,
    pub placeholder: &'static str,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiHit {
    pub kind: PiiKind,
    pub value: String,
    pub position: usize,
    pub placeholder: String,
    pub confidence: f64,
    /// The surrounding context with the span itself masked — safe to log.
    pub context: String,
}

pub struct PiiDetector {
    structured: Vec<PiiPattern>,
    name_patterns: Vec<NamePattern>,
    allowlist: Vec<String>,
    min_name_confidence: f64,
}

const CONTEXT_WINDOW: usize = 24;

impl PiiDetector {
    pub fn new(
        structured: Vec<PiiPattern>,
        name_patterns: Vec<NamePattern>,
        allowlist: Vec<String>,
        min_name_confidence: f64,
    ) -> Self {
        Self {
            structured,
            name_patterns,
            allowlist,
            min_name_confidence,
        }
    }

    fn is_allowlisted(&self, value: &str) -> bool {
        let lower = value.to_lowercase();
        self.allowlist.iter().any(|entry| lower.contains(&entry.to_lowercase()))
    }

    fn context_for(&self, text: &str, start: usize, end: usize) -> String {
        let lo = start.saturating_sub(CONTEXT_WINDOW);
        let hi = (end + CONTEXT_WINDOW).min(text.len());
        let before = text.get(lo..start).unwrap_or("");
        let after = text.get(end..hi).unwrap_or("");
        format!("{before}[REDACTED]{after}")
    }

    /// Detect every PII span in `text`, in fixed structured order, then
    /// names; a span already claimed by an earlier detector is skipped by
    /// later ones. Results are sorted by position.
    pub fn detect(&self, text: &str) -> Vec<PiiHit> {
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut hits = Vec::new();

        for pattern in &self.structured {
            for m in pattern.regex.find_iter(text) {
                if claimed.iter().any(|&(s, e)| overlaps(s, e, m.start(), m.end())) {
                    continue;
                }
                if self.is_allowlisted(m.as_str()) {
                    continue;
                }
                claimed.push((m.start(), m.end()));
                hits.push(PiiHit {
                    kind: pattern.kind,
                    value: m.as_str().to_string(),
                    position: m.start(),
                    placeholder: pattern.placeholder.to_string(),
                    confidence: pattern.confidence,
                    context: self.context_for(text, m.start(), m.end()),
                });
            }
        }

        for pattern in &self.name_patterns {
            // A template below the configured minimum confidence never
            // fires, independent of any other template's confidence.
            if pattern.confidence < self.min_name_confidence {
                continue;
            }
            for m in pattern.regex.find_iter(text) {
                if claimed.iter().any(|&(s, e)| overlaps(s, e, m.start(), m.end())) {
                    continue;
                }
                if self.is_allowlisted(m.as_str()) {
                    continue;
                }
                claimed.push((m.start(), m.end()));
                hits.push(PiiHit {
                    kind: PiiKind::Name,
                    value: m.as_str().to_string(),
                    position: m.start(),
                    placeholder: pattern.placeholder.to_string(),
                    confidence: pattern.confidence,
                    context: self.context_for(text, m.start(), m.end()),
                });
            }
        }

        hits.sort_by_key(|h| h.position);
        hits
    }

    /// Replace every detected span with its placeholder. Spans are applied
    /// in reverse-position order so earlier offsets never drift.
    pub fn redact(&self, text: &str) -> (String, Vec<PiiHit>) {
        let hits = self.detect(text);
        let mut redacted = text.to_string();
        for hit in hits.iter().rev() {
            let end = hit.position + hit.value.len();
            if let (Some(_), true) = (redacted.get(hit.position..end), end <= redacted.len()) {
                redacted.replace_range(hit.position..end, &hit.placeholder);
            }
        }
        (redacted, hits)
    }

    pub fn report(&self, text: &str) -> PiiReport {
        let (redacted, hits) = self.redact(text);
        let mut by_kind: std::collections::HashMap<&'static str, usize> = std::collections::HashMap::new();
        let mut confidence_sum = 0.0;
        for hit in &hits {
            *by_kind.entry(kind_label(hit.kind)).or_insert(0) += 1;
            confidence_sum += hit.confidence;
        }
        let average_confidence = if hits.is_empty() {
            0.0
        } else {
            confidence_sum / hits.len() as f64
        };
        PiiReport {
            original: text.to_string(),
            redacted,
            counts_by_kind: by_kind.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            average_confidence,
            hits,
        }
    }
}

fn kind_label(kind: PiiKind) -> &'static str {
    match kind {
        PiiKind::Email => "email",
        PiiKind::PhoneUs => "phone_us",
        PiiKind::PhoneIntl => "phone_intl",
        PiiKind::Ssn => "ssn",
        PiiKind::CreditCard => "credit_card",
        PiiKind::Url => "url",
        PiiKind::Address => "address",
        PiiKind::Name => "name",
    }
}

fn overlaps(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> bool {
    a_start < b_end && b_start < a_end
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiReport {
    pub original: String,
    pub redacted: String,
    pub hits: Vec<PiiHit>,
    pub counts_by_kind: std::collections::HashMap<String, usize>,
    pub average_confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_detector() -> PiiDetector {
        let structured = vec![
            PiiPattern {
                kind: PiiKind::PhoneUs,
                regex: Regex::new(r"\b\d{3}-\d{3}-\d{4}\b").unwrap(),
                placeholder: "[PHONE]",
                confidence: 0.95,
            },
            PiiPattern {
                kind: PiiKind::Email,
                regex: Regex::new(r"\b[\w.+-]+@[\w-]+\.[\w.-]+\b").unwrap(),
                placeholder: "[EMAIL]",
                confidence: 0.98,
            },
        ];
        PiiDetector::new(structured, vec![], vec!["john doe".to_string()], 0.7)
    }

    #[test]
    fn redacts_phone_and_email() {
        let detector = sample_detector();
        let (redacted, hits) = detector.redact("Call 555-123-4567 or email a@b.com");
        assert_eq!(redacted, "Call [PHONE] or email [EMAIL]");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn redaction_is_stable_across_runs() {
        let detector = sample_detector();
        let (first, _) = detector.redact("Call 555-123-4567 or email a@b.com");
        let (second, _) = detector.redact("Call 555-123-4567 or email a@b.com");
        assert_eq!(first, second);
    }

    #[test]
    fn allowlisted_name_is_suppressed() {
        let mut detector = sample_detector();
        detector.name_patterns = vec![NamePattern {
            regex: Regex::new(r"\b[A-Z][a-z]+ [A-Z][a-z]+\b").unwrap(),
            placeholder: "[NAME]",
            confidence: 0.8,
        }];
        let hits = detector.detect("Contact John Doe about the release");
        assert!(hits.iter().all(|h| h.kind != PiiKind::Name));
    }

    #[test]
    fn low_confidence_template_is_suppressed_independently() {
        let mut detector = sample_detector();
        detector.name_patterns = vec![
            NamePattern {
                regex: Regex::new(r"\bmy name is ([A-Z][a-z]+ [A-Z][a-z]+)\b").unwrap(),
                placeholder: "[NAME]",
                confidence: 0.9,
            },
            NamePattern {
                regex: Regex::new(r"\bcall me ([A-Z][a-z]+ [A-Z][a-z]+)\b").unwrap(),
                placeholder: "[NICKNAME]",
                confidence: 0.5,
            },
        ];
        let hits = detector.detect("my name is Alice Walker, call me Jane Smith");
        assert_eq!(hits.iter().filter(|h| h.kind == PiiKind::Name).count(), 1);
        assert_eq!(hits[0].placeholder, "[NAME]");
    }

    #[test]
    fn overlapping_structured_matches_do_not_double_count() {
        let detector = sample_detector();
        let hits = detector.detect("a@b.com");
        assert_eq!(hits.len(), 1);
    }
}
