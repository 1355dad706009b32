//! Deterministic entity extraction and merging.
//!
//! Pattern rules run on every request regardless of what the backend
//! reports. Backend, pattern, and context entities are merged by
//! (type, normalized value); a value found by both the backend and a rule
//! is marked `Both` and keeps the higher confidence.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use opsgate_contracts::{
    decision::RequestContext,
    intent::{Entity, EntitySource, EntityType, Span},
};

use crate::lexicon;

/// Confidence assigned to a pattern match.
pub const PATTERN_CONFIDENCE: f64 = 0.9;
/// Confidence assigned to a context-supplied entity.
pub const CONTEXT_CONFIDENCE: f64 = 1.0;

static IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b")
        .expect("valid IPv4 pattern")
});

/// `port 8443`, or a port after a host or IPv4 address (`web-01:8080`).
/// A colon after bare digits is a clock time, not a port.
static PORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bport\s+(\d{1,5})\b|\b(?:[a-z0-9-]*[a-z][a-z0-9.-]*|\d{1,3}(?:\.\d{1,3}){3}):(\d{1,5})\b")
        .expect("valid entity pattern")
});

static UNIX_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(/(?:[\w.\-]+/)*[\w.\-]+)").expect("valid entity pattern"));

static WINDOWS_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z]:\\(?:[\w.\-]+\\)*[\w.\-]*)").expect("valid entity pattern"));

/// `web-01`, `prod-db-01`, `db01.example.com`.
static HOSTNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:[a-z][a-z0-9]*(?:-[a-z0-9]+)*-?\d+|[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)+\.[a-z]{2,})\b",
    )
    .expect("valid hostname pattern")
});

/// "test" alone is too common a word; it only names an environment when
/// qualified, as in "test environment" or "test servers".
static ENVIRONMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(production|prod|prd|staging|stage|development|dev|qa)\b|\b(test)\s+(?:environment|env|servers?|hosts?|cluster)\b",
    )
    .expect("valid environment pattern")
});

static OS_FAMILY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(windows|linux|macos)\b").expect("valid entity pattern"));

static NAMED_SERVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([a-z][a-z0-9_-]*)\s+service\b").expect("valid entity pattern"));

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("valid entity pattern"));

/// Words that precede "service" without naming one.
const SERVICE_STOPWORDS: &[&str] = &["the", "a", "an", "this", "that", "which", "what", "each", "every", "all", "my"];

fn pattern_entity(entity_type: EntityType, value: &str, start: usize, end: usize) -> Entity {
    Entity {
        entity_type,
        value: value.to_string(),
        confidence: PATTERN_CONFIDENCE,
        source: EntitySource::Pattern,
        span: Some(Span { start, end }),
    }
}

fn overlaps(spans: &[Span], start: usize, end: usize) -> bool {
    spans.iter().any(|s| start < s.end && s.start < end)
}

/// Run every pattern rule over `text`.
pub fn extract(text: &str) -> Vec<Entity> {
    let mut found = Vec::new();

    let mut ip_spans = Vec::new();
    for m in IPV4.find_iter(text) {
        ip_spans.push(Span { start: m.start(), end: m.end() });
        found.push(pattern_entity(EntityType::IpAddress, m.as_str(), m.start(), m.end()));
    }

    for caps in PORT.captures_iter(text) {
        let Some(m) = caps.get(1).or_else(|| caps.get(2)) else { continue };
        if let Ok(port) = m.as_str().parse::<u32>() {
            if (1..=65_535).contains(&port) {
                found.push(pattern_entity(EntityType::Port, m.as_str(), m.start(), m.end()));
            }
        }
    }

    let mut path_spans = Vec::new();
    for re in [&*UNIX_PATH, &*WINDOWS_PATH] {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                path_spans.push(Span { start: m.start(), end: m.end() });
                found.push(pattern_entity(EntityType::FilePath, m.as_str(), m.start(), m.end()));
            }
        }
    }

    let mut host_spans = Vec::new();
    for m in HOSTNAME.find_iter(text) {
        if overlaps(&path_spans, m.start(), m.end()) || overlaps(&ip_spans, m.start(), m.end()) {
            continue;
        }
        host_spans.push(Span { start: m.start(), end: m.end() });
        found.push(pattern_entity(EntityType::Hostname, m.as_str(), m.start(), m.end()));
        // prod-db-01 names a production host
        if lexicon::is_production_value(m.as_str()) {
            let mut env = pattern_entity(EntityType::Environment, "production", m.start(), m.end());
            env.confidence = PATTERN_CONFIDENCE * PATTERN_CONFIDENCE;
            found.push(env);
        }
    }

    for caps in ENVIRONMENT.captures_iter(text) {
        let Some(m) = caps.get(1).or_else(|| caps.get(2)) else { continue };
        if overlaps(&path_spans, m.start(), m.end()) || overlaps(&host_spans, m.start(), m.end()) {
            continue;
        }
        let mut entity = pattern_entity(EntityType::Environment, m.as_str(), m.start(), m.end());
        entity.value = lexicon::canonical_environment(m.as_str());
        found.push(entity);
    }

    for m in OS_FAMILY.find_iter(text) {
        found.push(pattern_entity(EntityType::OsFamily, &m.as_str().to_lowercase(), m.start(), m.end()));
    }

    for m in WORD.find_iter(text) {
        if overlaps(&path_spans, m.start(), m.end()) || overlaps(&host_spans, m.start(), m.end()) {
            continue;
        }
        let word = m.as_str().to_lowercase();
        if lexicon::KNOWN_SERVICES.contains(&word.as_str()) {
            found.push(pattern_entity(EntityType::Service, &word, m.start(), m.end()));
        } else if lexicon::is_known_verb(&word) {
            found.push(pattern_entity(EntityType::CommandVerb, &word, m.start(), m.end()));
        }
    }

    for caps in NAMED_SERVICE.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        let word = m.as_str().to_lowercase();
        if SERVICE_STOPWORDS.contains(&word.as_str())
            || lexicon::is_known_verb(&word)
            || lexicon::KNOWN_SERVICES.contains(&word.as_str())
        {
            continue;
        }
        found.push(pattern_entity(EntityType::Service, &word, m.start(), m.end()));
    }

    found
}

/// Entities the caller supplied through the request context.
pub fn from_context(context: &RequestContext) -> Vec<Entity> {
    context
        .default_environment
        .iter()
        .map(|env| Entity {
            entity_type: EntityType::Environment,
            value: lexicon::canonical_environment(env),
            confidence: CONTEXT_CONFIDENCE,
            source: EntitySource::Context,
            span: None,
        })
        .collect()
}

/// Normalize a backend-reported entity so it keys the same way a pattern
/// match would, and locate it in the text when possible.
pub fn normalize_backend(text: &str, mut entity: Entity) -> Entity {
    entity.value = entity.value.trim().to_string();
    if entity.entity_type == EntityType::Environment {
        entity.value = lexicon::canonical_environment(&entity.value);
    }
    if entity.span.is_none() {
        let haystack = text.to_lowercase();
        if let Some(start) = haystack.find(&entity.value.to_lowercase()) {
            entity.span = Some(Span { start, end: start + entity.value.len() });
        }
    }
    entity.confidence = if entity.confidence.is_finite() {
        entity.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    entity
}

/// Merge entity lists in order, deduplicating by type and normalized value.
///
/// Context entities of a type the text already names are dropped; the text
/// wins over the default.
pub fn merge(backend: Vec<Entity>, pattern: Vec<Entity>, context: Vec<Entity>) -> Vec<Entity> {
    let mut merged: Vec<Entity> = Vec::new();
    let mut index: HashMap<(EntityType, String), usize> = HashMap::new();

    for entity in backend.into_iter().chain(pattern) {
        if entity.value.trim().is_empty() {
            continue;
        }
        match index.get(&entity.key()) {
            Some(&i) => {
                let existing = &mut merged[i];
                if existing.source != entity.source {
                    existing.source = EntitySource::Both;
                }
                existing.confidence = existing.confidence.max(entity.confidence);
                if existing.span.is_none() {
                    existing.span = entity.span;
                }
            }
            None => {
                index.insert(entity.key(), merged.len());
                merged.push(entity);
            }
        }
    }

    for entity in context {
        if merged.iter().any(|e| e.entity_type == entity.entity_type) {
            continue;
        }
        merged.push(entity);
    }

    merged
}
