//! Confidence and risk scoring.
//!
//! Pure functions shared by the classifier (confidence, risk, decision type)
//! and the selector (match score, selection confidence). Weights are fixed.

use opsgate_contracts::intent::{DecisionType, Entity, EntityType, IntentCategory, RiskLevel};

use crate::lexicon;

/// Weight of the backend-reported confidence.
pub const BACKEND_WEIGHT: f64 = 0.5;
/// Weight of the entity-coverage ratio.
pub const COVERAGE_WEIGHT: f64 = 0.3;
/// Weight of the request-clarity heuristic.
pub const CLARITY_WEIGHT: f64 = 0.2;

/// Decisions below this confidence are `Ambiguous`.
pub const AMBIGUITY_THRESHOLD: f64 = 0.5;

/// Multiplier for a tool whose production-safety matches the risk posture.
/// Scores are normalized by it so they stay in [0, 1].
pub const PRODUCTION_POSTURE_BONUS: f64 = 1.1;

const PRONOUN_PENALTY: f64 = 0.2;
const VAGUE_VERB_PENALTY: f64 = 0.15;
const SHORT_REQUEST_PENALTY: f64 = 0.2;
const MAX_PRONOUN_PENALTY: f64 = 0.4;

fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Fraction of the category's expected entity kinds that were found.
pub fn entity_coverage(category: IntentCategory, entities: &[Entity]) -> f64 {
    let expected = category.expected_entities();
    if expected.is_empty() {
        return 1.0;
    }
    let found = expected
        .iter()
        .filter(|kind| {
            entities.iter().any(|e| {
                e.entity_type == **kind
                    // an address or an OS family stands in for a hostname
                    || (**kind == EntityType::Hostname && e.entity_type.is_target())
            })
        })
        .count();
    found as f64 / expected.len() as f64
}

/// 1.0 for a crisp request, lowered by ambiguous pronouns, vague verbs, and
/// very short text.
pub fn request_clarity(text: &str) -> f64 {
    let tokens: Vec<String> = lexicon::tokens(text).collect();
    let mut score = 1.0;

    let pronouns = tokens
        .iter()
        .filter(|t| lexicon::AMBIGUOUS_PRONOUNS.contains(&t.as_str()))
        .count();
    score -= (pronouns as f64 * PRONOUN_PENALTY).min(MAX_PRONOUN_PENALTY);

    if tokens.iter().any(|t| lexicon::VAGUE_VERBS.contains(&t.as_str())) {
        score -= VAGUE_VERB_PENALTY;
    }
    if tokens.len() < 3 {
        score -= SHORT_REQUEST_PENALTY;
    }
    clamp_unit(score)
}

/// Weighted combination of backend confidence, coverage, and clarity.
pub fn combined_confidence(backend: f64, coverage: f64, clarity: f64) -> f64 {
    clamp_unit(
        BACKEND_WEIGHT * clamp_unit(backend)
            + COVERAGE_WEIGHT * clamp_unit(coverage)
            + CLARITY_WEIGHT * clamp_unit(clarity),
    )
}

/// The high-impact facts a risk level is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskSignals {
    /// Some entity value is production-class.
    pub production: bool,
    /// The action or a command-verb entity is destructive.
    pub destructive: bool,
    /// The action or a command-verb entity cannot be undone.
    pub irreversible: bool,
    /// More than one target, a group target, or a quantifier like "all".
    pub multi_target: bool,
}

impl RiskSignals {
    /// Collect signals from the request text, its entities, and the action.
    pub fn collect(text: &str, entities: &[Entity], action: &str) -> Self {
        let verbs: Vec<String> = std::iter::once(action.to_lowercase())
            .chain(
                entities
                    .iter()
                    .filter(|e| e.entity_type == EntityType::CommandVerb)
                    .map(|e| e.normalized_value()),
            )
            .collect();

        let concrete_targets = entities
            .iter()
            .filter(|e| matches!(e.entity_type, EntityType::Hostname | EntityType::IpAddress))
            .count();
        let group_target = entities.iter().any(|e| e.entity_type == EntityType::OsFamily);
        let quantified =
            lexicon::tokens(text).any(|t| lexicon::MULTI_TARGET_QUANTIFIERS.contains(&t.as_str()));

        Self {
            production: entities.iter().any(|e| lexicon::is_production_value(&e.value)),
            destructive: verbs.iter().any(|v| lexicon::is_destructive(v)),
            irreversible: verbs.iter().any(|v| lexicon::is_irreversible(v)),
            multi_target: concrete_targets > 1 || group_target || quantified,
        }
    }
}

/// Rule table. Each signal sets a floor; floors only ever rise.
///
/// | signals                                   | floor    |
/// |-------------------------------------------|----------|
/// | production                                | medium   |
/// | destructive                               | medium   |
/// | destructive + (production or multi-target)| high     |
/// | irreversible + production                 | critical |
pub fn rule_risk(signals: RiskSignals) -> RiskLevel {
    let mut level = RiskLevel::Low;
    if signals.production || signals.destructive {
        level = level.max(RiskLevel::Medium);
    }
    if signals.destructive && (signals.production || signals.multi_target) {
        level = level.max(RiskLevel::High);
    }
    if signals.irreversible && signals.production {
        level = level.max(RiskLevel::Critical);
    }
    level
}

/// Combine the rule level with the backend's signal. The backend can raise
/// the level but never lower it below the rule floor.
pub fn combine_risk(rule_level: RiskLevel, backend_level: RiskLevel) -> RiskLevel {
    rule_level.max(backend_level)
}

/// `Ambiguous` below the threshold; otherwise `Information` for read-only
/// verbs and `Action` for everything else, unknown verbs included.
pub fn decision_type(confidence: f64, action: &str, backend_read_only: Option<bool>) -> DecisionType {
    if confidence < AMBIGUITY_THRESHOLD {
        return DecisionType::Ambiguous;
    }
    let verb = action.to_lowercase();
    if lexicon::is_mutating(&verb) {
        DecisionType::Action
    } else if lexicon::is_read_only(&verb) || backend_read_only == Some(true) {
        DecisionType::Information
    } else {
        DecisionType::Action
    }
}

/// capability overlap × entity compatibility × posture bonus, normalized
/// into [0, 1].
pub fn match_score(capability_overlap: f64, entity_compatibility: f64, posture_match: bool) -> f64 {
    let bonus = if posture_match { PRODUCTION_POSTURE_BONUS } else { 1.0 };
    clamp_unit(clamp_unit(capability_overlap) * clamp_unit(entity_compatibility) * bonus / PRODUCTION_POSTURE_BONUS)
}

/// How the backend took part in a tool pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendAgreement {
    /// The top match cleared the threshold alone.
    NotConsulted,
    /// The backend picked the top-ranked candidate.
    Agreed { backend_confidence: f64 },
    /// The backend picked a lower-ranked candidate.
    Overrode { backend_confidence: f64 },
}

const OVERRIDE_FACTOR: f64 = 0.8;

/// Confidence in a selection from the match score of the picked tool and
/// the backend's agreement. Ambiguous decisions scale it down by their own
/// confidence so clarification is signalled downstream.
pub fn selection_confidence(
    match_score: f64,
    agreement: BackendAgreement,
    decision_confidence: f64,
    ambiguous: bool,
) -> f64 {
    let base = match agreement {
        BackendAgreement::NotConsulted => clamp_unit(match_score),
        BackendAgreement::Agreed { backend_confidence } => {
            0.5 * clamp_unit(match_score) + 0.5 * clamp_unit(backend_confidence)
        }
        BackendAgreement::Overrode { backend_confidence } => {
            (0.5 * clamp_unit(match_score) + 0.5 * clamp_unit(backend_confidence)) * OVERRIDE_FACTOR
        }
    };
    if ambiguous {
        clamp_unit(base * clamp_unit(decision_confidence))
    } else {
        clamp_unit(base)
    }
}

#[cfg(test)]
mod tests {
    use opsgate_contracts::intent::EntitySource;
    use proptest::prelude::*;

    use super::*;

    fn entity(entity_type: EntityType, value: &str) -> Entity {
        Entity {
            entity_type,
            value: value.to_string(),
            confidence: 0.9,
            source: EntitySource::Pattern,
            span: None,
        }
    }

    #[test]
    fn production_plus_destructive_verb_is_high() {
        let entities = vec![
            entity(EntityType::Hostname, "prod-db-01"),
            entity(EntityType::Service, "database"),
            entity(EntityType::CommandVerb, "stop"),
        ];
        let signals = RiskSignals::collect("Stop the database service on prod-db-01", &entities, "stop");
        assert!(signals.production && signals.destructive);
        assert_eq!(rule_risk(signals), RiskLevel::High);
    }

    #[test]
    fn irreversible_on_production_is_critical() {
        let entities = vec![entity(EntityType::Environment, "production")];
        let signals = RiskSignals::collect("drop the orders table in production", &entities, "drop");
        assert_eq!(rule_risk(signals), RiskLevel::Critical);
    }

    #[test]
    fn destructive_on_many_targets_is_high() {
        let entities = vec![
            entity(EntityType::Hostname, "web-01"),
            entity(EntityType::Hostname, "web-02"),
        ];
        let signals = RiskSignals::collect("restart web-01 and web-02", &entities, "restart");
        assert_eq!(rule_risk(signals), RiskLevel::High);
    }

    #[test]
    fn read_only_request_is_low() {
        let signals = RiskSignals::collect("Show me all assets", &[], "show");
        assert_eq!(rule_risk(signals), RiskLevel::Low);
    }

    #[test]
    fn backend_never_downgrades() {
        assert_eq!(combine_risk(RiskLevel::High, RiskLevel::Low), RiskLevel::High);
        assert_eq!(combine_risk(RiskLevel::Low, RiskLevel::High), RiskLevel::High);
    }

    #[test]
    fn clarity_drops_for_pronouns_and_vague_verbs() {
        assert_eq!(request_clarity("Show me all assets"), 1.0);
        assert!(request_clarity("fix it") < 0.5);
        assert!(request_clarity("restart that thing on it") < request_clarity("restart nginx on web-01"));
    }

    #[test]
    fn coverage_counts_expected_kinds() {
        let entities = vec![entity(EntityType::Hostname, "web-01")];
        assert_eq!(entity_coverage(IntentCategory::ServiceManagement, &entities), 0.5);
        assert_eq!(entity_coverage(IntentCategory::AssetManagement, &[]), 1.0);
    }

    #[test]
    fn decision_type_follows_verb_and_threshold() {
        assert_eq!(decision_type(0.9, "list", None), DecisionType::Information);
        assert_eq!(decision_type(0.9, "stop", Some(true)), DecisionType::Action);
        assert_eq!(decision_type(0.9, "frobnicate", None), DecisionType::Action);
        assert_eq!(decision_type(0.3, "list", None), DecisionType::Ambiguous);
    }

    #[test]
    fn ambiguous_selection_confidence_is_scaled_down() {
        let clear = selection_confidence(0.9, BackendAgreement::NotConsulted, 0.3, false);
        let ambiguous = selection_confidence(0.9, BackendAgreement::NotConsulted, 0.3, true);
        assert!(ambiguous < 0.3);
        assert!(clear > ambiguous);
    }

    fn arb_entity() -> impl Strategy<Value = Entity> {
        let kinds = prop_oneof![
            Just(EntityType::Hostname),
            Just(EntityType::Environment),
            Just(EntityType::CommandVerb),
            Just(EntityType::Service),
            Just(EntityType::OsFamily),
        ];
        let values = prop_oneof![
            Just("prod-db-01"),
            Just("production"),
            Just("web-01"),
            Just("stop"),
            Just("delete"),
            Just("list"),
            Just("windows"),
            Just("nginx"),
        ];
        (kinds, values).prop_map(|(k, v)| entity(k, v))
    }

    proptest! {
        #[test]
        fn confidence_stays_in_unit_interval(b in any::<f64>(), c in any::<f64>(), k in any::<f64>()) {
            let x = combined_confidence(b, c, k);
            prop_assert!((0.0..=1.0).contains(&x));
        }

        #[test]
        fn clarity_stays_in_unit_interval(text in ".{0,80}") {
            let x = request_clarity(&text);
            prop_assert!((0.0..=1.0).contains(&x));
        }

        #[test]
        fn adding_an_entity_never_lowers_risk(
            base in proptest::collection::vec(arb_entity(), 0..5),
            extra in arb_entity(),
            action in prop_oneof![Just("list"), Just("stop"), Just("delete"), Just("restart")],
        ) {
            let before = rule_risk(RiskSignals::collect("request", &base, action));
            let mut more = base.clone();
            more.push(extra);
            let after = rule_risk(RiskSignals::collect("request", &more, action));
            prop_assert!(after >= before);
        }

        #[test]
        fn risk_is_at_least_what_any_single_entity_implies(
            entities in proptest::collection::vec(arb_entity(), 1..5),
            action in prop_oneof![Just("list"), Just("stop"), Just("delete")],
        ) {
            let all = rule_risk(RiskSignals::collect("request", &entities, action));
            for e in &entities {
                let single = rule_risk(RiskSignals::collect("request", std::slice::from_ref(e), action));
                prop_assert!(all >= single);
            }
        }

        #[test]
        fn match_score_stays_in_unit_interval(o in 0.0f64..=1.0, e in 0.0f64..=1.0, p in any::<bool>()) {
            let s = match_score(o, e, p);
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
