//! Word lists behind the deterministic rules.
//!
//! Verbs are matched as whole lowercase tokens.

pub const READ_ONLY_VERBS: &[&str] = &[
    "show", "list", "get", "find", "display", "check", "status", "describe", "count", "query",
    "search", "view", "inspect", "report", "tail", "read", "ping", "trace", "traceroute",
    "investigate", "diagnose", "monitor", "what", "which",
];

pub const MUTATING_VERBS: &[&str] = &[
    "start", "stop", "restart", "reboot", "delete", "remove", "kill", "shutdown", "drop",
    "wipe", "format", "terminate", "disable", "enable", "install", "uninstall", "update",
    "upgrade", "deploy", "create", "write", "modify", "change", "set", "move", "copy", "run",
    "execute", "purge", "truncate", "rollback", "scale", "patch",
];

/// Mutating verbs that take something away. Force risk ≥ medium, and ≥ high
/// on production or multiple targets.
pub const DESTRUCTIVE_VERBS: &[&str] = &[
    "delete", "remove", "stop", "restart", "reboot", "kill", "shutdown", "drop", "wipe",
    "format", "terminate", "disable", "purge", "truncate", "uninstall",
];

/// Destructive verbs with no inverse. Critical on production.
pub const IRREVERSIBLE_VERBS: &[&str] = &["delete", "drop", "wipe", "format", "purge", "truncate"];

/// Tokens marking a value as production-class.
pub const PRODUCTION_TOKENS: &[&str] = &["prod", "production", "prd", "live"];

pub const AMBIGUOUS_PRONOUNS: &[&str] = &[
    "it", "that", "this", "them", "those", "these", "something", "stuff", "thing", "things",
    "there",
];

pub const VAGUE_VERBS: &[&str] = &["fix", "handle", "do", "deal", "sort", "manage", "help"];

/// Words implying the request covers many targets.
pub const MULTI_TARGET_QUANTIFIERS: &[&str] = &["all", "every", "each", "fleet", "everything"];

pub const KNOWN_SERVICES: &[&str] = &[
    "nginx", "apache", "httpd", "iis", "mysql", "postgres", "postgresql", "redis", "docker",
    "sshd", "database", "kafka", "rabbitmq", "elasticsearch", "tomcat",
];

pub const OS_FAMILIES: &[&str] = &["windows", "linux", "macos"];

pub fn is_read_only(verb: &str) -> bool {
    READ_ONLY_VERBS.contains(&verb)
}

pub fn is_mutating(verb: &str) -> bool {
    MUTATING_VERBS.contains(&verb)
}

pub fn is_destructive(verb: &str) -> bool {
    DESTRUCTIVE_VERBS.contains(&verb)
}

pub fn is_irreversible(verb: &str) -> bool {
    IRREVERSIBLE_VERBS.contains(&verb)
}

pub fn is_known_verb(verb: &str) -> bool {
    is_read_only(verb) || is_mutating(verb)
}

/// True if any alphanumeric token of `value` is a production marker, so
/// both "production" and "prod-db-01" qualify.
pub fn is_production_value(value: &str) -> bool {
    tokens(value).any(|t| PRODUCTION_TOKENS.contains(&t.as_str()))
}

/// Canonical environment name: "prod" → "production", "stage" → "staging".
pub fn canonical_environment(value: &str) -> String {
    let lower = value.trim().to_lowercase();
    match lower.as_str() {
        "prod" | "prd" | "live" => "production".to_string(),
        "stage" => "staging".to_string(),
        "dev" => "development".to_string(),
        _ => lower,
    }
}

/// Lowercase alphanumeric tokens of `text`.
pub fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destructive_verbs_are_mutating() {
        for verb in DESTRUCTIVE_VERBS {
            assert!(is_mutating(verb), "{verb} is destructive but not mutating");
            assert!(!is_read_only(verb), "{verb} cannot be both read-only and destructive");
        }
        for verb in IRREVERSIBLE_VERBS {
            assert!(is_destructive(verb));
        }
    }

    #[test]
    fn production_detection_uses_tokens() {
        assert!(is_production_value("prod-db-01"));
        assert!(is_production_value("Production"));
        assert!(is_production_value("live"));
        assert!(!is_production_value("product-catalog-01"));
        assert!(!is_production_value("staging"));
    }

    #[test]
    fn environment_names_are_canonicalised() {
        assert_eq!(canonical_environment("PROD"), "production");
        assert_eq!(canonical_environment("stage"), "staging");
        assert_eq!(canonical_environment("qa"), "qa");
    }
}
