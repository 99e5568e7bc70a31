//! The precedence-ordered rule classifier: first match wins, ties broken by
//! precedence. Rules are external data (TOML), loaded once at worker start
//! and treated opaquely otherwise.

use pipeline_types::DocumentKind;
use serde::Deserialize;
use thiserror::Error;

/// `system_notification` rules are forced into this precedence band
/// regardless of what the rule file declares, resolving the open question on
/// rule precedence: it is author-declared and total-ordered everywhere
/// except this one hardcoded exception.
pub const SYSTEM_NOTIFICATION_PRECEDENCE: i32 = i32::MAX;

/// Confidence assigned when a `system_notification` rule matches and the
/// rule itself declares none.
const SYSTEM_NOTIFICATION_CONFIDENCE: f64 = 0.99;

/// Confidence assigned to any other rule match that declares none.
const DEFAULT_RULE_CONFIDENCE: f64 = 0.9;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("invalid kind rule table: {0}")]
    InvalidTable(#[from] toml::de::Error),

    #[error("rule for {doc_kind} has an invalid sender_regex: {reason}")]
    InvalidRegex { doc_kind: DocumentKind, reason: String },
}

/// One precedence-ordered classification rule, as authored in the external
/// rule file. Matchers are ANDed within a rule: every declared positive
/// matcher must hold and no declared negative matcher may hold.
#[derive(Debug, Clone, Deserialize)]
pub struct KindRule {
    pub doc_kind: DocumentKind,
    #[serde(default)]
    pub precedence: i32,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub sender_contains: Vec<String>,
    #[serde(default)]
    pub sender_not_contains: Vec<String>,
    #[serde(default)]
    pub subject_contains: Vec<String>,
    #[serde(default)]
    pub subject_not_contains: Vec<String>,
    #[serde(default)]
    pub body_contains: Vec<String>,
    #[serde(default)]
    pub body_not_contains: Vec<String>,
    /// Optional regex applied to the sender in addition to the plain
    /// substring matchers above (e.g. `noreply@.*\.loxone\.com`).
    #[serde(default)]
    pub sender_regex: Option<String>,
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<KindRule>,
}

struct CompiledRule {
    rule: KindRule,
    sender_regex: Option<regex::Regex>,
    declared_order: usize,
}

impl CompiledRule {
    fn matches(&self, sender: &str, subject: &str, body: &str) -> bool {
        let rule = &self.rule;

        // A rule with no matchers at all can never fire, an empty rule
        // would otherwise match everything and swallow the table.
        let has_any_matcher = !rule.sender_contains.is_empty()
            || !rule.subject_contains.is_empty()
            || !rule.body_contains.is_empty()
            || self.sender_regex.is_some();
        if !has_any_matcher {
            return false;
        }

        let sender_lc = sender.to_lowercase();
        let subject_lc = subject.to_lowercase();
        let body_lc = body.to_lowercase();

        let positive = rule.sender_contains.iter().all(|p| sender_lc.contains(&p.to_lowercase()))
            && rule.subject_contains.iter().all(|p| subject_lc.contains(&p.to_lowercase()))
            && rule.body_contains.iter().all(|p| body_lc.contains(&p.to_lowercase()));
        if !positive {
            return false;
        }

        let negative = rule.sender_not_contains.iter().any(|p| sender_lc.contains(&p.to_lowercase()))
            || rule.subject_not_contains.iter().any(|p| subject_lc.contains(&p.to_lowercase()))
            || rule.body_not_contains.iter().any(|p| body_lc.contains(&p.to_lowercase()));
        if negative {
            return false;
        }

        if let Some(re) = &self.sender_regex {
            if !re.is_match(sender) {
                return false;
            }
        }

        true
    }

    fn confidence(&self) -> f64 {
        self.rule.confidence.unwrap_or(if self.rule.doc_kind == DocumentKind::SystemNotification {
            SYSTEM_NOTIFICATION_CONFIDENCE
        } else {
            DEFAULT_RULE_CONFIDENCE
        })
    }
}

/// The outcome of running the rule table against one item: the winning kind
/// and the confidence to record on its Artifact, or `None` when no rule
/// matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifyOutcome {
    pub doc_kind: DocumentKind,
    pub confidence: f64,
}

/// Precedence-ordered rule table, loaded once and held immutably for the
/// life of a worker process.
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    pub fn load_toml(content: &str) -> Result<Self, ClassifyError> {
        let file: RuleFile = toml::from_str(content)?;
        Self::from_rules(file.rules)
    }

    fn from_rules(mut rules: Vec<KindRule>) -> Result<Self, ClassifyError> {
        for rule in &mut rules {
            if rule.doc_kind == DocumentKind::SystemNotification {
                rule.precedence = SYSTEM_NOTIFICATION_PRECEDENCE;
            }
        }

        let mut compiled = Vec::with_capacity(rules.len());
        for (declared_order, rule) in rules.into_iter().enumerate() {
            let sender_regex = match &rule.sender_regex {
                Some(pattern) => Some(regex::Regex::new(pattern).map_err(|e| ClassifyError::InvalidRegex {
                    doc_kind: rule.doc_kind,
                    reason: e.to_string(),
                })?),
                None => None,
            };
            compiled.push(CompiledRule {
                rule,
                sender_regex,
                declared_order,
            });
        }

        // Highest precedence first; ties broken by declaration order (see
        // the open-question resolution in DESIGN.md).
        compiled.sort_by(|a, b| {
            b.rule
                .precedence
                .cmp(&a.rule.precedence)
                .then(a.declared_order.cmp(&b.declared_order))
        });

        Ok(Self { rules: compiled })
    }

    /// First matching rule wins; `DocumentKind::Unknown` when nothing matches.
    #[must_use]
    pub fn classify(&self, sender: &str, subject: &str, body: &str) -> ClassifyOutcome {
        for compiled in &self.rules {
            if compiled.matches(sender, subject, body) {
                return ClassifyOutcome {
                    doc_kind: compiled.rule.doc_kind,
                    confidence: compiled.confidence(),
                };
            }
        }
        ClassifyOutcome {
            doc_kind: DocumentKind::Unknown,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleTable {
        RuleTable::load_toml(
            r#"
            [[rule]]
            doc_kind = "receipt"
            precedence = 10
            body_contains = ["receipt"]

            [[rule]]
            doc_kind = "parking_ticket"
            precedence = 20
            body_contains = ["parking", "receipt"]

            [[rule]]
            doc_kind = "system_notification"
            precedence = 1
            sender_contains = ["noreply@loxone.com"]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn higher_precedence_rule_wins_on_overlap() {
        let outcome = table().classify("billing@acme.com", "Your receipt", "parking receipt attached");
        assert_eq!(outcome.doc_kind, DocumentKind::ParkingTicket);
    }

    #[test]
    fn system_notification_overrides_declared_precedence() {
        // Declared precedence (1) is lower than both other rules, but the
        // loader forces it to the top band regardless.
        let outcome = table().classify("noreply@loxone.com", "Statistic report", "");
        assert_eq!(outcome.doc_kind, DocumentKind::SystemNotification);
        assert_eq!(outcome.confidence, SYSTEM_NOTIFICATION_CONFIDENCE);
    }

    #[test]
    fn no_match_is_unknown() {
        let outcome = table().classify("someone@example.com", "hello", "just saying hi");
        assert_eq!(outcome.doc_kind, DocumentKind::Unknown);
    }

    #[test]
    fn negative_matcher_excludes_rule() {
        let table = RuleTable::load_toml(
            r#"
            [[rule]]
            doc_kind = "invoice"
            precedence = 5
            body_contains = ["invoice"]
            body_not_contains = ["cancelled"]
            "#,
        )
        .unwrap();
        let outcome = table.classify("a@b.com", "Invoice", "your invoice is cancelled");
        assert_eq!(outcome.doc_kind, DocumentKind::Unknown);
    }
}
