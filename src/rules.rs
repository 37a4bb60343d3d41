// src/rules.rs - Priority-ordered form rules over a feature vector
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::features::{Feature, FeatureVector};
use crate::state_machine::{FormCheck, Phase};

/// A boolean test over the feature vector. Comparisons are strict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Below { feature: Feature, value: f64 },
    Above { feature: Feature, value: f64 },
    /// True when the value leaves `[min, max]`.
    Outside { feature: Feature, min: f64, max: f64 },
    /// True when the value lies in `[min, max]`.
    Within { feature: Feature, min: f64, max: f64 },
    Any { of: Vec<Predicate> },
    All { of: Vec<Predicate> },
}

impl Predicate {
    pub fn below(feature: Feature, value: f64) -> Self {
        Predicate::Below { feature, value }
    }

    pub fn above(feature: Feature, value: f64) -> Self {
        Predicate::Above { feature, value }
    }

    pub fn outside(feature: Feature, min: f64, max: f64) -> Self {
        Predicate::Outside { feature, min, max }
    }

    pub fn within(feature: Feature, min: f64, max: f64) -> Self {
        Predicate::Within { feature, min, max }
    }

    pub fn evaluate(&self, features: &FeatureVector) -> Result<bool> {
        Ok(match self {
            Predicate::Below { feature, value } => features.get(*feature)? < *value,
            Predicate::Above { feature, value } => features.get(*feature)? > *value,
            Predicate::Outside { feature, min, max } => {
                let v = features.get(*feature)?;
                v < *min || v > *max
            }
            Predicate::Within { feature, min, max } => {
                let v = features.get(*feature)?;
                v >= *min && v <= *max
            }
            Predicate::Any { of } => {
                for p in of {
                    if p.evaluate(features)? {
                        return Ok(true);
                    }
                }
                false
            }
            Predicate::All { of } => {
                for p in of {
                    if !p.evaluate(features)? {
                        return Ok(false);
                    }
                }
                true
            }
        })
    }

    /// Every feature the predicate reads.
    pub fn collect_features(&self, out: &mut Vec<Feature>) {
        match self {
            Predicate::Below { feature, .. }
            | Predicate::Above { feature, .. }
            | Predicate::Outside { feature, .. }
            | Predicate::Within { feature, .. } => out.push(*feature),
            Predicate::Any { of } | Predicate::All { of } => {
                for p in of {
                    p.collect_features(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// A form violation: reported as the frame's error and spoils a perfect rep.
    #[default]
    Form,
    /// Informational coaching such as "go deeper". Never an error.
    Guidance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub label: String,
    #[serde(default)]
    pub kind: RuleKind,
    pub when: Predicate,
    /// Phases in which the rule applies; empty means every phase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<Phase>,
}

impl Rule {
    pub fn form(label: impl Into<String>, when: Predicate) -> Self {
        Self {
            label: label.into(),
            kind: RuleKind::Form,
            when,
            phases: Vec::new(),
        }
    }

    pub fn guidance(label: impl Into<String>, when: Predicate) -> Self {
        Self {
            label: label.into(),
            kind: RuleKind::Guidance,
            when,
            phases: Vec::new(),
        }
    }

    pub fn during(mut self, phases: &[Phase]) -> Self {
        self.phases = phases.to_vec();
        self
    }

    pub fn applies_in(&self, phase: Phase) -> bool {
        self.phases.is_empty() || self.phases.contains(&phase)
    }

    pub fn is_form(&self) -> bool {
        self.kind == RuleKind::Form
    }

    /// Phase-gated form rules only spoil the perfect flag; ungated ones can
    /// also withhold the count.
    pub fn form_check(&self) -> FormCheck {
        match self.kind {
            RuleKind::Guidance => FormCheck::Clean,
            RuleKind::Form if self.phases.is_empty() => FormCheck::Blocking,
            RuleKind::Form => FormCheck::Flawed,
        }
    }
}

/// Ordered rules; earlier rules outrank later ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSpec {
    rules: Vec<Rule>,
}

impl RuleSpec {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first rule that applies in `phase` and whose predicate holds.
    pub fn evaluate(&self, features: &FeatureVector, phase: Phase) -> Result<Option<&Rule>> {
        for rule in self.rules.iter().filter(|r| r.applies_in(phase)) {
            if rule.when.evaluate(features)? {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }

    pub fn features(&self) -> Vec<Feature> {
        let mut out = Vec::new();
        for rule in &self.rules {
            rule.when.collect_features(&mut out);
        }
        out
    }

    /// Form rules must all come before guidance rules.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let mut first_guidance: Option<&Rule> = None;
        for rule in &self.rules {
            match (rule.kind, first_guidance) {
                (RuleKind::Guidance, None) => first_guidance = Some(rule),
                (RuleKind::Form, Some(guidance)) => {
                    return Err(ConfigError::GuidanceBeforeForm {
                        guidance: guidance.label.clone(),
                        form: rule.label.clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}
