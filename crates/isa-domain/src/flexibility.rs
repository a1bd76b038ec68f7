//! Per-account flexibility policies.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{contribution::same_provider, isa_type::IsaType};

/// Business-rule violations that are not amount validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    LifetimeNeverFlexible,
    SecondLifetimeProvider { existing: String, requested: String },
    LifetimeCapExceeded { remaining: Decimal, requested: Decimal },
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyViolation::LifetimeNeverFlexible => {
                f.write_str("a Lifetime ISA can never be marked as flexible")
            }
            PolicyViolation::SecondLifetimeProvider {
                existing,
                requested,
            } => write!(
                f,
                "a Lifetime ISA is already held with {existing}; cannot add one with {requested}"
            ),
            PolicyViolation::LifetimeCapExceeded {
                remaining,
                requested,
            } => write!(
                f,
                "Lifetime ISA deposit of £{requested} exceeds the £{remaining} left of this year's Lifetime cap"
            ),
        }
    }
}

impl std::error::Error for PolicyViolation {}

/// Whether withdrawals from `{provider, isa_type}` can be replaced in the same tax year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "PolicyRecord")]
pub struct FlexibilityPolicy {
    provider: String,
    isa_type: IsaType,
    flexible: bool,
}

impl FlexibilityPolicy {
    /// Lifetime ISAs can only ever carry a non-flexible policy.
    pub fn new(
        provider: impl Into<String>,
        isa_type: IsaType,
        flexible: bool,
    ) -> Result<Self, PolicyViolation> {
        if flexible && !isa_type.can_be_flexible() {
            return Err(PolicyViolation::LifetimeNeverFlexible);
        }
        Ok(Self {
            provider: provider.into().trim().to_string(),
            isa_type,
            flexible,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn isa_type(&self) -> IsaType {
        self.isa_type
    }

    pub fn is_flexible(&self) -> bool {
        self.flexible
    }

    pub fn applies_to(&self, provider: &str, isa_type: IsaType) -> bool {
        self.isa_type == isa_type && same_provider(&self.provider, provider)
    }
}

/// Lookup table of known policies, keyed by provider and ISA type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlexibilitySettings {
    #[serde(default)]
    policies: Vec<FlexibilityPolicy>,
}

impl FlexibilitySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(false)` for Lifetime ISAs without consulting the table; `None` when unknown.
    pub fn get(&self, provider: &str, isa_type: IsaType) -> Option<bool> {
        if !isa_type.can_be_flexible() {
            return Some(false);
        }
        self.policies
            .iter()
            .find(|policy| policy.applies_to(provider, isa_type))
            .map(FlexibilityPolicy::is_flexible)
    }

    /// Inserts or replaces the policy for the same provider and type.
    pub fn set(&mut self, policy: FlexibilityPolicy) {
        match self
            .policies
            .iter_mut()
            .find(|existing| existing.applies_to(policy.provider(), policy.isa_type()))
        {
            Some(existing) => *existing = policy,
            None => self.policies.push(policy),
        }
    }

    /// Removes the policy, returning whether one existed.
    pub fn clear(&mut self, provider: &str, isa_type: IsaType) -> bool {
        let before = self.policies.len();
        self.policies
            .retain(|policy| !policy.applies_to(provider, isa_type));
        before != self.policies.len()
    }

    pub fn is_flexible(&self, provider: &str, isa_type: IsaType) -> bool {
        self.get(provider, isa_type).unwrap_or(false)
    }

    pub fn policies(&self) -> &[FlexibilityPolicy] {
        &self.policies
    }
}

#[derive(Deserialize)]
struct PolicyRecord {
    provider: String,
    isa_type: IsaType,
    flexible: bool,
}

impl TryFrom<PolicyRecord> for FlexibilityPolicy {
    type Error = PolicyViolation;

    fn try_from(record: PolicyRecord) -> Result<Self, Self::Error> {
        FlexibilityPolicy::new(record.provider, record.isa_type, record.flexible)
    }
}
