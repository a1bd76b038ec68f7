use std::{collections::HashSet, path::PathBuf};

use isa_domain::{Contribution, FlexibilitySettings, IsaType, Withdrawal};

use crate::CoreError;

/// Describes a persisted backup of one stored document.
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub document: String,
    pub id: String,
    pub created_at: String,
    pub path: PathBuf,
}

/// Ordered persistence for the contribution log.
pub trait ContributionStore: Send + Sync {
    fn load_contributions(&self) -> Result<Vec<Contribution>, CoreError>;
    fn save_contributions(&self, contributions: &[Contribution]) -> Result<(), CoreError>;
}

pub trait WithdrawalStore: Send + Sync {
    fn load_withdrawals(&self) -> Result<Vec<Withdrawal>, CoreError>;
    fn save_withdrawals(&self, withdrawals: &[Withdrawal]) -> Result<(), CoreError>;
}

/// Backing table for per-account flexibility policies.
pub trait FlexibilityStore: Send + Sync {
    fn load_flexibility(&self) -> Result<FlexibilitySettings, CoreError>;
    fn save_flexibility(&self, settings: &FlexibilitySettings) -> Result<(), CoreError>;
}

/// Detects duplicate ids and other anomalies in a loaded snapshot.
pub fn book_warnings(
    contributions: &[Contribution],
    withdrawals: &[Withdrawal],
    flexibility: &FlexibilitySettings,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();
    for contribution in contributions {
        if !seen.insert(contribution.id) {
            warnings.push(format!("contribution {} appears more than once", contribution.id));
        }
    }

    let mut lifetime_providers: Vec<&str> = Vec::new();
    for contribution in contributions
        .iter()
        .filter(|c| !c.deleted && c.isa_type == IsaType::Lifetime)
    {
        if !lifetime_providers
            .iter()
            .any(|provider| contribution.is_with(provider))
        {
            lifetime_providers.push(&contribution.provider);
        }
    }
    if lifetime_providers.len() > 1 {
        warnings.push(format!(
            "Lifetime ISA contributions found with more than one provider: {}",
            lifetime_providers.join(", ")
        ));
    }

    for withdrawal in withdrawals {
        let funded = contributions
            .iter()
            .any(|c| c.isa_type == withdrawal.isa_type && c.is_with(&withdrawal.provider));
        if !funded {
            warnings.push(format!(
                "withdrawal {} from {} {} has no matching contributions",
                withdrawal.id, withdrawal.provider, withdrawal.isa_type
            ));
        }
        if flexibility
            .get(&withdrawal.provider, withdrawal.isa_type)
            .is_none()
        {
            warnings.push(format!(
                "withdrawal {} comes from {} {} whose flexibility is unknown",
                withdrawal.id, withdrawal.provider, withdrawal.isa_type
            ));
        }
    }
    warnings
}
