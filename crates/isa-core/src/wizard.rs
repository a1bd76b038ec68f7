//! Step-by-step flow for adding a contribution.
//!
//! `ChooseProvider → ChooseType → EnterAmount → ConfirmFlexibility → Done`.
//! The confirmation step only appears when the account's flexibility is not yet
//! known, which is never the case for a Lifetime ISA. Every transition checks the
//! current step, so a front end cannot skip ahead or submit twice.

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;

use isa_domain::{
    parse_amount, same_provider, validate_amount, Contribution, FlexibilityPolicy,
    FlexibilitySettings, IsaType, PolicyViolation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    ChooseProvider,
    ChooseType,
    EnterAmount,
    ConfirmFlexibility,
    Done,
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WizardStep::ChooseProvider => "choose provider",
            WizardStep::ChooseType => "choose ISA type",
            WizardStep::EnterAmount => "enter amount",
            WizardStep::ConfirmFlexibility => "confirm flexibility",
            WizardStep::Done => "done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("cannot {attempted} while at step `{current}`")]
    WrongStep {
        current: WizardStep,
        attempted: WizardStep,
    },
    #[error("already at the first step")]
    AtStart,
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
}

/// What a completed wizard hands back: the contribution and, when asked, the policy to store.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardOutcome {
    pub contribution: Contribution,
    pub policy: Option<FlexibilityPolicy>,
}

#[derive(Debug, Clone)]
pub struct AddContributionWizard {
    step: WizardStep,
    date: NaiveDateTime,
    flexibility: FlexibilitySettings,
    lifetime_provider: Option<String>,
    provider: Option<String>,
    isa_type: Option<IsaType>,
    amount: Option<Decimal>,
    flexible: Option<bool>,
    notes: Option<String>,
}

impl AddContributionWizard {
    /// Captures the policy table and current Lifetime provider so later steps can be validated.
    pub fn new(
        date: NaiveDateTime,
        flexibility: &FlexibilitySettings,
        contributions: &[Contribution],
    ) -> Self {
        let lifetime_provider = contributions
            .iter()
            .find(|c| !c.deleted && c.isa_type == IsaType::Lifetime)
            .map(|c| c.provider.clone());
        Self {
            step: WizardStep::ChooseProvider,
            date,
            flexibility: flexibility.clone(),
            lifetime_provider,
            provider: None,
            isa_type: None,
            amount: None,
            flexible: None,
            notes: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn isa_type(&self) -> Option<IsaType> {
        self.isa_type
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.amount
    }

    pub fn is_done(&self) -> bool {
        self.step == WizardStep::Done
    }

    pub fn choose_provider(&mut self, provider: &str) -> Result<WizardStep, WizardError> {
        self.expect(WizardStep::ChooseProvider)?;
        let provider = provider.trim();
        if provider.is_empty() {
            return Err(WizardError::Invalid("provider name must not be empty".into()));
        }
        self.provider = Some(provider.to_string());
        Ok(self.advance(WizardStep::ChooseType))
    }

    /// Refuses a Lifetime ISA when one is already held with a different provider.
    pub fn choose_type(&mut self, isa_type: IsaType) -> Result<WizardStep, WizardError> {
        self.expect(WizardStep::ChooseType)?;
        if isa_type == IsaType::Lifetime {
            if let (Some(existing), Some(requested)) = (&self.lifetime_provider, &self.provider) {
                if !same_provider(existing, requested) {
                    return Err(PolicyViolation::SecondLifetimeProvider {
                        existing: existing.clone(),
                        requested: requested.clone(),
                    }
                    .into());
                }
            }
        }
        self.isa_type = Some(isa_type);
        Ok(self.advance(WizardStep::EnterAmount))
    }

    /// Accepts free-form input such as `£1,500`.
    pub fn enter_amount_text(&mut self, raw: &str) -> Result<WizardStep, WizardError> {
        self.expect(WizardStep::EnterAmount)?;
        let amount = parse_amount(raw).map_err(|err| WizardError::Invalid(err.to_string()))?;
        self.enter_amount(amount)
    }

    pub fn enter_amount(&mut self, amount: Decimal) -> Result<WizardStep, WizardError> {
        self.expect(WizardStep::EnterAmount)?;
        let amount = validate_amount(amount).map_err(|err| WizardError::Invalid(err.to_string()))?;
        self.amount = Some(amount);
        let next = if self.flexibility_known() {
            WizardStep::Done
        } else {
            WizardStep::ConfirmFlexibility
        };
        Ok(self.advance(next))
    }

    pub fn confirm_flexibility(&mut self, flexible: bool) -> Result<WizardStep, WizardError> {
        self.expect(WizardStep::ConfirmFlexibility)?;
        self.flexible = Some(flexible);
        Ok(self.advance(WizardStep::Done))
    }

    /// Notes may be attached at any step before completion.
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        let notes = notes.into();
        self.notes = Some(notes).filter(|text| !text.trim().is_empty());
    }

    /// Steps back one state, forgetting the answer given there.
    pub fn back(&mut self) -> Result<WizardStep, WizardError> {
        let previous = match self.step {
            WizardStep::ChooseProvider => return Err(WizardError::AtStart),
            WizardStep::ChooseType => WizardStep::ChooseProvider,
            WizardStep::EnterAmount => WizardStep::ChooseType,
            WizardStep::ConfirmFlexibility => WizardStep::EnterAmount,
            WizardStep::Done if self.flexible.is_some() => WizardStep::ConfirmFlexibility,
            WizardStep::Done => WizardStep::EnterAmount,
        };
        match previous {
            WizardStep::ChooseProvider => {
                self.provider = None;
                self.isa_type = None;
                self.amount = None;
                self.flexible = None;
            }
            WizardStep::ChooseType => {
                self.isa_type = None;
                self.amount = None;
                self.flexible = None;
            }
            WizardStep::EnterAmount => {
                self.amount = None;
                self.flexible = None;
            }
            WizardStep::ConfirmFlexibility => self.flexible = None,
            WizardStep::Done => {}
        }
        tracing::trace!(from = %self.step, to = %previous, "wizard stepped back");
        self.step = previous;
        Ok(previous)
    }

    /// Builds the validated contribution. Only valid once the flow reached `Done`.
    pub fn finish(self) -> Result<WizardOutcome, WizardError> {
        self.expect(WizardStep::Done)?;
        let (Some(provider), Some(isa_type), Some(amount)) =
            (self.provider, self.isa_type, self.amount)
        else {
            return Err(WizardError::Invalid("wizard finished without all answers".into()));
        };
        let policy = self
            .flexible
            .map(|flexible| FlexibilityPolicy::new(provider.clone(), isa_type, flexible))
            .transpose()?;
        let mut contribution = Contribution::new(isa_type, provider, amount, self.date)
            .map_err(|err| WizardError::Invalid(err.to_string()))?;
        if let Some(notes) = self.notes {
            contribution = contribution.with_notes(notes);
        }
        Ok(WizardOutcome {
            contribution,
            policy,
        })
    }

    fn flexibility_known(&self) -> bool {
        match (&self.provider, self.isa_type) {
            (Some(provider), Some(isa_type)) => self.flexibility.get(provider, isa_type).is_some(),
            _ => false,
        }
    }

    fn expect(&self, attempted: WizardStep) -> Result<(), WizardError> {
        if self.step == attempted {
            Ok(())
        } else {
            Err(WizardError::WrongStep {
                current: self.step,
                attempted,
            })
        }
    }

    fn advance(&mut self, next: WizardStep) -> WizardStep {
        tracing::trace!(from = %self.step, to = %next, "wizard advanced");
        self.step = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn unknown_account_goes_through_confirmation() {
        let settings = FlexibilitySettings::new();
        let mut wizard = AddContributionWizard::new(today(), &settings, &[]);
        assert_eq!(wizard.choose_provider(" Chip ").unwrap(), WizardStep::ChooseType);
        assert_eq!(wizard.choose_type(IsaType::Cash).unwrap(), WizardStep::EnterAmount);
        assert_eq!(
            wizard.enter_amount_text("£1,500").unwrap(),
            WizardStep::ConfirmFlexibility
        );
        assert_eq!(wizard.confirm_flexibility(true).unwrap(), WizardStep::Done);
        wizard.set_notes("birthday money");

        let outcome = wizard.finish().unwrap();
        assert_eq!(outcome.contribution.provider, "Chip");
        assert_eq!(outcome.contribution.amount, dec!(1500));
        assert_eq!(outcome.contribution.notes.as_deref(), Some("birthday money"));
        let policy = outcome.policy.expect("policy captured");
        assert!(policy.is_flexible());
    }

    #[test]
    fn lifetime_and_known_accounts_skip_confirmation() {
        let mut settings = FlexibilitySettings::new();
        settings.set(FlexibilityPolicy::new("Vanguard", IsaType::StocksAndShares, false).unwrap());

        let mut lifetime = AddContributionWizard::new(today(), &settings, &[]);
        lifetime.choose_provider("Moneybox").unwrap();
        lifetime.choose_type(IsaType::Lifetime).unwrap();
        assert_eq!(lifetime.enter_amount(dec!(100)).unwrap(), WizardStep::Done);
        assert!(lifetime.finish().unwrap().policy.is_none());

        let mut known = AddContributionWizard::new(today(), &settings, &[]);
        known.choose_provider("vanguard").unwrap();
        known.choose_type(IsaType::StocksAndShares).unwrap();
        assert_eq!(known.enter_amount(dec!(250)).unwrap(), WizardStep::Done);
    }

    #[test]
    fn second_lifetime_provider_is_refused_at_type_step() {
        let existing =
            Contribution::new(IsaType::Lifetime, "Moneybox", dec!(500), today()).unwrap();
        let mut wizard =
            AddContributionWizard::new(today(), &FlexibilitySettings::new(), &[existing]);
        wizard.choose_provider("AJ Bell").unwrap();
        let err = wizard.choose_type(IsaType::Lifetime).unwrap_err();
        assert!(matches!(
            err,
            WizardError::Policy(PolicyViolation::SecondLifetimeProvider { .. })
        ));
        assert_eq!(wizard.step(), WizardStep::ChooseType);
        assert_eq!(wizard.choose_type(IsaType::Cash).unwrap(), WizardStep::EnterAmount);
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let mut wizard = AddContributionWizard::new(today(), &FlexibilitySettings::new(), &[]);
        assert_eq!(
            wizard.enter_amount(dec!(10)).unwrap_err(),
            WizardError::WrongStep {
                current: WizardStep::ChooseProvider,
                attempted: WizardStep::EnterAmount,
            }
        );
        assert_eq!(wizard.back().unwrap_err(), WizardError::AtStart);
        assert!(wizard.clone().finish().is_err());
        assert!(wizard.choose_provider("   ").is_err());
    }

    #[test]
    fn back_forgets_the_answer_it_returns_to() {
        let mut wizard = AddContributionWizard::new(today(), &FlexibilitySettings::new(), &[]);
        wizard.choose_provider("Chip").unwrap();
        wizard.choose_type(IsaType::Cash).unwrap();
        wizard.enter_amount(dec!(100)).unwrap();
        wizard.confirm_flexibility(false).unwrap();

        assert_eq!(wizard.back().unwrap(), WizardStep::ConfirmFlexibility);
        assert_eq!(wizard.back().unwrap(), WizardStep::EnterAmount);
        assert_eq!(wizard.amount(), None);
        assert_eq!(wizard.back().unwrap(), WizardStep::ChooseType);
        assert_eq!(wizard.isa_type(), None);
        assert_eq!(wizard.provider(), Some("Chip"));
        assert!(wizard.enter_amount_text("-5").is_err());
    }
}
