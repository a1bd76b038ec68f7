use isa_domain::{FlexibilityPolicy, FlexibilitySettings, IsaType};

use crate::CoreError;

/// Validated writes and lookups against the flexibility table.
pub struct FlexibilityService;

impl FlexibilityService {
    /// Stores a policy. A flexible Lifetime ISA is refused before it reaches the table.
    pub fn set(
        settings: &mut FlexibilitySettings,
        provider: &str,
        isa_type: IsaType,
        flexible: bool,
    ) -> Result<(), CoreError> {
        if provider.trim().is_empty() {
            return Err(CoreError::Validation("provider name must not be empty".into()));
        }
        let policy = FlexibilityPolicy::new(provider, isa_type, flexible)?;
        tracing::info!(
            provider = policy.provider(),
            isa_type = isa_type.key(),
            flexible,
            "flexibility policy updated"
        );
        settings.set(policy);
        Ok(())
    }

    pub fn clear(settings: &mut FlexibilitySettings, provider: &str, isa_type: IsaType) -> bool {
        settings.clear(provider, isa_type)
    }

    /// True when the user still has to say whether this account is flexible.
    pub fn needs_confirmation(
        settings: &FlexibilitySettings,
        provider: &str,
        isa_type: IsaType,
    ) -> bool {
        settings.get(provider, isa_type).is_none()
    }

    pub fn describe(
        settings: &FlexibilitySettings,
        provider: &str,
        isa_type: IsaType,
    ) -> &'static str {
        match settings.get(provider, isa_type) {
            Some(true) => "flexible",
            Some(false) if isa_type == IsaType::Lifetime => "never flexible",
            Some(false) => "not flexible",
            None => "unknown",
        }
    }
}
