//! isa-core
//!
//! Allowance accounting engine for UK ISAs.
//! Depends on isa-domain. No CLI, no terminal I/O, no direct storage interactions.

pub mod allowance;
pub mod book;
pub mod calendar;
pub mod error;
pub mod flexibility_service;
pub mod format;
pub mod ledger_service;
pub mod public_api;
pub mod scoring;
pub mod storage;
pub mod time;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use allowance::*;
pub use book::IsaBook;
pub use calendar::TaxYearCalendar;
pub use error::CoreError;
pub use flexibility_service::FlexibilityService;
pub use format::{CurrencyFormatter, PoundFormatter};
pub use ledger_service::*;
pub use scoring::*;
pub use time::{Clock, FixedClock, SystemClock};
pub use wizard::{AddContributionWizard, WizardError, WizardOutcome, WizardStep};
