//! isa-domain
//!
//! Pure domain models (Contribution, Withdrawal, TaxYear, Level, FlexibilityPolicy).
//! No I/O, no CLI, no storage. Only data types, validation and core enums.

pub mod common;
pub mod contribution;
pub mod flexibility;
pub mod isa_type;
pub mod level;
pub mod tax_year;

pub use common::*;
pub use contribution::*;
pub use flexibility::*;
pub use isa_type::*;
pub use level::*;
pub use tax_year::*;
