#![doc(test(attr(deny(warnings))))]

//! ISA Tracker records ISA subscriptions, works out how much allowance is
//! left in each tax year and scores how consistently the user saves.
//!
//! The engine lives in the `isa-*` workspace crates; this crate wires them to
//! configuration, JSON storage and the interactive shell.

pub mod cli;
pub mod errors;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "ISA tracker started");
    });
}
