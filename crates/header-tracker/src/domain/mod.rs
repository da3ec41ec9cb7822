//! # Domain Layer for the Header Tracker
//!
//! Pure, synchronous state with no I/O:
//!
//! - **entities**: the tip state machine (`TipState`, `TipTransition`)
//! - **cache**: bounded header cache and per-peer forward records
//! - **value_objects**: configuration and metrics
//! - **invariants**: checks over tip transitions

mod cache;
mod entities;
mod invariants;
mod value_objects;

pub use cache::*;
pub use entities::*;
pub use invariants::*;
pub use value_objects::*;

#[cfg(test)]
pub(crate) use entities::tests as test_support;
