//! Delivery size ceiling enforcement.
//!
//! An artifact over the ceiling gets exactly one re-encode with the
//! compression profile. If that is still too large, or the encode fails,
//! the local file is dropped and a link is delivered instead.

mod enforcer;
mod error;

pub use enforcer::{link_reference, Enforced, SizeEnforcer};
pub use error::PostProcessError;
