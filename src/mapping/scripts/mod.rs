//! Behavioral scripts layered on top of the shaped axis channels.

pub mod auto_clutch;
pub mod range_modifier;
pub mod winding;

pub use auto_clutch::AutoClutch;
pub use range_modifier::RangeModifier;
pub use winding::{Winding, WindingState};
