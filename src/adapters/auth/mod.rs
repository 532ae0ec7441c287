//! Auth backend adapters.

mod gotrue;

pub use gotrue::{GoTrueAuthAdapter, GoTrueConfig};
