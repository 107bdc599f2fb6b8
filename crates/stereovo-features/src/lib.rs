#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod feature;
pub use feature::*;

mod matcher;
pub use matcher::*;
