pub mod artifacts;
pub mod assemble;
pub mod cleanup;
pub mod crc16;
pub mod error;
pub mod layout;
pub mod signer;

pub use assemble::{build, Job, Outcome, Report};
pub use layout::LAYOUT;

#[cfg(all(test, unix))]
pub(crate) mod testutil;
