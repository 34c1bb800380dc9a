//! Host table synchronizer
//!
//! Keeps a delimited, vith-owned section of the host name resolution file
//! (usually `/etc/hosts`) in sync with container addresses. Everything
//! outside that section is preserved byte-for-byte.
//!
//! The file is shared with other tools and is rewritten through a staged
//! copy promoted by a [`HostFilePromoter`]. There is no locking: concurrent
//! vith invocations against the same file are last-writer-wins.

pub mod error;
pub mod promote;
pub mod section;

#[cfg(test)]
mod tests;

pub use error::{HostsError, Result};
pub use promote::{HostFilePromoter, RenamePromoter, SudoPromoter};
pub use section::{ManagedHostSection, BEGIN_MARKER, END_MARKER};
