//! Record access facade.
//!
//! # Responsibility
//! - Provide the public CRUD surface over [`crate::store::StoreContext`].
//! - Keep predicate construction and fetch descriptors out of caller
//!   code.
//!
//! # See also
//! - [`shared`] for the configure-once process-wide instance.

pub mod record_access;
pub mod shared;
