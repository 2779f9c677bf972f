//! Promotion of validated audit relations to production.
//!
//! [`Publisher::promote`] is the only writer of production relations. It
//! runs after the audit has passed and dispatches on the table's
//! [`wap_model::LoadStrategy`].

pub mod publisher;

pub use publisher::{Publisher, PromotionSummary};
