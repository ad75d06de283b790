//! Drift detection between the desired and the actual configuration of
//! infrastructure resources.
//!
//! Two comparison modes are provided, and they intentionally disagree:
//!
//! - [`engine`]: strict comparison of the raw values. Every differing field is
//!   classified as added, removed or modified, and [`DriftEngine`] accumulates
//!   the records so they can be summarized.
//! - [`compare`]: both sides are [normalized](normalize) first, so `"80"`
//!   equals `80` and list order is ignored. Differences are not classified.
//!
//! Nothing in this crate touches infrastructure. Fetching state and acting on
//! the results is up to the caller.

pub mod compare;
pub mod engine;
pub mod normalize;
pub mod patch;
pub mod state;
pub mod value;

pub use compare::{Comparator, FieldDifference};
pub use engine::{detect_drift, DriftEngine, DriftKind, DriftRecord, DriftSummary, DriftTarget};
pub use normalize::Normalizer;
pub use state::StateDocument;
pub use value::{StateTree, Value};
