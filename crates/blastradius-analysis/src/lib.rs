//! Analysis layer: baseline bookkeeping, change detection, impact
//! propagation, severity classification, and per-line partitioning, tied
//! together by [`AnalysisEngine`].

pub mod baseline;
pub mod diff;
pub mod partition;
pub mod pipeline;
pub mod propagate;
pub mod severity;

pub use baseline::{content_hash, InMemoryBaselineStore};
pub use diff::detect;
pub use partition::partition;
pub use pipeline::AnalysisEngine;
pub use propagate::{deletion_impact, forward_reachable, propagate_lines, reverse_reachable};
pub use severity::{classify, classify_graph};
