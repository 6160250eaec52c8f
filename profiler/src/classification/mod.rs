//! Classification of a finished session
//!
//! [`ClassificationOrchestrator`] owns the lookup and generation order,
//! [`QualityGate`] decides whether classifier output is usable and
//! [`heuristic_classification`] builds the deterministic fallback.

pub mod fallback;
pub mod orchestrator;
pub mod quality;

pub use fallback::{heuristic_classification, keywords};
pub use orchestrator::ClassificationOrchestrator;
pub use quality::{QualityGate, QualityIssue};
