//! Orchestration graph: state, routing, execution and synthesis

pub mod executor;
pub mod router;
pub mod state;
pub mod synthesizer;

pub use executor::GraphExecutor;
pub use router::{plan_fan_out, route, NextStep};
pub use state::OrchestrationState;
pub use synthesizer::{rank_findings, render_report, ReportPhraser, Synthesizer};
