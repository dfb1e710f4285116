//! Context-sensitive points-to analysis for object-oriented programs, with
//! the call graph built on the fly from the discovered receiver objects.

pub mod analysis;
pub mod call_graph;
pub mod cha;
pub mod cli;
pub mod error;
mod macros;
pub mod program;
pub mod solver;
pub mod visualizer;

pub use analysis::{Config, PointerAnalysisResult, PointsToAnalysis};
pub use error::{AnalysisError, ProgramError};
