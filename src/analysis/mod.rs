use crate::error::AnalysisError;
use crate::program::Program;
use crate::solver::context::ContextSelector;
use crate::solver::heap::{HeapModel, HeapModelKind};
use crate::solver::worklist::WorkOrder;
use crate::solver::Solver;

mod result;

pub use result::PointerAnalysisResult;

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub work_order: WorkOrder,
    /// Upper bound on processed work items. Exceeding it aborts the whole
    /// analysis.
    pub max_iterations: Option<u64>,
    pub heap_model: HeapModelKind,
}

pub struct PointsToAnalysis;

impl PointsToAnalysis {
    /// Runs the points-to analysis on `program`, starting from its entry
    /// method, with the context sensitivity of `selector`.
    pub fn run<'p, S>(
        program: &'p Program,
        selector: &S,
        config: &Config,
    ) -> Result<PointerAnalysisResult<'p>, AnalysisError>
    where
        S: ContextSelector + ?Sized,
    {
        let heap_model = config.heap_model.model();
        Self::run_with_heap(program, selector, heap_model.as_ref(), config)
    }

    /// Like [`PointsToAnalysis::run`], with a caller-provided heap model in
    /// place of `config.heap_model`.
    pub fn run_with_heap<'p, S, H>(
        program: &'p Program,
        selector: &S,
        heap_model: &H,
        config: &Config,
    ) -> Result<PointerAnalysisResult<'p>, AnalysisError>
    where
        S: ContextSelector + ?Sized,
        H: HeapModel + ?Sized,
    {
        let solution = Solver::new(program, selector, heap_model)
            .with_work_order(config.work_order)
            .with_max_iterations(config.max_iterations)
            .solve()?;
        Ok(PointerAnalysisResult::new(program, solution))
    }
}
