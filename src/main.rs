use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use clap::Parser;
use itertools::Itertools;
use log::error;

use cs_pointer_analysis::analysis::{Config, PointerAnalysisResult, PointsToAnalysis};
use cs_pointer_analysis::call_graph::CallGraph;
use cs_pointer_analysis::cha::ChaBuilder;
use cs_pointer_analysis::cli::Args;
use cs_pointer_analysis::program::{InvokeId, MethodId, Program, VarId};
use cs_pointer_analysis::solver::context::SelectorKind;
use cs_pointer_analysis::visualizer::{visualize, CallGraphView, PointerFlowView};

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = stderrlog::new()
        .module(module_path!())
        .module("cs_pointer_analysis")
        .quiet(args.quiet)
        .verbosity(args.verbose as usize + 1)
        .init()
    {
        eprintln!("Could not set up logging: {e}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let file = File::open(&args.file_path)?;
    let program = Program::from_reader(BufReader::new(file))?;

    if args.cha {
        print_call_graph(&program, &ChaBuilder::build(&program));
        return Ok(());
    }

    let selector = SelectorKind::from(args.selector).selector(args.k);
    let config = Config {
        work_order: args.order.into(),
        max_iterations: args.max_iterations,
        heap_model: args.heap.into(),
    };
    let result = PointsToAnalysis::run(&program, selector.as_ref(), &config)?;

    if !args.dont_output {
        print!("{result}");
    }
    for query in &args.points_to {
        let var = parse_var(&program, query)?;
        let objs = result
            .points_to(var)
            .into_iter()
            .sorted()
            .map(|o| result.describe_obj(o))
            .join(", ");
        println!("{query} -> {{{objs}}}");
    }
    for (a, b) in args.may_alias.iter().tuples() {
        let alias = result.may_alias(parse_var(&program, a)?, parse_var(&program, b)?);
        println!("{a} {} {b}", if alias { "may alias" } else { "does not alias" });
    }
    if args.call_graph {
        print_call_graph(&program, result.call_graph());
        print_unreachable(&result);
    }
    if args.stats {
        println!("{}", result.stats());
    }

    if let Some(path) = &args.visualize {
        visualize(&PointerFlowView(&result), path)?;
    }
    if let Some(path) = &args.visualize_call_graph {
        visualize(&CallGraphView(&result), path)?;
    }
    Ok(())
}

/// Resolves `var@Class.method(..)`.
fn parse_var(program: &Program, query: &str) -> Result<VarId, Box<dyn Error>> {
    let (name, method) = query
        .split_once('@')
        .ok_or_else(|| format!("Malformed variable '{query}', expected 'var@Class.method()'"))?;
    program
        .lookup_var(method, name)
        .ok_or_else(|| format!("Unknown variable '{query}'").into())
}

fn print_call_graph(program: &Program, call_graph: &CallGraph<InvokeId, MethodId>) {
    let edges = call_graph
        .edges()
        .map(|e| {
            (
                program.invoke_signature(e.call_site),
                program.method_signature(e.callee),
                e.kind.to_string(),
            )
        })
        .sorted();
    for (call_site, callee, kind) in edges {
        println!("{call_site} --{kind}--> {callee}");
    }
}

fn print_unreachable(result: &PointerAnalysisResult) {
    let program = result.program();
    for method in result.unreachable_methods() {
        println!("unreachable: {}", program.method_signature(method));
    }
}
