use std::fmt::Display;

use clap::{ArgAction, Parser, ValueEnum};

use crate::solver::context::SelectorKind;
use crate::solver::heap::HeapModelKind;
use crate::solver::worklist::WorkOrder;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON description of the program
    pub file_path: String,
    /// Context sensitivity of the analysis
    #[arg(short, long, default_value_t = Selector::Insensitive)]
    pub selector: Selector,
    /// Context length for context-sensitive selectors (heap contexts use k - 1)
    #[arg(short, default_value_t = 1)]
    pub k: usize,
    /// Abstraction of heap objects
    #[arg(long, default_value_t = Heap::AllocationSite)]
    pub heap: Heap,
    /// Order in which pending points-to sets are processed
    #[arg(short, long, default_value_t = Order::Fifo)]
    pub order: Order,
    /// Abort the analysis after this many work items
    #[arg(long)]
    pub max_iterations: Option<u64>,
    /// Variables to print the points-to set of, written as `var@Class.method(..)`
    #[arg(long)]
    pub points_to: Vec<String>,
    /// Pairs of variables to check for aliasing
    #[arg(long, num_args = 2, value_names = ["VAR", "VAR"])]
    pub may_alias: Vec<String>,
    /// Don't print the points-to sets of all variables
    #[arg(short = 'O', long, default_value_t = false)]
    pub dont_output: bool,
    /// Print the call graph
    #[arg(short = 'C', long, default_value_t = false)]
    pub call_graph: bool,
    /// Print analysis statistics
    #[arg(long, default_value_t = false)]
    pub stats: bool,
    /// Only build the class hierarchy call graph and print it
    #[arg(long, default_value_t = false)]
    pub cha: bool,
    /// Visualize the pointer flow graph after solving (creates a Graphviz DOT file at given path)
    #[arg(long)]
    pub visualize: Option<String>,
    /// Visualize the context-sensitive call graph (creates a Graphviz DOT file at given path)
    #[arg(long)]
    pub visualize_call_graph: Option<String>,
    /// Don't print warnings
    #[arg(short = 'q', long, default_value_t = false)]
    pub quiet: bool,
    /// Increase log verbosity (can be repeated)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Selector {
    /// One context for everything
    Insensitive,
    /// k-call-site sensitivity
    CallSite,
    /// k-object sensitivity
    Object,
    /// k-type sensitivity
    Type,
}

impl Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Insensitive => write!(f, "insensitive"),
            Selector::CallSite => write!(f, "call-site"),
            Selector::Object => write!(f, "object"),
            Selector::Type => write!(f, "type"),
        }
    }
}

impl From<Selector> for SelectorKind {
    fn from(value: Selector) -> Self {
        match value {
            Selector::Insensitive => SelectorKind::Insensitive,
            Selector::CallSite => SelectorKind::CallSite,
            Selector::Object => SelectorKind::Object,
            Selector::Type => SelectorKind::Type,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Heap {
    /// One object per allocation site
    AllocationSite,
    /// One object per allocated class
    Type,
}

impl Display for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Heap::AllocationSite => write!(f, "allocation-site"),
            Heap::Type => write!(f, "type"),
        }
    }
}

impl From<Heap> for HeapModelKind {
    fn from(value: Heap) -> Self {
        match value {
            Heap::AllocationSite => HeapModelKind::AllocationSite,
            Heap::Type => HeapModelKind::Type,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Order {
    Fifo,
    Lifo,
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Fifo => write!(f, "fifo"),
            Order::Lifo => write!(f, "lifo"),
        }
    }
}

impl From<Order> for WorkOrder {
    fn from(value: Order) -> Self {
        match value {
            Order::Fifo => WorkOrder::Fifo,
            Order::Lifo => WorkOrder::Lifo,
        }
    }
}
