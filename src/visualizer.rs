use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;

use hashbrown::HashSet;

use crate::analysis::PointerAnalysisResult;
use crate::program::CallKind;

#[derive(Clone)]
pub struct Edge<N, W> {
    pub from: Node<N>,
    pub to: Node<N>,
    pub weight: W,
    pub kind: EdgeKind,
}

#[derive(Clone, Copy)]
pub enum EdgeKind {
    Flow,
    Call(CallKind),
}

#[derive(Clone)]
pub struct Node<N> {
    pub inner: N,
    pub id: usize,
}

impl<N> Node<N> {
    pub fn new(inner: N, id: usize) -> Self {
        Self { inner, id }
    }
}

impl<N: Display> Display for Node<N> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// Edge label that renders as nothing when absent.
#[derive(Clone, Default)]
pub struct Label(pub Option<String>);

impl Display for Label {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.0 {
            Some(label) => write!(f, "{label}"),
            None => Ok(()),
        }
    }
}

pub trait Graph {
    type Node: Display + Clone;
    type Weight: Display + Clone;

    /// Identifier of the rendered DOT graph.
    fn name(&self) -> &'static str;
    fn nodes(&self) -> Vec<Node<Self::Node>>;
    fn edges(&self) -> Vec<Edge<Self::Node, Self::Weight>>;
}

/// The pointer flow graph of a finished analysis. Only pointers with at least
/// one flow edge are drawn.
pub struct PointerFlowView<'r, 'p>(pub &'r PointerAnalysisResult<'p>);

impl<'r, 'p> Graph for PointerFlowView<'r, 'p> {
    type Node = String;
    type Weight = Label;

    fn name(&self) -> &'static str {
        "pointer_flow"
    }

    fn nodes(&self) -> Vec<Node<String>> {
        let mut seen = HashSet::new();
        self.0
            .pointer_flow_edges()
            .flat_map(|(s, t)| [s, t])
            .filter(|p| seen.insert(*p))
            .map(|p| Node::new(self.0.describe_pointer(p), p.index()))
            .collect()
    }

    fn edges(&self) -> Vec<Edge<String, Label>> {
        self.0
            .pointer_flow_edges()
            .map(|(s, t)| Edge {
                from: Node::new(self.0.describe_pointer(s), s.index()),
                to: Node::new(self.0.describe_pointer(t), t.index()),
                weight: Label::default(),
                kind: EdgeKind::Flow,
            })
            .collect()
    }
}

/// The context-sensitive call graph of a finished analysis, with edges
/// labelled by their call site.
pub struct CallGraphView<'r, 'p>(pub &'r PointerAnalysisResult<'p>);

impl<'r, 'p> Graph for CallGraphView<'r, 'p> {
    type Node = String;
    type Weight = Label;

    fn name(&self) -> &'static str {
        "call_graph"
    }

    fn nodes(&self) -> Vec<Node<String>> {
        self.0
            .cs_call_graph()
            .reachable_methods()
            .map(|m| Node::new(self.0.describe_cs_method(m), m.index()))
            .collect()
    }

    fn edges(&self) -> Vec<Edge<String, Label>> {
        let cg = self.0.cs_call_graph();
        cg.edges()
            .filter_map(|e| {
                let caller = cg.container_of(e.call_site)?;
                let call_site = self.0.describe_cs_call_site(e.call_site);
                Some(Edge {
                    from: Node::new(self.0.describe_cs_method(caller), caller.index()),
                    to: Node::new(self.0.describe_cs_method(e.callee), e.callee.index()),
                    weight: Label(Some(call_site)),
                    kind: EdgeKind::Call(e.kind),
                })
            })
            .collect()
    }
}

impl<'a, T, N, W> dot::Labeller<'a, Node<N>, Edge<N, W>> for (&T,)
where
    T: Graph<Node = N, Weight = W>,
    N: Display,
    W: Display,
{
    fn graph_id(&'a self) -> dot::Id<'a> {
        dot::Id::new(self.0.name()).unwrap()
    }

    fn node_id(&'a self, n: &Node<N>) -> dot::Id<'a> {
        dot::Id::new(format!("{}{}", &self.0.name()[..1], n.id)).unwrap()
    }

    fn node_label(&'a self, n: &Node<N>) -> dot::LabelText<'a> {
        dot::LabelText::label(n.inner.to_string())
    }

    fn edge_label(&'a self, e: &Edge<N, W>) -> dot::LabelText<'a> {
        dot::LabelText::label(e.weight.to_string())
    }

    fn edge_style(&'a self, e: &Edge<N, W>) -> dot::Style {
        match e.kind {
            EdgeKind::Flow | EdgeKind::Call(CallKind::Static | CallKind::Special) => {
                dot::Style::Solid
            }
            EdgeKind::Call(_) => dot::Style::Dashed,
        }
    }

    fn edge_color(&'a self, e: &Edge<N, W>) -> Option<dot::LabelText<'a>> {
        match e.kind {
            EdgeKind::Call(CallKind::Interface) => Some(dot::LabelText::label("blue")),
            EdgeKind::Call(CallKind::Static) => Some(dot::LabelText::label("green")),
            _ => None,
        }
    }
}

impl<'a, T, N, W> dot::GraphWalk<'a, Node<N>, Edge<N, W>> for (&T,)
where
    T: Graph<Node = N, Weight = W>,
    N: Clone,
    W: Clone,
{
    fn nodes(&'a self) -> dot::Nodes<'a, Node<N>> {
        Graph::nodes(self.0).into()
    }

    fn edges(&'a self) -> dot::Edges<'a, Edge<N, W>> {
        Graph::edges(self.0).into()
    }

    fn source(&'a self, edge: &Edge<N, W>) -> Node<N> {
        edge.from.clone()
    }

    fn target(&'a self, edge: &Edge<N, W>) -> Node<N> {
        edge.to.clone()
    }
}

pub fn visualize(graph: &impl Graph, path: &str) -> io::Result<()> {
    let mut buf = vec![];
    dot::render(&(graph,), &mut buf)?;
    let out = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    // Merge attribute lists, some viewers only read the first one.
    fs::write(path, out.replace("][", " "))
}
