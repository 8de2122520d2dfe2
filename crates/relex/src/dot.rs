//! A small in-memory model of a Graphviz digraph, rendered through
//! [`Display`].

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::{self, Display},
};

use indexmap::IndexMap;

macro_rules! attr {
    ($id:ident, $name:literal) => {
        pub fn $id<S: Into<Cow<'a, str>>>(&mut self, $id: S) -> &mut Self {
            self.attrs.insert($name, $id.into());
            self
        }
    };
}

#[derive(Debug, Default)]
pub struct Graph<'a> {
    attrs: BTreeMap<&'static str, Cow<'a, str>>,
    nodes: IndexMap<Cow<'a, str>, Node<'a>>,
    edges: Vec<(Cow<'a, str>, Cow<'a, str>, Edge<'a>)>,
}

impl<'a> Graph<'a> {
    attr!(rankdir, "rankdir");

    attr!(label, "label");

    #[must_use]
    #[inline]
    pub fn new() -> Self { Self::default() }

    /// Returns the node with the given id, creating it on first use.
    pub fn node<S: Into<Cow<'a, str>>>(&mut self, id: S) -> &mut Node<'a> {
        self.nodes.entry(id.into()).or_default()
    }

    /// Appends a new edge; parallel edges between the same endpoints are kept.
    pub fn edge<L: Into<Cow<'a, str>>, R: Into<Cow<'a, str>>>(
        &mut self,
        l: L,
        r: R,
    ) -> &mut Edge<'a> {
        let l = l.into();
        let r = r.into();
        self.node(l.clone());
        self.node(r.clone());
        self.edges.push((l, r, Edge::default()));
        let Some((.., edge)) = self.edges.last_mut() else {
            unreachable!()
        };
        edge
    }
}

fn write_attrs(f: &mut fmt::Formatter, attrs: &BTreeMap<&'static str, Cow<'_, str>>) -> fmt::Result {
    let mut any = false;
    for (key, val) in attrs {
        f.write_str(if any { "," } else { " [" })?;
        any = true;
        write!(f, "{key}={val:?}")?;
    }

    if any {
        f.write_str("]")?;
    }

    Ok(())
}

impl Display for Graph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("digraph {\n")?;

        for (key, val) in &self.attrs {
            writeln!(f, "{key}={val:?};")?;
        }

        for (id, Node { attrs }) in &self.nodes {
            write!(f, "{id:?}")?;
            write_attrs(f, attrs)?;
            f.write_str(";\n")?;
        }

        for (l, r, Edge { attrs }) in &self.edges {
            write!(f, "{l:?} -> {r:?}")?;
            write_attrs(f, attrs)?;
            f.write_str(";\n")?;
        }

        f.write_str("}")
    }
}

#[derive(Debug, Default)]
pub struct Node<'a> {
    attrs: BTreeMap<&'static str, Cow<'a, str>>,
}

impl<'a> Node<'a> {
    attr!(style, "style");

    attr!(shape, "shape");

    attr!(label, "label");

    attr!(color, "color");

    attr!(border_count, "peripheries");
}

#[derive(Debug, Default)]
pub struct Edge<'a> {
    attrs: BTreeMap<&'static str, Cow<'a, str>>,
}

impl<'a> Edge<'a> {
    attr!(style, "style");

    attr!(label, "label");

    attr!(color, "color");
}

#[cfg(test)]
mod test {
    use super::Graph;

    #[test]
    fn renders_nodes_edges_and_attrs() {
        let mut graph = Graph::new();
        graph.rankdir("LR");
        graph.node("0").label("start");
        graph.edge("0", "1").label("'a'");

        let rendered = graph.to_string();
        assert!(rendered.starts_with("digraph {\n"));
        assert!(rendered.contains("rankdir=\"LR\";"));
        assert!(rendered.contains("\"0\" [label=\"start\"];"));
        assert!(rendered.contains("\"0\" -> \"1\" [label=\"'a'\"];"));
        assert!(rendered.ends_with('}'));
    }

    #[test]
    fn keeps_parallel_edges() {
        let mut graph = Graph::new();
        graph.edge("a", "b").label("x");
        graph.edge("a", "b").label("y");

        let rendered = graph.to_string();
        assert!(rendered.contains("label=\"x\""));
        assert!(rendered.contains("label=\"y\""));
    }
}
