//! [`Automaton`]: a state machine over one owned transition graph.

use std::{borrow::Cow, collections::BTreeSet};

use crate::{
    alphabet::Alphabet,
    config::RuleId,
    dot,
    graph::{DeterminizationError, Graph, StateId},
    pattern::{self, ParseError},
};

#[derive(Debug)]
pub struct Automaton {
    graph: Graph,
    start: StateId,
}

impl Automaton {
    /// Compiles a single pattern into a fresh automaton.
    ///
    /// # Errors
    /// Returns [`ParseError`] when the pattern is malformed.
    pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Self, ParseError> {
        let mut graph = Graph::new();
        let fragment = pattern::parse(&mut graph, pattern, case_insensitive)?;
        Ok(Self {
            graph,
            start: fragment.entry,
        })
    }

    #[must_use]
    pub fn from_parts(graph: Graph, start: StateId) -> Self { Self { graph, start } }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Graph { &self.graph }

    #[inline]
    #[must_use]
    pub fn start(&self) -> StateId { self.start }

    #[must_use]
    pub fn matches(&self, input: &str) -> bool { self.graph.matches(self.start, input) }

    pub fn simplify(&mut self) { self.graph.simplify(self.start); }

    #[must_use]
    pub fn is_deterministic(&self) -> bool { self.graph.is_dfa(self.start) }

    #[must_use]
    pub fn alphabet(&self) -> Alphabet { self.graph.alphabet(self.start) }

    #[must_use]
    pub fn debug_info(&self) -> String { self.graph.debug_info(self.start) }

    /// Subset-construction determinization into a fresh automaton.
    ///
    /// # Errors
    /// Returns [`DeterminizationError`] when the result violates the
    /// determinism post-condition.
    pub fn determinize<R>(&self, resolver: R) -> Result<Self, DeterminizationError>
    where R: FnMut(&BTreeSet<RuleId>) -> RuleId {
        self.determinize_with(resolver, |_, _| ())
    }

    /// Like [`determinize`](Self::determinize), additionally invoking
    /// `observer` with the in-progress graph after each worklist step.
    ///
    /// # Errors
    /// Returns [`DeterminizationError`] when the result violates the
    /// determinism post-condition.
    pub fn determinize_with<R, O>(
        &self,
        resolver: R,
        observer: O,
    ) -> Result<Self, DeterminizationError>
    where
        R: FnMut(&BTreeSet<RuleId>) -> RuleId,
        O: FnMut(&Graph, StateId),
    {
        let (graph, start) = self.graph.determinize(self.start, resolver, observer)?;
        Ok(Self { graph, start })
    }

    /// Renders the reachable graph as a Graphviz document, naming rules by
    /// their index.
    #[must_use]
    pub fn dot(&self) -> dot::Graph<'_> {
        self.dot_with(|rule| format!("#{}", rule.index()).into())
    }

    /// Renders the reachable graph as a Graphviz document. Terminal states
    /// are labelled `END` with the winning rule in brackets; accepting states
    /// get a doubled border.
    pub fn dot_with<'a, F>(&'a self, fmt_rule: F) -> dot::Graph<'a>
    where F: Fn(RuleId) -> Cow<'a, str> {
        let mut out = dot::Graph::new();
        out.rankdir("LR");

        for state in self.graph.reachable(self.start) {
            let id = state.to_string();
            let terminal = self.graph.is_terminal(state);

            let node = out.node(id.clone());
            if terminal || self.graph.label(state).is_some() {
                let mut label = match self.graph.label(state) {
                    Some(l) if terminal => format!("{l} (END)"),
                    Some(l) => l.to_owned(),
                    None => "END".to_owned(),
                };
                if terminal && let Some(rule) = self.graph.rule(state) {
                    label.push('[');
                    label.push_str(&fmt_rule(rule));
                    label.push(']');
                }
                node.label(label);
            }
            if self.graph.is_accepting(state) {
                node.border_count("2").color("blue");
            }

            for (_, edge) in self.graph.outgoing(state) {
                out.edge(id.clone(), edge.to.to_string())
                    .label(edge.input.label());
            }
        }

        let start_node = out.node("_start");
        start_node.style("invis").shape("point").label("");
        out.edge("_start", self.start.to_string());

        out
    }
}
