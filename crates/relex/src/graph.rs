//! The mutable automaton graph shared by every build stage.
//!
//! States live in an arena owned by the [`Graph`] value, so state identity is
//! scoped to one build session and never leaks across concurrent builds.
//! Transitions are edge records registered on both endpoints; a non-loop edge
//! always appears in exactly two per-state lists.

use std::{borrow::Cow, fmt};

use hashbrown::{HashMap, HashSet};

use crate::{alphabet::Alphabet, config::RuleId};

mod determinize;
mod simplify;

pub use determinize::DeterminizationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(u32);

impl StateId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize { self.0 as usize }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(u32);

impl EdgeId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize { self.0 as usize }
}

/// The symbol consumed by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Input {
    /// Always traversable, consumes nothing.
    Epsilon,
    /// Matches exactly one specific character.
    Char(char),
    /// Matches any single remaining character.
    Any,
}

impl Input {
    #[inline]
    #[must_use]
    pub fn is_epsilon(self) -> bool { matches!(self, Self::Epsilon) }

    #[must_use]
    pub fn label(self) -> Cow<'static, str> {
        match self {
            Self::Epsilon => "ϵ".into(),
            Self::Any => "any".into(),
            Self::Char(c) => format!("'{}'", c.escape_default()).into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: StateId,
    pub input: Input,
    pub to: StateId,
}

impl Edge {
    #[inline]
    #[must_use]
    pub fn is_loop(self) -> bool { self.from == self.to }
}

#[derive(Debug, Default)]
struct StateData {
    label: Option<String>,
    accepting: bool,
    rule: Option<RuleId>,
    edges: Vec<EdgeId>,
}

#[derive(Debug, Default)]
pub struct Graph {
    states: Vec<StateData>,
    edges: Vec<Option<Edge>>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn len(&self) -> usize { self.states.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.states.is_empty() }

    pub fn add_state(&mut self) -> StateId {
        let id = StateId(u32::try_from(self.states.len()).unwrap_or_else(|_| unreachable!()));
        self.states.push(StateData::default());
        id
    }

    pub fn add_labeled(&mut self, label: impl Into<String>) -> StateId {
        let id = self.add_state();
        self.states[id.index()].label = Some(label.into());
        id
    }

    pub fn set_label(&mut self, id: StateId, label: impl Into<String>) {
        self.states[id.index()].label = Some(label.into());
    }

    #[must_use]
    pub fn label(&self, id: StateId) -> Option<&str> { self.states[id.index()].label.as_deref() }

    #[must_use]
    pub fn is_accepting(&self, id: StateId) -> bool { self.states[id.index()].accepting }

    pub fn set_accepting(&mut self, id: StateId, accepting: bool) {
        self.states[id.index()].accepting = accepting;
    }

    #[must_use]
    pub fn rule(&self, id: StateId) -> Option<RuleId> { self.states[id.index()].rule }

    pub fn set_rule(&mut self, id: StateId, rule: RuleId) {
        self.states[id.index()].rule = Some(rule);
    }

    /// Adds a transition, registering it on both endpoints (once for a
    /// self-loop). Adding an edge that already exists is a no-op returning
    /// the existing id.
    pub fn connect(&mut self, from: StateId, input: Input, to: StateId) -> EdgeId {
        if let Some((id, _)) = self
            .outgoing(from)
            .find(|&(_, e)| e.input == input && e.to == to)
        {
            return id;
        }

        let id = EdgeId(u32::try_from(self.edges.len()).unwrap_or_else(|_| unreachable!()));
        self.edges.push(Some(Edge { from, input, to }));
        self.states[from.index()].edges.push(id);
        if from != to {
            self.states[to.index()].edges.push(id);
        }
        id
    }

    /// Removes a transition from the arena and from both endpoint lists.
    pub fn disconnect(&mut self, id: EdgeId) {
        let Some(edge) = self.edges[id.index()].take() else {
            return;
        };
        self.states[edge.from.index()].edges.retain(|&e| e != id);
        if !edge.is_loop() {
            self.states[edge.to.index()].edges.retain(|&e| e != id);
        }
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<Edge> { self.edges[id.index()] }

    /// Every transition registered on a state, incoming and outgoing.
    pub fn edges_at(&self, id: StateId) -> impl Iterator<Item = (EdgeId, Edge)> + '_ {
        self.states[id.index()]
            .edges
            .iter()
            .filter_map(move |&e| self.edges[e.index()].map(|edge| (e, edge)))
    }

    pub fn outgoing(&self, id: StateId) -> impl Iterator<Item = (EdgeId, Edge)> + '_ {
        self.edges_at(id).filter(move |&(_, e)| e.from == id)
    }

    pub fn incoming(&self, id: StateId) -> impl Iterator<Item = (EdgeId, Edge)> + '_ {
        self.edges_at(id).filter(move |&(_, e)| e.to == id)
    }

    #[must_use]
    pub fn outgoing_count(&self, id: StateId) -> usize { self.outgoing(id).count() }

    #[must_use]
    pub fn incoming_count(&self, id: StateId) -> usize { self.incoming(id).count() }

    /// States reachable from `start`, in depth-first preorder following edge
    /// registration order.
    #[must_use]
    pub fn reachable(&self, start: StateId) -> Vec<StateId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![start];

        while let Some(state) = stack.pop() {
            if !seen.insert(state) {
                continue;
            }
            order.push(state);

            let mut next: Vec<StateId> = self.outgoing(state).map(|(_, e)| e.to).collect();
            next.reverse();
            stack.extend(next);
        }

        order
    }

    /// A state is terminal when it is accepting, has no outgoing transitions,
    /// or all of its outgoing transitions loop back to itself.
    #[must_use]
    pub fn is_terminal(&self, id: StateId) -> bool {
        self.is_accepting(id) || self.outgoing(id).all(|(_, e)| e.to == id)
    }

    #[must_use]
    pub fn alphabet(&self, start: StateId) -> Alphabet {
        let mut alphabet = Alphabet::default();
        for state in self.reachable(start) {
            for (_, edge) in self.outgoing(state) {
                match edge.input {
                    Input::Char(c) => alphabet.add(c),
                    Input::Any => alphabet.add_any(),
                    Input::Epsilon => (),
                }
            }
        }
        alphabet
    }

    pub(crate) fn state_is_deterministic(&self, id: StateId) -> bool {
        let mut seen = HashSet::new();
        let mut got_any = false;
        for (_, edge) in self.outgoing(id) {
            match edge.input {
                Input::Epsilon => return false,
                Input::Any => {
                    if got_any {
                        return false;
                    }
                    got_any = true;
                },
                Input::Char(c) => {
                    if !seen.insert(c) {
                        return false;
                    }
                },
            }
        }
        true
    }

    /// True when no reachable state has epsilon transitions, duplicate
    /// literal transitions, or more than one wildcard transition.
    #[must_use]
    pub fn is_dfa(&self, start: StateId) -> bool {
        self.reachable(start)
            .into_iter()
            .all(|s| self.state_is_deterministic(s))
    }

    /// Deep-copies the sub-graph reachable from `entry` into this arena and
    /// returns the copy's entry and exit. Multiple terminal states in the
    /// copy are unified behind a fresh state joined by epsilon edges.
    pub fn copy_subgraph(&mut self, entry: StateId) -> (StateId, StateId) {
        let sources = self.reachable(entry);

        let mut copies = HashMap::with_capacity(sources.len());
        for &source in &sources {
            let copy = self.add_state();
            let src = &self.states[source.index()];
            let (label, accepting, rule) = (src.label.clone(), src.accepting, src.rule);
            let dst = &mut self.states[copy.index()];
            dst.label = label;
            dst.accepting = accepting;
            dst.rule = rule;
            copies.insert(source, copy);
        }

        for &source in &sources {
            let outgoing: Vec<Edge> = self.outgoing(source).map(|(_, e)| e).collect();
            for edge in outgoing {
                self.connect(copies[&source], edge.input, copies[&edge.to]);
            }
        }

        let entry_copy = copies[&entry];
        let exits: Vec<StateId> = sources
            .iter()
            .map(|s| copies[s])
            .filter(|&c| self.is_terminal(c))
            .collect();

        match exits.as_slice() {
            [] => (entry_copy, entry_copy),
            &[exit] => (entry_copy, exit),
            many => {
                let unified = self.add_state();
                for &exit in many {
                    self.connect(exit, Input::Epsilon, unified);
                }
                (entry_copy, unified)
            },
        }
    }

    /// Brute-force backtracking simulation: accepts iff the whole input can
    /// be consumed ending in a terminal state. Works on NFAs and DFAs alike
    /// and serves as the reference engine for the deterministic pipeline.
    #[must_use]
    pub fn matches(&self, start: StateId, input: &str) -> bool {
        let chars: Vec<char> = input.chars().collect();
        let mut seen = HashSet::new();
        self.matches_at(start, &chars, 0, &mut seen)
    }

    fn matches_at(
        &self,
        state: StateId,
        input: &[char],
        offset: usize,
        seen: &mut HashSet<(StateId, usize)>,
    ) -> bool {
        if !seen.insert((state, offset)) {
            return false;
        }

        if offset == input.len() && self.is_terminal(state) {
            return true;
        }

        for (_, edge) in self.outgoing(state) {
            let hit = match edge.input {
                Input::Epsilon => self.matches_at(edge.to, input, offset, seen),
                Input::Char(c) => {
                    input.get(offset) == Some(&c)
                        && self.matches_at(edge.to, input, offset + 1, seen)
                },
                Input::Any => {
                    offset < input.len() && self.matches_at(edge.to, input, offset + 1, seen)
                },
            };
            if hit {
                return true;
            }
        }

        false
    }

    /// Collapses redundant epsilon chains in place; repeated calls are
    /// no-ops.
    pub fn simplify(&mut self, start: StateId) { simplify::run(self, start); }

    /// Subset-construction determinization; see [`determinize`](self).
    ///
    /// # Errors
    /// Returns [`DeterminizationError`] when the constructed graph fails the
    /// determinism post-condition, which indicates an internal bug.
    pub fn determinize<R, O>(
        &self,
        start: StateId,
        resolver: R,
        observer: O,
    ) -> Result<(Graph, StateId), DeterminizationError>
    where
        R: FnMut(&std::collections::BTreeSet<RuleId>) -> RuleId,
        O: FnMut(&Graph, StateId),
    {
        determinize::run(self, start, resolver, observer)
    }

    #[must_use]
    pub fn debug_info(&self, start: StateId) -> String {
        let states = self.reachable(start);
        let transitions: usize = states.iter().map(|&s| self.outgoing_count(s)).sum();
        format!("{} states, {} transitions", states.len(), transitions)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn non_loop_edges_register_on_both_endpoints() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        let b = graph.add_state();
        let id = graph.connect(a, Input::Char('x'), b);

        assert_eq!(graph.edges_at(a).count(), 1);
        assert_eq!(graph.edges_at(b).count(), 1);
        assert_eq!(graph.outgoing_count(a), 1);
        assert_eq!(graph.incoming_count(b), 1);
        assert_eq!(graph.outgoing_count(b), 0);
        assert_eq!(graph.edge(id), Some(Edge {
            from: a,
            input: Input::Char('x'),
            to: b
        }));
    }

    #[test]
    fn self_loops_register_once() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        graph.connect(a, Input::Char('x'), a);

        assert_eq!(graph.edges_at(a).count(), 1);
        assert_eq!(graph.outgoing_count(a), 1);
        assert_eq!(graph.incoming_count(a), 1);
    }

    #[test]
    fn connect_is_idempotent() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        let b = graph.add_state();
        let first = graph.connect(a, Input::Epsilon, b);
        let second = graph.connect(a, Input::Epsilon, b);

        assert_eq!(first, second);
        assert_eq!(graph.outgoing_count(a), 1);
    }

    #[test]
    fn disconnect_removes_both_registrations() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        let b = graph.add_state();
        let id = graph.connect(a, Input::Char('x'), b);
        graph.disconnect(id);

        assert_eq!(graph.edges_at(a).count(), 0);
        assert_eq!(graph.edges_at(b).count(), 0);
        assert_eq!(graph.edge(id), None);
    }

    #[test]
    fn terminality() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        let b = graph.add_state();
        graph.connect(a, Input::Char('x'), b);

        assert!(!graph.is_terminal(a));
        assert!(graph.is_terminal(b));

        graph.set_accepting(a, true);
        assert!(graph.is_terminal(a));

        let c = graph.add_state();
        graph.connect(c, Input::Char('y'), c);
        assert!(graph.is_terminal(c));
    }

    #[test]
    fn alphabet_derivation_ignores_epsilon() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        let b = graph.add_state();
        let c = graph.add_state();
        graph.connect(a, Input::Char('q'), b);
        graph.connect(b, Input::Epsilon, c);
        graph.connect(c, Input::Any, c);

        let alphabet = graph.alphabet(a);
        assert_eq!(alphabet.chars().collect::<Vec<_>>(), vec!['q']);
        assert!(alphabet.contains_any());
    }

    #[test]
    fn copy_subgraph_is_disjoint() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        let b = graph.add_state();
        let c = graph.add_state();
        graph.connect(a, Input::Char('x'), b);
        graph.connect(b, Input::Char('y'), c);

        let before = graph.len();
        let (entry, exit) = graph.copy_subgraph(a);

        assert!(entry.index() >= before);
        assert!(exit.index() >= before);
        assert!(graph.matches(entry, "xy"));
        assert!(!graph.matches(entry, "x"));
        assert!(graph.matches(a, "xy"));
    }

    #[test]
    fn matcher_terminates_on_epsilon_cycles() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        let b = graph.add_state();
        graph.connect(a, Input::Epsilon, b);
        graph.connect(b, Input::Epsilon, a);

        // no terminal state anywhere, so nothing is accepted; the point is
        // that the epsilon cycle terminates instead of recursing forever
        assert!(!graph.matches(a, ""));
        assert!(!graph.matches(a, "x"));

        graph.set_accepting(b, true);
        assert!(graph.matches(a, ""));
    }

    #[test]
    fn debug_info_counts_reachable_only() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        let b = graph.add_state();
        let _orphan = graph.add_state();
        graph.connect(a, Input::Char('x'), b);

        assert_eq!(graph.debug_info(a), "2 states, 1 transitions");
    }
}
