//! Flattening a determinized graph into the immutable [`LexerTable`]
//! artifact.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::{ConfigurationError, RuleId},
    graph::{Graph, Input, StateId},
};

/// Cell value: no transition exists for this exact column.
pub const NO_MATCH: i32 = -1;
/// Cell value: the walk has moved past the end of any recognizable token.
pub const END_OF_TOKEN: i32 = -2;

/// The flat, immutable output of the build pipeline.
///
/// `transitions` is row-major with `state_count` rows of `alphabet_size`
/// columns; non-negative cells hold the destination *row offset*
/// (`state index × alphabet_size`). Column 0 is the wildcard column;
/// characters missing from `columns` map to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexerTable {
    alphabet_size: usize,
    initial_offset: usize,
    transitions: Vec<i32>,
    token_types: Vec<Option<String>>,
    columns: BTreeMap<char, usize>,
}

impl LexerTable {
    #[inline]
    #[must_use]
    pub fn alphabet_size(&self) -> usize { self.alphabet_size }

    #[inline]
    #[must_use]
    pub fn initial_offset(&self) -> usize { self.initial_offset }

    #[inline]
    #[must_use]
    pub fn state_count(&self) -> usize { self.token_types.len() }

    #[must_use]
    pub fn column(&self, c: char) -> usize { self.columns.get(&c).copied().unwrap_or(0) }

    #[must_use]
    pub fn columns(&self) -> &BTreeMap<char, usize> { &self.columns }

    #[must_use]
    pub fn transitions(&self) -> &[i32] { &self.transitions }

    #[must_use]
    pub fn cell(&self, state_offset: usize, column: usize) -> i32 {
        self.transitions[state_offset + column]
    }

    /// Token type of the state at `state_offset`, if it is accepting.
    #[must_use]
    pub fn token_type_at(&self, state_offset: usize) -> Option<&str> {
        self.token_types[state_offset / self.alphabet_size].as_deref()
    }

    #[must_use]
    pub fn token_types(&self) -> &[Option<String>] { &self.token_types }
}

/// Compiles a determinized graph into a [`LexerTable`], resolving each
/// winning rule to its token type through `token_of`.
///
/// # Errors
/// Returns [`ConfigurationError`] when the graph has no states, lacks a
/// unique entry state, carries no rules at all, has more than one rule-less
/// terminal state, or turns out not to be deterministic.
pub fn compile<F>(
    dfa: &Graph,
    start: StateId,
    mut token_of: F,
) -> Result<LexerTable, ConfigurationError>
where
    F: FnMut(RuleId) -> String,
{
    if dfa.is_empty() {
        return Err(ConfigurationError::EmptyGraph);
    }

    let states = dfa.reachable(start);
    let alphabet = dfa.alphabet(start);
    let columns = alphabet.columns();

    // renumber densely in traversal order
    let mut index: HashMap<StateId, usize> = HashMap::with_capacity(states.len());
    for (i, &state) in states.iter().enumerate() {
        if state.index() != i {
            debug!("re-assigning state {state} -> {i}");
        }
        index.insert(state, i);
    }

    let entries: Vec<StateId> = states
        .iter()
        .copied()
        .filter(|&s| dfa.incoming_count(s) == 0)
        .collect();
    let initial = match entries.as_slice() {
        [] => return Err(ConfigurationError::NoEntryState),
        &[entry] => entry,
        many => {
            return Err(ConfigurationError::MultipleEntryStates { count: many.len() });
        },
    };

    // a single rule-less terminal state is the trap minted for empty move
    // sets; transitions into it become the end-of-token sentinel
    let mut trap = None;
    let mut any_rule = false;
    for &state in &states {
        if dfa.rule(state).is_some() {
            any_rule = true;
        }
        if dfa.is_terminal(state) && dfa.rule(state).is_none() {
            if trap.is_some() {
                return Err(ConfigurationError::UnassignedTerminal { state });
            }
            trap = Some(state);
        }
    }
    if !any_rule {
        return Err(ConfigurationError::NoRules);
    }

    let offset_of = |state: StateId| index[&state] * columns;

    let mut transitions = vec![NO_MATCH; states.len() * columns];
    for &state in &states {
        let row = offset_of(state);
        for (_, edge) in dfa.outgoing(state) {
            let column = match edge.input {
                Input::Epsilon => {
                    return Err(ConfigurationError::NotDeterministic { state });
                },
                Input::Any => 0,
                Input::Char(c) => alphabet
                    .column_of(c)
                    .unwrap_or_else(|| unreachable!("character outside the derived alphabet")),
            };
            if transitions[row + column] != NO_MATCH {
                return Err(ConfigurationError::NotDeterministic { state });
            }
            transitions[row + column] = if Some(edge.to) == trap {
                END_OF_TOKEN
            } else {
                i32::try_from(offset_of(edge.to))
                    .unwrap_or_else(|_| unreachable!("table offset overflows i32"))
            };
        }
    }

    let token_types = states
        .iter()
        .map(|&s| {
            if dfa.is_terminal(s) {
                dfa.rule(s).map(&mut token_of)
            } else {
                None
            }
        })
        .collect();

    Ok(LexerTable {
        alphabet_size: columns,
        initial_offset: offset_of(initial),
        transitions,
        token_types,
        columns: alphabet.chars().enumerate().map(|(i, c)| (c, i + 1)).collect(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::Configuration, graph::Graph};

    fn number_ident() -> LexerTable {
        Configuration::parse_str("number=[0-9]+\nident=[a-z]+\n", false)
            .unwrap()
            .compile()
            .unwrap()
    }

    #[test]
    fn compiles_number_and_ident_rules() {
        let table = number_ident();

        // 10 digits + 26 letters + the wildcard column
        assert_eq!(table.alphabet_size(), 37);
        assert_eq!(table.column('0'), 1);
        assert_eq!(table.column('9'), 10);
        assert_eq!(table.column('a'), 11);
        assert_eq!(table.column('z'), 36);
        assert_eq!(table.column('!'), 0);

        assert_eq!(
            table.transitions().len(),
            table.state_count() * table.alphabet_size()
        );
        assert_eq!(table.initial_offset() % table.alphabet_size(), 0);
        assert!(table.transitions().contains(&END_OF_TOKEN));
        assert!(
            table
                .token_types()
                .iter()
                .flatten()
                .any(|t| t == "number")
        );
        assert!(table.token_types().iter().flatten().any(|t| t == "ident"));
    }

    #[test]
    fn start_row_has_no_accepting_type() {
        let table = number_ident();
        assert_eq!(table.token_type_at(table.initial_offset()), None);
    }

    #[test]
    fn rejects_graphs_without_rules() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        let b = graph.add_state();
        graph.connect(a, crate::graph::Input::Char('x'), b);

        assert_eq!(
            compile(&graph, a, |_| unreachable!()),
            Err(ConfigurationError::NoRules)
        );
    }

    #[test]
    fn rejects_graphs_without_an_entry_state() {
        let mut graph = Graph::new();
        let a = graph.add_state();
        graph.connect(a, crate::graph::Input::Char('x'), a);

        assert_eq!(
            compile(&graph, a, |_| unreachable!()),
            Err(ConfigurationError::NoEntryState)
        );
    }

    #[test]
    fn rejects_second_unassigned_terminal() {
        let mut graph = Graph::new();
        let root = graph.add_state();
        let a = graph.add_state();
        let b = graph.add_state();
        graph.connect(root, crate::graph::Input::Char('a'), a);
        graph.connect(root, crate::graph::Input::Char('b'), b);

        assert!(matches!(
            compile(&graph, root, |_| unreachable!()),
            Err(ConfigurationError::UnassignedTerminal { .. })
        ));
    }

    #[test]
    fn serializes_and_deserializes() {
        let table = number_ident();
        let json = serde_json::to_string(&table).unwrap();
        let back: LexerTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
