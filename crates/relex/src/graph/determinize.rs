//! Subset-construction determinization.

use std::collections::BTreeSet;

use hashbrown::HashMap;
use tracing::{debug, trace};

use super::{Graph, Input, StateId};
use crate::{
    alphabet::Symbol,
    config::RuleId,
};

/// The determinized graph failed its own post-condition; this is an internal
/// consistency bug, never a normal outcome of well-formed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("subset construction produced a non-deterministic graph at state {state}")]
pub struct DeterminizationError {
    pub state: StateId,
}

const STATE_NAMES: &[u8; 52] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn debug_name(idx: usize) -> String {
    let letter = char::from(STATE_NAMES[idx % STATE_NAMES.len()]);
    match idx / STATE_NAMES.len() {
        0 => letter.to_string(),
        n => format!("{letter}{n}"),
    }
}

/// States joining the closure while walking epsilon edges from `seed`. A
/// visited state is part of the closure when it has no incoming transitions
/// (graph entry points are implicitly reachable) or any epsilon incoming
/// transition.
fn closure_from(graph: &Graph, seed: StateId) -> BTreeSet<StateId> {
    let mut result = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut stack = vec![seed];

    while let Some(state) = stack.pop() {
        if !visited.insert(state) {
            continue;
        }

        if graph.incoming_count(state) == 0
            || graph.incoming(state).any(|(_, e)| e.input.is_epsilon())
        {
            result.insert(state);
        }

        stack.extend(
            graph
                .outgoing(state)
                .filter(|(_, e)| e.input.is_epsilon())
                .map(|(_, e)| e.to),
        );
    }

    result
}

fn closure_of(graph: &Graph, set: &BTreeSet<StateId>) -> BTreeSet<StateId> {
    let mut result = set.clone();
    for &state in set {
        result.extend(closure_from(graph, state));
    }
    result
}

fn apply_accept<R>(
    dfa: &mut Graph,
    state: StateId,
    nfa: &Graph,
    subset: &BTreeSet<StateId>,
    resolver: &mut R,
) where
    R: FnMut(&BTreeSet<RuleId>) -> RuleId,
{
    let mut accepting = false;
    let mut rules = BTreeSet::new();
    for &member in subset {
        if nfa.is_terminal(member) {
            accepting = true;
            if let Some(rule) = nfa.rule(member) {
                rules.insert(rule);
            }
        }
    }

    if accepting {
        dfa.set_accepting(state, true);
    }
    match rules.len() {
        0 => (),
        1 => dfa.set_rule(state, *rules.first().unwrap_or_else(|| unreachable!())),
        _ => {
            let winner = resolver(&rules);
            dfa.set_rule(state, winner);
        },
    }
}

pub(super) fn run<R, O>(
    nfa: &Graph,
    start: StateId,
    mut resolver: R,
    mut observer: O,
) -> Result<(Graph, StateId), DeterminizationError>
where
    R: FnMut(&BTreeSet<RuleId>) -> RuleId,
    O: FnMut(&Graph, StateId),
{
    let alphabet = nfa.alphabet(start);

    let mut dfa = Graph::new();
    let mut subsets: HashMap<BTreeSet<StateId>, StateId> = HashMap::new();
    let mut subset_of: Vec<BTreeSet<StateId>> = Vec::new();

    let seed = closure_from(nfa, start);
    let first = dfa.add_labeled(debug_name(0));
    debug!("state {first} becomes {}", debug_name(0));
    apply_accept(&mut dfa, first, nfa, &seed, &mut resolver);
    subsets.insert(seed.clone(), first);
    subset_of.push(seed);

    let mut worklist = vec![first];
    while let Some(current) = worklist.pop() {
        trace!(
            "processing {current} {:?}, {} pending",
            subset_of[current.index()],
            worklist.len()
        );
        let members = subset_of[current.index()].clone();

        for symbol in alphabet.symbols() {
            let mut move_set = BTreeSet::new();
            for &member in &members {
                for (_, edge) in nfa.outgoing(member) {
                    let hit = match symbol {
                        Symbol::Any => edge.input == Input::Any,
                        Symbol::Char(c) => edge.input == Input::Char(c),
                    };
                    if hit {
                        move_set.insert(edge.to);
                    }
                }
            }

            let closure = closure_of(nfa, &move_set);
            trace!("move set for {symbol:?}: {move_set:?}, closure {closure:?}");

            let input = match symbol {
                Symbol::Any => Input::Any,
                Symbol::Char(c) => Input::Char(c),
            };

            if let Some(&existing) = subsets.get(&closure) {
                trace!("{current} loops to existing state {existing}");
                dfa.connect(current, input, existing);
                continue;
            }

            let minted = dfa.add_labeled(debug_name(subset_of.len()));
            debug!("state {minted} becomes {}", debug_name(subset_of.len()));
            apply_accept(&mut dfa, minted, nfa, &closure, &mut resolver);
            dfa.connect(current, input, minted);
            subsets.insert(closure.clone(), minted);
            subset_of.push(closure);
            worklist.push(minted);
        }

        observer(&dfa, current);
    }

    if let Some(state) = dfa
        .reachable(first)
        .into_iter()
        .find(|&s| !dfa.state_is_deterministic(s))
    {
        return Err(DeterminizationError { state });
    }

    Ok((dfa, first))
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::debug_name;
    use crate::{config::RuleId, machine::Automaton};

    fn first_declared(candidates: &BTreeSet<RuleId>) -> RuleId {
        *candidates.first().unwrap()
    }

    fn determinize(pattern: &str) -> (Automaton, Automaton) {
        let nfa = Automaton::compile(pattern, false).unwrap();
        let dfa = nfa.determinize(first_declared).unwrap();
        (nfa, dfa)
    }

    #[test]
    fn produces_deterministic_graphs() {
        for pattern in ["a+|b|c", "(ab)*a", "[0-9]+", "a.c|abd", "(a|b)*abb"] {
            let (_, dfa) = determinize(pattern);
            assert!(dfa.is_deterministic(), "pattern {pattern:?}");
        }
    }

    #[test]
    fn preserves_language() {
        let inputs = ["", "a", "b", "c", "aa", "ab", "ba", "abc", "aab", "abd"];
        for pattern in ["a+|b|c", "(ab)*a", "a.c|abd", "a?b", "(a|b)+"] {
            let (nfa, dfa) = determinize(pattern);
            for input in inputs {
                assert_eq!(
                    nfa.matches(input),
                    dfa.matches(input),
                    "pattern {pattern:?} input {input:?}"
                );
            }
        }
    }

    #[test]
    fn nullable_pattern_accepts_empty_input() {
        let (_, dfa) = determinize("a*");
        assert!(dfa.matches(""));
        assert!(dfa.matches("aaa"));
        assert!(!dfa.matches("b"));
    }

    #[test]
    fn creates_trap_state_for_dead_symbols() {
        let (_, dfa) = determinize("ab");
        let graph = dfa.graph();
        let trap = graph.reachable(dfa.start()).into_iter().find(|&s| {
            !graph.is_accepting(s)
                && graph.outgoing_count(s) > 0
                && graph.outgoing(s).all(|(_, e)| e.to == s)
        });
        assert!(trap.is_some(), "expected an all-self-loop trap state");
    }

    #[test]
    fn observer_runs_once_per_worklist_step() {
        let nfa = Automaton::compile("a|b", false).unwrap();
        let mut steps = 0;
        let dfa = nfa
            .determinize_with(first_declared, |_, _| steps += 1)
            .unwrap();
        assert_eq!(steps, dfa.graph().reachable(dfa.start()).len());
    }

    #[test]
    fn start_state_is_named_a() {
        let (_, dfa) = determinize("ab");
        assert_eq!(dfa.graph().label(dfa.start()), Some("A"));
    }

    #[test]
    fn debug_names_cycle_with_suffixes() {
        assert_eq!(debug_name(0), "A");
        assert_eq!(debug_name(25), "Z");
        assert_eq!(debug_name(26), "a");
        assert_eq!(debug_name(51), "z");
        assert_eq!(debug_name(52), "A1");
        assert_eq!(debug_name(105), "B2");
    }

    fn pattern_strategy() -> impl Strategy<Value = String> {
        let atom = prop::sample::select(vec!["a", "b", "c", ".", "[ab]", "[a-c]"])
            .prop_map(str::to_owned);
        atom.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a}{b}")),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a})|({b})")),
                inner.clone().prop_map(|a| format!("({a})*")),
                inner.clone().prop_map(|a| format!("({a})+")),
                inner.prop_map(|a| format!("({a})?")),
            ]
        })
    }

    proptest! {
        #[test]
        fn determinization_preserves_language(
            pattern in pattern_strategy(),
            inputs in prop::collection::vec(
                prop::collection::vec(prop::sample::select(vec!['a', 'b', 'c', 'd']), 0..6),
                1..8,
            ),
        ) {
            let nfa = Automaton::compile(&pattern, false).unwrap();
            let dfa = nfa.determinize(first_declared).unwrap();
            prop_assert!(dfa.is_deterministic());

            for input in inputs {
                let input: String = input.into_iter().collect();
                prop_assert_eq!(
                    nfa.matches(&input),
                    dfa.matches(&input),
                    "pattern {:?} input {:?}",
                    pattern,
                    input
                );
            }
        }
    }
}
