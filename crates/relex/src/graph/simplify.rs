//! Epsilon-chain collapsing over a finished graph.

use tracing::trace;

use super::{Graph, StateId};

/// Runs collapse passes until a pass makes no further change, so the whole
/// operation is idempotent.
pub(super) fn run(graph: &mut Graph, start: StateId) {
    loop {
        let mut changed = false;
        for state in graph.reachable(start) {
            changed |= collapse(graph, state);
        }
        if !changed {
            break;
        }
    }
}

/// Collapses one-hop chains leaving `state`.
///
/// `[A] -x-> [B] -ϵ-> [C]` becomes `[A] -x-> [C]`, and `[A] -ϵ-> [B] -x-> [C]`
/// becomes `[A] -x-> [C]` when no same-symbol edge already leaves `A`. States
/// with more than one outgoing transition are merge points and are never
/// collapsed through.
fn collapse(graph: &mut Graph, state: StateId) -> bool {
    let mut changed = false;

    let outgoing: Vec<_> = graph.outgoing(state).collect();
    for (id, edge) in outgoing {
        if graph.edge(id).is_none() || edge.to == state {
            continue;
        }
        if graph.outgoing_count(edge.to) != 1 {
            continue;
        }
        let Some((_, hop)) = graph.outgoing(edge.to).next() else {
            unreachable!()
        };
        if hop.to == edge.to {
            continue;
        }

        if hop.input.is_epsilon() {
            trace!(
                "collapsing {} -> {} -> {} into a direct transition",
                edge.from, edge.to, hop.to
            );
            graph.disconnect(id);
            graph.connect(state, edge.input, hop.to);
            changed = true;
        } else if edge.input.is_epsilon() {
            if graph.outgoing(state).any(|(_, e)| e.input == hop.input) {
                continue;
            }
            trace!(
                "inlining {} -> {} across epsilon from {}",
                edge.to, hop.to, edge.from
            );
            graph.disconnect(id);
            graph.connect(state, hop.input, hop.to);
            changed = true;
        }
    }

    changed
}
