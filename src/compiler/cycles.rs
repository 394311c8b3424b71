/// Find every node that is part of a cycle, using Tarjan's strongly connected
/// components algorithm
///
/// A node is in a cycle if its component has more than one member, or if it
/// has an edge to itself.
pub(crate) fn nodes_in_cycles(node_count: usize, adjacency: &[Vec<usize>]) -> Vec<bool> {
    const UNVISITED: usize = usize::MAX;

    struct State<'a> {
        adjacency: &'a [Vec<usize>],
        index: Vec<usize>,
        low_link: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        next_index: usize,
        in_cycle: Vec<bool>,
    }

    let mut state = State {
        adjacency,
        index: vec![UNVISITED; node_count],
        low_link: vec![0; node_count],
        on_stack: vec![false; node_count],
        stack: Vec::new(),
        next_index: 0,
        in_cycle: vec![false; node_count],
    };

    // An explicit work stack of (node, next child to visit) frames, so deep
    // graphs cannot overflow the call stack
    let mut work: Vec<(usize, usize)> = Vec::new();

    for root in 0..node_count {
        if state.index[root] != UNVISITED {
            continue;
        }

        work.push((root, 0));

        while let Some((node, child_position)) = work.pop() {
            if child_position == 0 {
                state.index[node] = state.next_index;
                state.low_link[node] = state.next_index;
                state.next_index += 1;
                state.stack.push(node);
                state.on_stack[node] = true;
            }

            if let Some(&child) = state.adjacency[node].get(child_position) {
                work.push((node, child_position + 1));

                if state.index[child] == UNVISITED {
                    work.push((child, 0));
                } else if state.on_stack[child] {
                    state.low_link[node] = state.low_link[node].min(state.index[child]);
                }

                continue;
            }

            if state.low_link[node] == state.index[node] {
                let component_start = state
                    .stack
                    .iter()
                    .rposition(|&member| member == node)
                    .unwrap_or(0);

                let component = &state.stack[component_start..];

                let is_cycle = component.len() > 1
                    || state.adjacency[node].iter().any(|&child| child == node);

                if is_cycle {
                    for &member in component {
                        state.in_cycle[member] = true;
                    }
                }

                for &member in component {
                    state.on_stack[member] = false;
                }

                state.stack.truncate(component_start);
            }

            if let Some(&(parent, _)) = work.last() {
                state.low_link[parent] = state.low_link[parent].min(state.low_link[node]);
            }
        }
    }

    state.in_cycle
}
