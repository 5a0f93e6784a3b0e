//! The bipartite variable-value graph behind the domain-consistent propagator.
//!
//! The graph carries a many-to-one matching: every variable is matched to at
//! most one value node, a value node holds up to its maximum occurrence count
//! of variables and at least its minimum. The graph persists across
//! propagations; [`VarValGraph::sync`] lazily drops edges for values that left
//! a domain and the matching is repaired incrementally with augmenting paths
//! (Regin style). Pruning runs Tarjan's algorithm over the matching
//! orientation, extended with a virtual sink that carries the residual
//! capacity of the value nodes: an unmatched edge whose endpoints fall into
//! different strongly connected components lies on no feasible matching and
//! its value can be removed from the variable's domain.

use fnv::FnvHashMap;

use crate::basic_types::Inconsistency;
use crate::engine::cp::propagation::propagation_context::ReadDomains;
use crate::variables::IntegerVariable;

#[derive(Clone, Debug, Default)]
pub(crate) struct VarValGraph {
    value_index: FnvHashMap<i32, usize>,
    values: Vec<ValueNode>,
    variables: Vec<VariableNode>,
}

#[derive(Clone, Debug)]
struct VariableNode {
    /// Value nodes this variable may still take.
    adjacent: Vec<usize>,
    matched: Option<usize>,
}

#[derive(Clone, Debug)]
struct ValueNode {
    value: i32,
    /// Variables that may still take this value.
    adjacent: Vec<usize>,
    /// Variables currently matched here.
    matched: Vec<usize>,
}

impl VarValGraph {
    pub(crate) fn new<Var: IntegerVariable>(
        context: &impl ReadDomains,
        variables: &[Var],
        values: &[i32],
    ) -> VarValGraph {
        let mut graph = VarValGraph::default();
        for &value in values {
            let _ = graph.value_index.insert(value, graph.values.len());
            graph.values.push(ValueNode {
                value,
                adjacent: Vec::new(),
                matched: Vec::new(),
            });
        }
        for (index, var) in variables.iter().enumerate() {
            let mut adjacent = Vec::with_capacity(context.size(var));
            for value in context.iterate_domain(var) {
                let node = graph.value_index[&value];
                adjacent.push(node);
                graph.values[node].adjacent.push(index);
            }
            graph.variables.push(VariableNode {
                adjacent,
                matched: None,
            });
        }
        graph
    }

    /// Drops the edges of values that have left a domain since the last
    /// propagation; a variable whose matched value disappeared becomes
    /// unmatched and is repaired later.
    pub(crate) fn sync<Var: IntegerVariable>(
        &mut self,
        context: &impl ReadDomains,
        variables: &[Var],
    ) {
        for (index, var) in variables.iter().enumerate() {
            let mut position = 0;
            while position < self.variables[index].adjacent.len() {
                let node = self.variables[index].adjacent[position];
                if context.contains(var, self.values[node].value) {
                    position += 1;
                    continue;
                }
                let _ = self.variables[index].adjacent.swap_remove(position);
                remove_one(&mut self.values[node].adjacent, index);
                if self.variables[index].matched == Some(node) {
                    self.variables[index].matched = None;
                    remove_one(&mut self.values[node].matched, index);
                }
            }
        }
    }

    /// Releases variables from values whose matched count exceeds the current
    /// maximum; this happens when a variable-backed count was tightened since
    /// the matching was built. The released variables are rematched later.
    pub(crate) fn enforce_maximums(&mut self, maximums: &[i32]) {
        for node in 0..self.values.len() {
            while (self.values[node].matched.len() as i32) > maximums[node] {
                let variable = *self.values[node].matched.last().unwrap();
                self.detach(variable, node);
            }
        }
    }

    /// Brings every value node up to its minimum occurrence count.
    pub(crate) fn saturate_values(&mut self, minimums: &[i32]) -> Result<(), Inconsistency> {
        for node in 0..self.values.len() {
            while (self.values[node].matched.len() as i32) < minimums[node] {
                if !self.augment_value(node, minimums) {
                    return Err(Inconsistency::InsufficientSupply {
                        value: self.values[node].value,
                    });
                }
            }
        }
        Ok(())
    }

    /// Matches every unmatched variable, respecting the maximum occurrence
    /// counts.
    pub(crate) fn saturate_variables(&mut self, maximums: &[i32]) -> Result<(), Inconsistency> {
        for index in 0..self.variables.len() {
            if self.variables[index].matched.is_none() && !self.augment_variable(index, maximums) {
                let value = self.variables[index]
                    .adjacent
                    .first()
                    .map(|&node| self.values[node].value);
                return Err(match value {
                    Some(value) => Inconsistency::CapacityExceeded { value },
                    None => Inconsistency::EmptyDomain,
                });
            }
        }
        Ok(())
    }

    /// Searches an alternating path that gives `root` one more variable: end
    /// at an unmatched variable, or steal from a value above its minimum.
    fn augment_value(&mut self, root: usize, minimums: &[i32]) -> bool {
        let mut visited_value = vec![false; self.values.len()];
        let mut visited_variable = vec![false; self.variables.len()];
        // per visited value: the variable rematched into the previous value of
        // the path, and that previous value
        let mut entered: Vec<(usize, usize)> = vec![(usize::MAX, usize::MAX); self.values.len()];
        let mut queue = vec![root];
        visited_value[root] = true;
        let mut head = 0;
        while head < queue.len() {
            let value = queue[head];
            head += 1;
            for position in 0..self.values[value].adjacent.len() {
                let variable = self.values[value].adjacent[position];
                if visited_variable[variable] {
                    continue;
                }
                visited_variable[variable] = true;
                match self.variables[variable].matched {
                    None => {
                        self.apply_value_path(root, value, variable, &entered);
                        return true;
                    }
                    Some(current) if current == value => {}
                    Some(current) => {
                        if (self.values[current].matched.len() as i32) > minimums[current] {
                            self.apply_value_path(root, value, variable, &entered);
                            return true;
                        }
                        if !visited_value[current] {
                            visited_value[current] = true;
                            entered[current] = (variable, value);
                            queue.push(current);
                        }
                    }
                }
            }
        }
        false
    }

    /// Rewires the matching along a path found by [`VarValGraph::augment_value`]:
    /// `terminal` moves to `value`, and every step back towards `root` shifts
    /// one matched variable to the value before it.
    fn apply_value_path(
        &mut self,
        root: usize,
        value: usize,
        terminal: usize,
        entered: &[(usize, usize)],
    ) {
        if let Some(current) = self.variables[terminal].matched {
            self.detach(terminal, current);
        }
        self.attach(terminal, value);
        let mut cursor = value;
        while cursor != root {
            let (variable, previous) = entered[cursor];
            self.detach(variable, cursor);
            self.attach(variable, previous);
            cursor = previous;
        }
    }

    /// Searches an augmenting path from an unmatched variable to a value with
    /// spare capacity.
    fn augment_variable(&mut self, root: usize, maximums: &[i32]) -> bool {
        let mut visited_value = vec![false; self.values.len()];
        // per visited value: the variable that reached it
        let mut entered: Vec<usize> = vec![usize::MAX; self.values.len()];
        let mut queue: Vec<usize> = Vec::new();
        for position in 0..self.variables[root].adjacent.len() {
            let node = self.variables[root].adjacent[position];
            if !visited_value[node] {
                visited_value[node] = true;
                entered[node] = root;
                queue.push(node);
            }
        }
        let mut head = 0;
        while head < queue.len() {
            let value = queue[head];
            head += 1;
            if (self.values[value].matched.len() as i32) < maximums[value] {
                // free slot: shift the matching along the path back to the root
                let mut cursor = value;
                loop {
                    let variable = entered[cursor];
                    let previous = self.variables[variable].matched;
                    if let Some(previous) = previous {
                        self.detach(variable, previous);
                    }
                    self.attach(variable, cursor);
                    match previous {
                        Some(previous) => cursor = previous,
                        None => return true,
                    }
                }
            }
            for position in 0..self.values[value].matched.len() {
                let variable = self.values[value].matched[position];
                for adjacent_position in 0..self.variables[variable].adjacent.len() {
                    let node = self.variables[variable].adjacent[adjacent_position];
                    if !visited_value[node] {
                        visited_value[node] = true;
                        entered[node] = variable;
                        queue.push(node);
                    }
                }
            }
        }
        false
    }

    /// Unmatched edges that lie on no feasible matching, as
    /// `(variable index, value)` pairs.
    pub(crate) fn prunable_edges(
        &self,
        minimums: &[i32],
        maximums: &[i32],
    ) -> Vec<(usize, i32)> {
        let n = self.variables.len();
        let m = self.values.len();
        let sink = n + m;
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n + m + 1];
        for (index, variable) in self.variables.iter().enumerate() {
            for &node in &variable.adjacent {
                if variable.matched != Some(node) {
                    successors[index].push(n + node);
                }
            }
        }
        for (node, value) in self.values.iter().enumerate() {
            successors[n + node].extend(value.matched.iter().copied());
            // residual capacity: a value below its maximum can still accept a
            // variable, one above its minimum can give one up
            if (value.matched.len() as i32) < maximums[node] {
                successors[n + node].push(sink);
            }
            if (value.matched.len() as i32) > minimums[node] {
                successors[sink].push(n + node);
            }
        }
        let components = strongly_connected_components(&successors);

        let mut prunable = Vec::new();
        for (index, variable) in self.variables.iter().enumerate() {
            for &node in &variable.adjacent {
                if variable.matched != Some(node) && components[index] != components[n + node] {
                    prunable.push((index, self.values[node].value));
                }
            }
        }
        prunable
    }

    /// Drops the edge between a variable and a value after the value was
    /// pruned from the variable's domain.
    pub(crate) fn remove_edge(&mut self, variable: usize, value: i32) {
        let node = self.value_index[&value];
        debug_assert!(self.variables[variable].matched != Some(node));
        remove_one(&mut self.variables[variable].adjacent, node);
        remove_one(&mut self.values[node].adjacent, variable);
    }

    fn attach(&mut self, variable: usize, value: usize) {
        debug_assert!(self.variables[variable].matched.is_none());
        self.variables[variable].matched = Some(value);
        self.values[value].matched.push(variable);
    }

    fn detach(&mut self, variable: usize, value: usize) {
        debug_assert!(self.variables[variable].matched == Some(value));
        self.variables[variable].matched = None;
        remove_one(&mut self.values[value].matched, variable);
    }
}

fn remove_one(list: &mut Vec<usize>, item: usize) {
    if let Some(position) = list.iter().position(|&entry| entry == item) {
        let _ = list.swap_remove(position);
    }
}

/// Iterative Tarjan; returns the component id of every node.
fn strongly_connected_components(successors: &[Vec<usize>]) -> Vec<usize> {
    let n = successors.len();
    let mut index = vec![usize::MAX; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut components = vec![usize::MAX; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut call_stack: Vec<(usize, usize)> = Vec::new();
    let mut next_index = 0;
    let mut next_component = 0;

    for start in 0..n {
        if index[start] != usize::MAX {
            continue;
        }
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;
        call_stack.push((start, 0));
        while let Some(&(node, cursor)) = call_stack.last() {
            if cursor < successors[node].len() {
                call_stack.last_mut().unwrap().1 += 1;
                let next = successors[node][cursor];
                if index[next] == usize::MAX {
                    index[next] = next_index;
                    lowlink[next] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    call_stack.push((next, 0));
                } else if on_stack[next] {
                    lowlink[node] = lowlink[node].min(index[next]);
                }
            } else {
                let _ = call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[node]);
                }
                if lowlink[node] == index[node] {
                    loop {
                        let member = stack.pop().unwrap();
                        on_stack[member] = false;
                        components[member] = next_component;
                        if member == node {
                            break;
                        }
                    }
                    next_component += 1;
                }
            }
        }
    }
    components
}
