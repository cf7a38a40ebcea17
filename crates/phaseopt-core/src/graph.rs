//! Precedence graph checks
//!
//! Kahn's algorithm over the known predecessor edges. Used to reject cyclic
//! inputs at build time instead of letting them surface as an infeasible solve.

use std::collections::{HashMap, VecDeque};

use crate::{Task, TaskId};

/// Topological order of task positions, or the tasks on or behind a cycle.
///
/// Predecessors missing from `index` are ignored.
pub fn topological_order(
    tasks: &[Task],
    index: &HashMap<TaskId, usize>,
) -> Result<Vec<usize>, Vec<TaskId>> {
    let mut in_degree = vec![0usize; tasks.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];

    for (succ, task) in tasks.iter().enumerate() {
        for pred in &task.predecessors {
            if let Some(&pred) = index.get(pred) {
                successors[pred].push(succ);
                in_degree[succ] += 1;
            }
        }
    }

    // Seed in input order so the result is deterministic
    let mut queue: VecDeque<usize> = (0..tasks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(tasks.len());

    while let Some(current) = queue.pop_front() {
        order.push(current);
        for &next in &successors[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() != tasks.len() {
        let remaining = (0..tasks.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| tasks[i].id.clone())
            .collect();
        return Err(remaining);
    }

    Ok(order)
}
