//! Weight grid generation and Pareto dominance filtering

use tracing::debug;

use phaseopt_core::{Metrics, Weights};

/// Relative tolerance for metric comparisons
pub const DOMINANCE_TOLERANCE: f64 = 1e-6;

/// Weight combinations for a sweep with `steps` increments per free axis.
///
/// `cost` and `makespan` walk the grid; the remainder is shared equally by
/// `emissions` and `npv`. Combinations are rounded to 6 decimals and
/// de-duplicated, keeping grid order.
pub fn weight_grid(steps: u32) -> Vec<Weights> {
    let steps = steps.max(1);
    let s = f64::from(steps);
    let mut grid: Vec<Weights> = Vec::new();
    let mut seen: Vec<[i64; 4]> = Vec::new();

    for i in 0..=steps {
        for j in 0..=(steps - i) {
            let cost = f64::from(i) / s;
            let makespan = f64::from(j) / s;
            let remainder = 1.0 - cost - makespan;
            if remainder < -1e-12 {
                continue;
            }
            let half = remainder.max(0.0) / 2.0;
            let raw = [half, cost, makespan, half].map(round6);
            let key = raw.map(|w| (w * 1e6).round() as i64);
            if seen.contains(&key) {
                continue;
            }
            match Weights::new(raw[0], raw[1], raw[2], raw[3]) {
                Ok(weights) => {
                    seen.push(key);
                    grid.push(weights);
                }
                Err(e) => debug!(error = %e, "discarding degenerate weight combination"),
            }
        }
    }
    grid
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

fn better(a: f64, b: f64) -> bool {
    a > b + DOMINANCE_TOLERANCE * 1f64.max(a.abs()).max(b.abs())
}

fn no_worse(a: f64, b: f64) -> bool {
    !better(b, a)
}

/// Whether `a` dominates `b`: no worse on every metric and strictly better
/// on at least one. NPV is maximized; cost, makespan and emissions are
/// minimized.
pub fn dominates(a: &Metrics, b: &Metrics) -> bool {
    // Orient every metric so that larger is better
    let lhs = oriented(a);
    let rhs = oriented(b);
    let all_no_worse = lhs.iter().zip(&rhs).all(|(&x, &y)| no_worse(x, y));
    let any_better = lhs.iter().zip(&rhs).any(|(&x, &y)| better(x, y));
    all_no_worse && any_better
}

fn oriented(m: &Metrics) -> [f64; 4] {
    [
        m.npv,
        -m.total_cost,
        -(m.makespan_periods as f64),
        -m.emissions_tco2e,
    ]
}

/// Indices of the non-dominated entries, in input order
pub fn non_dominated(metrics: &[Metrics]) -> Vec<usize> {
    (0..metrics.len())
        .filter(|&i| {
            !metrics
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && dominates(other, &metrics[i]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn m(npv: f64, cost: f64, makespan: usize, emissions: f64) -> Metrics {
        Metrics {
            npv,
            total_cost: cost,
            makespan_periods: makespan,
            emissions_tco2e: emissions,
        }
    }

    #[test]
    fn grid_sums_to_one() {
        let grid = weight_grid(4);
        // (4+1)(4+2)/2 points on the triangle
        assert_eq!(grid.len(), 15);
        for w in &grid {
            assert!((w.sum() - 1.0).abs() < 1e-9);
            assert!(w.npv() >= 0.0 && w.emissions() >= 0.0);
            assert_eq!(w.npv(), w.emissions());
        }
        assert_eq!(grid[0].cost(), 0.0);
        assert_eq!(grid[0].makespan(), 0.0);
        assert_eq!(grid[0].npv(), 0.5);
    }

    #[test]
    fn grid_with_one_step() {
        let grid = weight_grid(1);
        let points: Vec<(f64, f64)> = grid.iter().map(|w| (w.cost(), w.makespan())).collect();
        assert_eq!(points, vec![(0.0, 0.0), (0.0, 1.0), (1.0, 0.0)]);
        // Zero steps behaves like one
        assert_eq!(weight_grid(0).len(), 3);
    }

    #[test]
    fn dominance_directions() {
        let base = m(100.0, 50.0, 4, 2.0);
        assert!(dominates(&m(110.0, 50.0, 4, 2.0), &base));
        assert!(dominates(&m(100.0, 40.0, 4, 2.0), &base));
        assert!(dominates(&m(100.0, 50.0, 3, 2.0), &base));
        assert!(!dominates(&m(110.0, 60.0, 4, 2.0), &base));
        assert!(!dominates(&base, &base));
    }

    #[test]
    fn dominance_tolerates_rounding_noise() {
        let a = m(100.0, 50.0, 4, 2.0);
        let b = m(100.0 + 1e-9, 50.0, 4, 2.0);
        assert!(!dominates(&b, &a));
        assert!(!dominates(&a, &b));
    }

    #[test]
    fn frontier_filters_dominated_rows() {
        let rows = vec![
            m(100.0, 50.0, 4, 2.0),
            m(90.0, 60.0, 5, 3.0),
            m(80.0, 30.0, 6, 2.0),
            m(100.0, 50.0, 4, 2.0),
        ];
        // Row 1 is dominated by row 0; identical rows do not dominate each other
        assert_eq!(non_dominated(&rows), vec![0, 2, 3]);
        assert!(non_dominated(&[]).is_empty());
    }
}
