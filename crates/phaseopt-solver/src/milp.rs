//! Solver-agnostic mixed-integer linear model
//!
//! Variables live in a flat arena addressed by [`VarId`]; backends translate
//! the arena into their own representation.

/// Handle to a variable in a [`MilpModel`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    Integer,
    Continuous,
}

/// Variable kind and bounds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VarDef {
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

/// Sum of `coefficient * variable` terms
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
        }
    }

    /// Add a term; zero coefficients are dropped
    pub fn add(&mut self, var: VarId, coefficient: f64) -> &mut Self {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
        self
    }

    pub fn term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add(var, coefficient);
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coefficient)| coefficient * values[var.index()])
            .sum()
    }

    /// Append every term of `other`
    pub fn extend(&mut self, other: &LinearExpr) {
        self.terms.extend_from_slice(&other.terms);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    GreaterEq,
    Equal,
}

/// `expr (<=|>=|=) rhs`
#[derive(Clone, Debug, PartialEq)]
pub struct LinearConstraint {
    pub label: String,
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        holds(self.expr.evaluate(values), self.relation, self.rhs, tolerance)
    }
}

fn holds(lhs: f64, relation: Relation, rhs: f64, tolerance: f64) -> bool {
    match relation {
        Relation::LessEq => lhs <= rhs + tolerance,
        Relation::GreaterEq => lhs >= rhs - tolerance,
        Relation::Equal => (lhs - rhs).abs() <= tolerance,
    }
}

/// Minimization model over bounded variables
#[derive(Clone, Debug, Default)]
pub struct MilpModel {
    vars: Vec<VarDef>,
    constraints: Vec<LinearConstraint>,
    objective: LinearExpr,
    tie_break: LinearExpr,
    violated: Option<String>,
}

impl MilpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binary(&mut self) -> VarId {
        self.add_var(VarKind::Binary, 0.0, 1.0)
    }

    pub fn add_continuous(&mut self, lower: f64, upper: f64) -> VarId {
        self.add_var(VarKind::Continuous, lower, upper)
    }

    pub fn add_integer(&mut self, lower: f64, upper: f64) -> VarId {
        self.add_var(VarKind::Integer, lower, upper)
    }

    fn add_var(&mut self, kind: VarKind, lower: f64, upper: f64) -> VarId {
        self.vars.push(VarDef { kind, lower, upper });
        VarId(self.vars.len() - 1)
    }

    /// Add a constraint.
    ///
    /// Constraints without terms are checked immediately instead of being
    /// handed to a backend; a violated one marks the whole model infeasible.
    pub fn add_constraint(
        &mut self,
        label: impl Into<String>,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) {
        let label = label.into();
        if expr.is_empty() {
            if !holds(0.0, relation, rhs, 1e-9) && self.violated.is_none() {
                self.violated = Some(label);
            }
            return;
        }
        self.constraints.push(LinearConstraint {
            label,
            expr,
            relation,
            rhs,
        });
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    /// Secondary term added to the solved objective only
    pub fn set_tie_break(&mut self, tie_break: LinearExpr) {
        self.tie_break = tie_break;
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// The reported objective
    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    /// The objective backends minimize: reported objective plus tie-break
    pub fn solved_objective(&self) -> LinearExpr {
        let mut combined = LinearExpr::with_capacity(
            self.objective.terms().len() + self.tie_break.terms().len(),
        );
        combined.extend(&self.objective);
        combined.extend(&self.tie_break);
        combined
    }

    /// Label of a term-free constraint that can never hold
    pub fn trivially_infeasible(&self) -> Option<&str> {
        self.violated.as_deref()
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Check bounds, integrality and every constraint against an assignment
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.vars.len() || self.violated.is_some() {
            return false;
        }
        let in_bounds = self.vars.iter().zip(values).all(|(def, &v)| {
            let integral = match def.kind {
                VarKind::Continuous => true,
                VarKind::Binary | VarKind::Integer => (v - v.round()).abs() <= tolerance,
            };
            integral && v >= def.lower - tolerance && v <= def.upper + tolerance
        });
        in_bounds && self.constraints.iter().all(|c| c.is_satisfied(values, tolerance))
    }
}
