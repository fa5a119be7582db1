//! Weighted partial MaxSAT instances and their WCNF text form.
//!
//! Serialisation follows the pre-2022 MaxSAT evaluation format: a header
//! `p wcnf <vars> <clauses> <top>` and one clause per line, prefixed by its
//! weight, with hard clauses carrying the `top` weight. See
//! <https://maxsat-evaluations.github.io/2021/rules.html#input>.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use log::{debug, info};

use crate::error::{Result, WlError};

/// Variable → assigned value, restricted to the problem's own variables.
pub type MaxSatSolution = BTreeMap<u32, bool>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxSatClause {
    variables: Vec<u32>,
    negated: Vec<bool>,
    weight: u64,
    hard: bool,
}

impl MaxSatClause {
    /// Hard clauses must have weight 0 and soft clauses weight at least 1.
    /// Variables are DIMACS style, so strictly positive.
    pub fn new(variables: Vec<u32>, negated: Vec<bool>, weight: u64, hard: bool) -> Result<Self> {
        if hard && weight != 0 {
            return Err(WlError::clause("hard MaxSAT clauses should have 0 weight"));
        }
        if !hard && weight < 1 {
            return Err(WlError::clause("soft MaxSAT clauses should have weight >= 1"));
        }
        if variables.len() != negated.len() {
            return Err(WlError::clause(format!(
                "clause has {} variables but {} negation flags",
                variables.len(),
                negated.len()
            )));
        }
        if variables.contains(&0) {
            return Err(WlError::clause("clause variables should be strictly positive"));
        }
        Ok(Self {
            variables,
            negated,
            weight,
            hard,
        })
    }

    pub fn hard(variables: Vec<u32>, negated: Vec<bool>) -> Result<Self> {
        Self::new(variables, negated, 0, true)
    }

    pub fn soft(variables: Vec<u32>, negated: Vec<bool>, weight: u64) -> Result<Self> {
        Self::new(variables, negated, weight, false)
    }

    pub fn variables(&self) -> &[u32] {
        &self.variables
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn is_hard(&self) -> bool {
        self.hard
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Literals as signed DIMACS integers.
    pub fn literals(&self) -> impl Iterator<Item = i64> + '_ {
        self.variables
            .iter()
            .zip(&self.negated)
            .map(|(&v, &neg)| if neg { -(v as i64) } else { v as i64 })
    }

    pub fn is_satisfied_by(&self, assignment: &MaxSatSolution) -> bool {
        self.variables
            .iter()
            .zip(&self.negated)
            .any(|(v, &neg)| assignment.get(v).is_some_and(|&value| value != neg))
    }

    /// One WCNF line: weight, literals, terminating `0`.
    fn wcnf_line(&self, top: u64) -> String {
        let weight = if self.hard { top } else { self.weight };
        if self.is_empty() {
            format!("{weight} 0\n")
        } else {
            format!("{weight} {} 0\n", self.literals().format(" "))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaxSatProblem {
    clauses: Vec<MaxSatClause>,
    variables: BTreeSet<u32>,
}

impl MaxSatProblem {
    pub fn new(clauses: Vec<MaxSatClause>) -> Self {
        let variables = clauses
            .iter()
            .flat_map(|c| c.variables.iter().copied())
            .collect();
        Self { clauses, variables }
    }

    pub fn clauses(&self) -> &[MaxSatClause] {
        &self.clauses
    }

    pub fn variables(&self) -> &BTreeSet<u32> {
        &self.variables
    }

    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    /// Largest variable id, which is what the WCNF header declares.
    pub fn max_variable(&self) -> u32 {
        self.variables.last().copied().unwrap_or(0)
    }

    /// One plus the sum of all clause weights.
    pub fn top(&self) -> Result<u64> {
        let mut sum: u64 = 0;
        let mut max: u64 = 0;
        for clause in &self.clauses {
            sum = sum
                .checked_add(clause.weight)
                .ok_or_else(|| WlError::clause("sum of clause weights overflows"))?;
            max = max.max(clause.weight);
        }
        let top = sum
            .checked_add(1)
            .ok_or_else(|| WlError::clause("sum of clause weights overflows"))?;
        if top < max {
            return Err(WlError::clause(format!(
                "top weight {top} is less than the max clause weight {max}"
            )));
        }
        Ok(top)
    }

    pub fn to_wcnf(&self) -> Result<String> {
        let top = self.top()?;
        info!("  Variables: {}", self.n_variables());
        info!("  Clauses: {}", self.clauses.len());
        info!("  Max variable weights (Top): {top}");

        let mut out = format!(
            "p wcnf {} {} {}\n",
            self.max_variable(),
            self.clauses.len(),
            top
        );
        for clause in &self.clauses {
            out.push_str(&clause.wcnf_line(top));
        }
        Ok(out)
    }

    /// Total weight of soft clauses falsified by `assignment`.
    pub fn cost(&self, assignment: &MaxSatSolution) -> u64 {
        self.clauses
            .iter()
            .filter(|c| !c.hard && !c.is_satisfied_by(assignment))
            .map(|c| c.weight)
            .sum()
    }

    pub fn is_feasible(&self, assignment: &MaxSatSolution) -> bool {
        self.clauses
            .iter()
            .filter(|c| c.hard)
            .all(|c| c.is_satisfied_by(assignment))
    }

    /// Decode solver output: the first content line after `s OPTIMUM FOUND`,
    /// minus its leading status character, lists signed literals. Comment
    /// lines are skipped and literals of foreign variables ignored.
    pub fn parse_solution(&self, output: &str) -> Result<MaxSatSolution> {
        let mut lines = output.lines().map(str::trim_end);
        if !lines.any(|line| line.trim() == "s OPTIMUM FOUND") {
            return Err(WlError::NoOptimum);
        }
        let solution_line = lines
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('c'))
            .ok_or_else(|| WlError::MalformedSolution("no assignment after the optimum marker".into()))?;
        debug!("Solver output: {solution_line}");

        let mut chars = solution_line.chars();
        chars.next();
        let mut solution = MaxSatSolution::new();
        for token in chars.as_str().split_whitespace() {
            let value: i64 = token
                .parse()
                .map_err(|_| WlError::MalformedSolution(format!("'{token}' is not a literal")))?;
            let Ok(variable) = u32::try_from(value.unsigned_abs()) else {
                continue;
            };
            if self.variables.contains(&variable) {
                solution.insert(variable, value > 0);
            }
        }
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> MaxSatProblem {
        MaxSatProblem::new(vec![
            MaxSatClause::soft(vec![1], vec![false], 3).unwrap(),
            MaxSatClause::soft(vec![2], vec![false], 5).unwrap(),
            MaxSatClause::soft(vec![3], vec![true], 9).unwrap(),
            MaxSatClause::hard(vec![1, 2, 3], vec![false, true, false]).unwrap(),
        ])
    }

    #[test]
    fn clause_validation() {
        assert!(matches!(
            MaxSatClause::new(vec![1], vec![false], 2, true),
            Err(WlError::InvalidClause(_))
        ));
        assert!(MaxSatClause::new(vec![1], vec![false], 0, false).is_err());
        assert!(MaxSatClause::new(vec![1, 2], vec![false], 1, false).is_err());
        assert!(MaxSatClause::new(vec![0], vec![false], 1, false).is_err());
        assert!(MaxSatClause::hard(vec![], vec![]).is_ok());
    }

    #[test]
    fn clause_lines() {
        let clause = MaxSatClause::hard(vec![2, 4], vec![true, false]).unwrap();
        assert_eq!(clause.wcnf_line(7), "7 -2 4 0\n");
        assert_eq!(MaxSatClause::hard(vec![], vec![]).unwrap().wcnf_line(7), "7 0\n");
        assert_eq!(MaxSatClause::soft(vec![1], vec![false], 3).unwrap().wcnf_line(7), "3 1 0\n");
    }

    #[test]
    fn top_is_one_plus_weight_sum() {
        assert_eq!(example().top().unwrap(), 18);
    }

    #[test]
    fn wcnf_text() {
        let wcnf = example().to_wcnf().unwrap();
        assert_eq!(
            wcnf,
            "p wcnf 3 4 18\n3 1 0\n5 2 0\n9 -3 0\n18 1 -2 3 0\n"
        );
    }

    #[test]
    fn overflowing_weights_are_rejected() {
        let problem = MaxSatProblem::new(vec![
            MaxSatClause::soft(vec![1], vec![false], u64::MAX).unwrap(),
            MaxSatClause::soft(vec![2], vec![false], 1).unwrap(),
        ]);
        assert!(matches!(problem.top(), Err(WlError::InvalidClause(_))));
    }

    #[test]
    fn parses_solution_after_marker() {
        let output = "c uwrmaxsat\no 3\ns OPTIMUM FOUND\nc comment\nv 1 -2 3 -7\n";
        let solution = example().parse_solution(output).unwrap();
        assert_eq!(
            solution,
            MaxSatSolution::from([(1, true), (2, false), (3, true)])
        );
    }

    #[test]
    fn missing_marker_is_an_error() {
        let output = "c uwrmaxsat\ns UNKNOWN\n";
        assert!(matches!(example().parse_solution(output), Err(WlError::NoOptimum)));
    }

    #[test]
    fn garbage_literal_is_an_error() {
        let output = "s OPTIMUM FOUND\nv 1 x 3\n";
        assert!(matches!(
            example().parse_solution(output),
            Err(WlError::MalformedSolution(_))
        ));
    }

    #[test]
    fn cost_and_feasibility() {
        let problem = example();
        let all_true = MaxSatSolution::from([(1, true), (2, true), (3, true)]);
        assert!(problem.is_feasible(&all_true));
        assert_eq!(problem.cost(&all_true), 9);
        let infeasible = MaxSatSolution::from([(1, false), (2, true), (3, false)]);
        assert!(!problem.is_feasible(&infeasible));
    }
}
