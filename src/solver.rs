//! MaxSAT solving backends.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::config::MaxSatConfig;
use crate::error::{Result, WlError};
use crate::maxsat::{MaxSatProblem, MaxSatSolution};

/// Anything that can optimally solve a weighted partial MaxSAT problem.
pub trait MaxSatSolver {
    fn solve(&self, problem: &MaxSatProblem) -> Result<MaxSatSolution>;
}

/// Runs a MaxSAT-evaluation style solver binary on a WCNF file.
#[derive(Debug, Clone)]
pub struct ExternalSolver {
    executable: PathBuf,
    work_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ExternalSolver {
    pub fn new(config: &MaxSatConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            work_dir: config.work_dir(),
            timeout: config.timeout(),
        }
    }

    /// A fresh scratch file in the work dir, deleted when dropped.
    fn temp_file(&self, suffix: &str) -> Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix("wl_maxsat_")
            .suffix(suffix)
            .rand_bytes(16)
            .tempfile_in(&self.work_dir)
            .map_err(|e| WlError::temp_file(&self.work_dir, e))
    }

    fn run(&self, wcnf: &Path, stdout: File) -> Result<ExitStatus> {
        let mut child = Command::new(&self.executable)
            .arg(wcnf)
            .stdin(Stdio::null())
            .stdout(stdout)
            .spawn()
            .map_err(|source| WlError::SolverLaunch {
                executable: self.executable.clone(),
                source,
            })?;

        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WlError::SolverTimeout(timeout));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl MaxSatSolver for ExternalSolver {
    fn solve(&self, problem: &MaxSatProblem) -> Result<MaxSatSolution> {
        let wcnf_text = problem.to_wcnf()?;
        let mut wcnf = self.temp_file(".wcnf")?;
        let output = self.temp_file("_out.txt")?;

        let started = Instant::now();
        let solved = wcnf
            .write_all(wcnf_text.as_bytes())
            .and_then(|()| wcnf.flush())
            .map_err(|e| WlError::temp_file(wcnf.path(), e))
            .and_then(|()| output.reopen().map_err(|e| WlError::temp_file(output.path(), e)))
            .and_then(|stdout| self.run(wcnf.path(), stdout))
            .and_then(|status| {
                debug!("MaxSAT solver exited with {status}");
                let text = fs::read_to_string(output.path())
                    .map_err(|e| WlError::temp_file(output.path(), e))?;
                problem.parse_solution(&text)
            });

        let wcnf_closed = close(wcnf);
        let output_closed = close(output);
        let solution = solved?;
        wcnf_closed?;
        output_closed?;

        info!(
            "MaxSAT solved in {:.3}s, cost {}",
            started.elapsed().as_secs_f64(),
            problem.cost(&solution)
        );
        Ok(solution)
    }
}

fn close(file: NamedTempFile) -> Result<()> {
    let path = file.path().to_path_buf();
    file.close().map_err(|e| WlError::temp_file(path, e))
}

/// Exhaustive in-process solver for small problems.
#[derive(Debug, Clone)]
pub struct BruteForceSolver {
    max_variables: usize,
}

impl Default for BruteForceSolver {
    fn default() -> Self {
        Self { max_variables: 20 }
    }
}

impl BruteForceSolver {
    pub fn new(max_variables: usize) -> Self {
        Self { max_variables }
    }
}

impl MaxSatSolver for BruteForceSolver {
    fn solve(&self, problem: &MaxSatProblem) -> Result<MaxSatSolution> {
        problem.top()?;
        let variables: Vec<u32> = problem.variables().iter().copied().collect();
        if variables.len() > self.max_variables.min(63) {
            return Err(WlError::config(format!(
                "brute-force MaxSAT supports at most {} variables, problem has {}",
                self.max_variables.min(63),
                variables.len()
            )));
        }

        let mut best: Option<(u64, MaxSatSolution)> = None;
        for mask in 0u64..(1u64 << variables.len()) {
            let assignment: MaxSatSolution = variables
                .iter()
                .enumerate()
                .map(|(bit, &v)| (v, mask & (1 << bit) != 0))
                .collect();
            if !problem.is_feasible(&assignment) {
                continue;
            }
            let cost = problem.cost(&assignment);
            if best.as_ref().is_none_or(|(best_cost, _)| cost < *best_cost) {
                best = Some((cost, assignment));
            }
        }
        best.map(|(_, assignment)| assignment)
            .ok_or(WlError::Unsatisfiable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maxsat::MaxSatClause;

    #[test]
    fn brute_force_finds_optimum() {
        // keep at least one of 1, 2, 3 while preferring to drop each
        let problem = MaxSatProblem::new(vec![
            MaxSatClause::hard(vec![1, 2, 3], vec![false; 3]).unwrap(),
            MaxSatClause::soft(vec![1], vec![true], 1).unwrap(),
            MaxSatClause::soft(vec![2], vec![true], 1).unwrap(),
            MaxSatClause::soft(vec![3], vec![true], 1).unwrap(),
        ]);
        let solution = BruteForceSolver::default().solve(&problem).unwrap();
        assert_eq!(
            solution,
            MaxSatSolution::from([(1, true), (2, false), (3, false)])
        );
    }

    #[test]
    fn brute_force_reports_unsat() {
        let problem = MaxSatProblem::new(vec![
            MaxSatClause::hard(vec![1], vec![false]).unwrap(),
            MaxSatClause::hard(vec![1], vec![true]).unwrap(),
        ]);
        assert!(matches!(
            BruteForceSolver::default().solve(&problem),
            Err(WlError::Unsatisfiable)
        ));
    }

    #[test]
    fn brute_force_refuses_large_problems() {
        let clauses = (1..=5)
            .map(|v| MaxSatClause::soft(vec![v], vec![false], 1).unwrap())
            .collect();
        let problem = MaxSatProblem::new(clauses);
        assert!(BruteForceSolver::new(4).solve(&problem).is_err());
    }

    #[test]
    fn missing_executable_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = MaxSatConfig {
            executable: dir.path().join("no-such-solver"),
            work_dir: Some(dir.path().to_path_buf()),
            timeout_ms: None,
        };
        let problem = MaxSatProblem::new(vec![MaxSatClause::soft(vec![1], vec![false], 1).unwrap()]);
        let err = ExternalSolver::new(&config).solve(&problem).unwrap_err();
        assert!(matches!(err, WlError::SolverLaunch { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
