//! The external solver protocol, driven through stand-in shell scripts.

use wl_features::{MaxSatClause, MaxSatProblem, WlError};

fn problem() -> MaxSatProblem {
    MaxSatProblem::new(vec![
        MaxSatClause::soft(vec![1], vec![false], 3).unwrap(),
        MaxSatClause::soft(vec![2], vec![false], 5).unwrap(),
        MaxSatClause::soft(vec![3], vec![false], 9).unwrap(),
        MaxSatClause::hard(vec![1, 2], vec![true, true]).unwrap(),
    ])
}

#[test]
fn hard_clauses_must_be_weightless() {
    assert!(matches!(
        MaxSatClause::new(vec![1, 2], vec![false, false], 4, true),
        Err(WlError::InvalidClause(_))
    ));
    assert_eq!(problem().top().unwrap(), 18);
    assert!(problem().to_wcnf().unwrap().starts_with("p wcnf 3 4 18\n"));
}

#[cfg(unix)]
mod external {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use wl_features::{
        ExternalSolver, MaxSatConfig, MaxSatSolution, MaxSatSolver, PruningStrategy, SetOrMultiset,
        WlConfig, WlError, WlFeatures,
    };
    use wl_features::graph::labelled_graph;

    use super::problem;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).unwrap();
        path
    }

    fn solver(executable: PathBuf, work_dir: &Path, timeout_ms: Option<u64>) -> ExternalSolver {
        ExternalSolver::new(&MaxSatConfig {
            executable,
            work_dir: Some(work_dir.to_path_buf()),
            timeout_ms,
        })
    }

    fn is_empty(dir: &Path) -> bool {
        fs::read_dir(dir).unwrap().next().is_none()
    }

    // Every scenario lives in one test so no script is being written while
    // another thread spawns a solver.
    #[test]
    fn solver_protocol() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();

        let optimum = write_script(
            bin.path(),
            "optimum",
            r#"basename "$1" > "$(dirname "$0")/last_instance"
head -n 1 "$1" | grep -q '^p wcnf 3 4 18$' || exit 1
echo "c stand-in solver"
echo "o 3"
echo "s OPTIMUM FOUND"
echo "c model follows"
echo "v -1 2 3 -9"
exit 30"#,
        );
        let unknown = write_script(bin.path(), "unknown", "echo 's UNKNOWN'\nexit 0");
        let hangs = write_script(bin.path(), "hangs", "sleep 5");

        // optimum found; the foreign variable 9 is ignored
        let solution = solver(optimum.clone(), work.path(), None).solve(&problem()).unwrap();
        assert_eq!(solution, MaxSatSolution::from([(1, false), (2, true), (3, true)]));
        assert!(is_empty(work.path()));
        let instance = fs::read_to_string(bin.path().join("last_instance")).unwrap();
        assert!(instance.starts_with("wl_maxsat_"));
        assert!(instance.trim_end().ends_with(".wcnf"));

        // no optimum marker
        let err = solver(unknown, work.path(), None).solve(&problem()).unwrap_err();
        assert!(matches!(err, WlError::NoOptimum));
        assert!(is_empty(work.path()));

        // enforced timeout
        let err = solver(hangs, work.path(), Some(100)).solve(&problem()).unwrap_err();
        assert!(matches!(err, WlError::SolverTimeout(_)));
        assert!(is_empty(work.path()));

        // a failed solve aborts collection
        let mut config = WlConfig::new(1, PruningStrategy::Maxsat, SetOrMultiset::Set).quiet(true);
        config.maxsat.executable = optimum;
        config.maxsat.work_dir = Some(work.path().to_path_buf());
        let mut wl = WlFeatures::new(config);
        let graphs = vec![labelled_graph(&["a", "b"], &[(0, 1, 0)])];
        // the stand-in rejects any instance but the fixed one above
        assert!(matches!(wl.collect(&graphs), Err(WlError::NoOptimum)));
        assert!(is_empty(work.path()));
    }
}
