use eyre::eyre;
use multiphys::error::{ConfigurationError, StuckBlock};
use multiphys::scheduler::{Block, Scheduler};
use proptest::prelude::*;

type Log = Vec<String>;

fn logging(name: &str) -> Block<Log> {
    let label = name.to_string();
    Block::new(name).with_task(move |log: &mut Log| {
        log.push(label.clone());
        Ok(())
    })
}

fn configuration_error(report: &eyre::Report) -> &ConfigurationError {
    report
        .downcast_ref::<ConfigurationError>()
        .expect("Expected a configuration error")
}

#[test]
fn blocks_without_prerequisites_run_in_declaration_order() {
    let mut root = logging("root").with_children([logging("a"), logging("b"), logging("c")]);
    let mut log = Log::new();
    let report = Scheduler::execute(&mut root, &mut log).unwrap();
    assert_eq!(report.executed, vec!["root", "a", "b", "c"]);
    assert_eq!(report.sweeps, 1);
    assert_eq!(log, report.executed);
}

#[test]
fn deferred_blocks_run_once_their_prerequisites_have_run() {
    let mut root = logging("root").with_children([
        logging("c").with_prerequisites(["b"]),
        logging("b").with_prerequisites(["a"]),
        logging("a"),
    ]);
    let mut log = Log::new();
    let report = Scheduler::execute(&mut root, &mut log).unwrap();
    assert_eq!(report.executed, vec!["root", "a", "b", "c"]);
    assert_eq!(log, report.executed);
    assert_eq!(report.sweeps, 3);
}

#[test]
fn children_are_visited_depth_first() {
    let mut root = Block::new("root").with_children([
        logging("mesh").with_child(logging("mesh_labels")),
        logging("variables").with_prerequisites(["mesh_labels"]),
    ]);
    let mut log = Log::new();
    let report = Scheduler::execute(&mut root, &mut log).unwrap();
    assert_eq!(report.executed, vec!["root", "mesh", "mesh_labels", "variables"]);
    // Blocks without a task still count as executed, but leave no trace in the context
    assert_eq!(log, vec!["mesh", "mesh_labels", "variables"]);
}

#[test]
fn cyclic_prerequisites_are_reported_as_unsatisfiable() {
    let mut root = logging("root").with_children([
        logging("x").with_prerequisites(["y"]),
        logging("y").with_prerequisites(["x"]),
        logging("z"),
    ]);
    let mut log = Log::new();
    let err = Scheduler::execute(&mut root, &mut log).unwrap_err();
    assert_eq!(
        configuration_error(&err),
        &ConfigurationError::UnsatisfiablePrerequisites {
            stuck: vec![
                StuckBlock {
                    name: "x".to_string(),
                    missing: vec!["y".to_string()],
                },
                StuckBlock {
                    name: "y".to_string(),
                    missing: vec!["x".to_string()],
                },
            ],
        }
    );
    assert_eq!(log, vec!["root", "z"]);
}

#[test]
fn unknown_prerequisite_is_reported_as_unsatisfiable() {
    let mut root = logging("root").with_child(logging("solve").with_prerequisites(["initialize", "root"]));
    let err = Scheduler::execute(&mut root, &mut Log::new()).unwrap_err();
    match configuration_error(&err) {
        ConfigurationError::UnsatisfiablePrerequisites { stuck } => {
            assert_eq!(stuck.len(), 1);
            assert_eq!(stuck[0].name, "solve");
            assert_eq!(stuck[0].missing, vec!["initialize"]);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("`solve` waits for [initialize]"));
}

#[test]
fn duplicate_block_names_are_rejected_before_anything_runs() {
    let mut root = logging("root").with_children([logging("a"), logging("b").with_child(logging("a"))]);
    let mut log = Log::new();
    let err = Scheduler::execute(&mut root, &mut log).unwrap_err();
    assert_eq!(
        configuration_error(&err),
        &ConfigurationError::DuplicateName { name: "a".to_string() }
    );
    assert!(log.is_empty());
}

#[test]
fn only_active_children_are_visited_in_the_listed_order() {
    let mut root = logging("root")
        .with_children([logging("a"), logging("b"), logging("c")])
        .with_active_children(["c", "a"]);
    let mut log = Log::new();
    let report = Scheduler::execute(&mut root, &mut log).unwrap();
    assert_eq!(report.executed, vec!["root", "c", "a"]);
}

#[test]
fn prerequisite_on_inactive_child_can_never_be_satisfied() {
    let mut root = logging("root")
        .with_children([logging("a"), logging("b").with_prerequisites(["a"])])
        .with_active_children(["b"]);
    let err = Scheduler::execute(&mut root, &mut Log::new()).unwrap_err();
    assert!(matches!(
        configuration_error(&err),
        ConfigurationError::UnsatisfiablePrerequisites { .. }
    ));
}

#[test]
fn failing_task_aborts_execution() {
    let mut root = logging("root").with_children([
        Block::new("a").with_task(|_: &mut Log| Err(eyre!("mesh file not found"))),
        logging("b"),
    ]);
    let mut log = Log::new();
    let err = Scheduler::execute(&mut root, &mut log).unwrap_err();
    assert_eq!(err.to_string(), "block `a` failed");
    assert_eq!(err.root_cause().to_string(), "mesh file not found");
    assert_eq!(log, vec!["root"]);
}

/// Prerequisites of block `i` are a subset of the blocks `j < i`, declared in arbitrary
/// order below a common root.
fn acyclic_blocks() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (1usize..12).prop_flat_map(|n| {
        let prerequisites = prop::collection::vec(prop::collection::vec(any::<bool>(), n), n).prop_map(|mask| {
            mask.iter()
                .enumerate()
                .map(|(i, row)| (0..i).filter(|&j| row[j]).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        });
        (prerequisites, Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    })
}

proptest! {
    #[test]
    fn acyclic_graphs_finish_within_block_count_sweeps((prerequisites, declaration_order) in acyclic_blocks()) {
        let name = |i: usize| format!("block{}", i);
        let children = declaration_order.iter().map(|&i| {
            logging(&name(i)).with_prerequisites(prerequisites[i].iter().map(|&j| name(j)))
        });
        let mut root = logging("root").with_children(children);

        let mut log = Log::new();
        let report = Scheduler::execute(&mut root, &mut log).unwrap();
        let num_blocks = prerequisites.len() + 1;
        prop_assert_eq!(report.executed.len(), num_blocks);
        prop_assert!(report.sweeps >= 1);
        prop_assert!(report.sweeps <= num_blocks);

        let position = |block: &str| report.executed.iter().position(|executed| executed == block).unwrap();
        for (i, before) in prerequisites.iter().enumerate() {
            for &j in before {
                prop_assert!(position(&name(j)) < position(&name(i)));
            }
        }
    }
}
