use multiphys::config::{LineSearchKind, ProblemConfig};

#[test]
fn empty_json_gives_defaults() {
    let config = ProblemConfig::from_json_str("{}").unwrap();
    assert_eq!(config, ProblemConfig::default());
    assert_eq!(config.num_threads, 1);
    assert_eq!(config.newton.max_iterations, 50);
    assert_eq!(config.line_search, LineSearchKind::None);
    assert!(config.check_kernel_coverage);
}

#[test]
fn partial_json_overrides_selected_fields() {
    let json = r#"{
        "num_threads": 4,
        "line_search": "backtracking",
        "newton": { "max_iterations": 12, "abs_tolerance": 1e-12 }
    }"#;
    let config = ProblemConfig::from_json_str(json).unwrap();
    assert_eq!(config.num_threads, 4);
    assert_eq!(config.line_search, LineSearchKind::Backtracking);
    assert_eq!(config.newton.max_iterations, 12);
    assert_eq!(config.newton.abs_tolerance, 1e-12);
    assert_eq!(config.newton.rel_tolerance, 1e-8);
}

#[test]
fn invalid_configurations_are_rejected() {
    assert!(ProblemConfig::from_json_str(r#"{ "num_threads": 0 }"#).is_err());
    assert!(ProblemConfig::from_json_str(r#"{ "line_search": "wolfe" }"#).is_err());
    assert!(ProblemConfig::from_json_str(r#"{ "newton": { "abs_tolerance": 0.0, "rel_tolerance": 0.0 } }"#).is_err());
    assert!(ProblemConfig::default().with_threads(0).validate().is_err());
    assert!(ProblemConfig::default().with_threads(8).validate().is_ok());
}
