use crate::Probe;
use multiphys::error::ConfigurationError;
use multiphys::objects::{ContributionObject, ObjectInfo};
use multiphys::warehouse::{ObjectHandle, Warehouse};

fn active_on(warehouse: &Warehouse<Probe>, key: u32) -> Vec<ObjectHandle> {
    let mut handles = Vec::new();
    warehouse.active_on(key, &mut handles);
    handles
}

fn names(warehouse: &Warehouse<Probe>, handles: &[ObjectHandle]) -> Vec<String> {
    handles
        .iter()
        .map(|&h| warehouse.get(h).info().name.clone())
        .collect()
}

#[test]
fn restricted_objects_never_appear_in_global_list() {
    let mut warehouse = Warehouse::new();
    let global = warehouse
        .add_object(&[], Box::new(Probe::new("global")))
        .unwrap();
    let restricted = warehouse
        .add_object(&[1], Box::new(Probe::new("restricted")))
        .unwrap();

    assert_eq!(warehouse.active_global(), &[global]);
    assert_eq!(warehouse.active_for_key(1), &[restricted]);
    assert!(warehouse.active_for_key(2).is_empty());
    assert_eq!(warehouse.restriction(global), &[] as &[u32]);
    assert_eq!(warehouse.restriction(restricted), &[1]);
}

#[test]
fn active_on_merges_global_and_restricted_objects_in_insertion_order() {
    let mut warehouse = Warehouse::new();
    let a = warehouse.add_object(&[1], Box::new(Probe::new("a"))).unwrap();
    let b = warehouse.add_object(&[], Box::new(Probe::new("b"))).unwrap();
    let c = warehouse
        .add_object(&[2, 1, 2], Box::new(Probe::new("c")))
        .unwrap();

    assert_eq!(active_on(&warehouse, 1), vec![a, b, c]);
    assert_eq!(active_on(&warehouse, 2), vec![b, c]);
    assert_eq!(active_on(&warehouse, 3), vec![b]);
    assert_eq!(warehouse.restriction(c), &[1, 2]);
    assert_eq!(warehouse.restriction_keys().collect::<Vec<_>>(), vec![1, 2]);
    assert!(warehouse.has_active_on(3));
}

#[test]
fn active_on_any_lists_each_object_once() {
    let mut warehouse = Warehouse::new();
    let both = warehouse
        .add_object(&[1, 2], Box::new(Probe::new("both")))
        .unwrap();
    let only_two = warehouse
        .add_object(&[2], Box::new(Probe::new("only_two")))
        .unwrap();

    let mut handles = Vec::new();
    warehouse.active_on_any(&[1, 2], &mut handles);
    assert_eq!(handles, vec![both, only_two]);
    warehouse.active_on_any(&[], &mut handles);
    assert!(handles.is_empty());
}

#[test]
fn update_active_follows_activation_windows() {
    let mut warehouse = Warehouse::new();
    let always = warehouse
        .add_object(&[], Box::new(Probe::new("always")))
        .unwrap();
    let windowed_info = ObjectInfo::new("windowed").with_active_window(1.0, 2.0);
    let windowed = warehouse
        .add_object(&[], Box::new(Probe::with_info(windowed_info)))
        .unwrap();
    let late_info = ObjectInfo::new("late").with_active_window(1.5, f64::INFINITY);
    let late = warehouse
        .add_object(&[4], Box::new(Probe::with_info(late_info)))
        .unwrap();

    // Objects are active right after being added
    assert_eq!(active_on(&warehouse, 4), vec![always, windowed, late]);

    warehouse.update_active(0.0);
    assert_eq!(active_on(&warehouse, 4), vec![always]);
    warehouse.update_active(1.0);
    assert_eq!(active_on(&warehouse, 4), vec![always, windowed]);
    warehouse.update_active(1.5);
    assert_eq!(active_on(&warehouse, 4), vec![always, windowed, late]);
    warehouse.update_active(2.0);
    assert_eq!(active_on(&warehouse, 4), vec![always, late]);
    assert_eq!(warehouse.all().count(), 3);
}

#[test]
fn inactive_objects_are_skipped_by_timestep_setup_but_not_initial_setup() {
    let mut warehouse = Warehouse::new();
    let active = warehouse.add_object(&[], Box::new(Probe::new("active"))).unwrap();
    let info = ObjectInfo::new("inactive").with_active_window(10.0, 20.0);
    let inactive = warehouse
        .add_object(&[3], Box::new(Probe::with_info(info)))
        .unwrap();
    warehouse.update_active(0.0);

    warehouse.initial_setup().unwrap();
    warehouse.timestep_setup().unwrap();
    assert_eq!(warehouse.get(active).initial_setups, 1);
    assert_eq!(warehouse.get(inactive).initial_setups, 1);
    assert_eq!(warehouse.get(active).timestep_setups, 1);
    assert_eq!(warehouse.get(inactive).timestep_setups, 0);

    warehouse.subdomain_setup(&[active], 7).unwrap();
    assert_eq!(warehouse.get(active).subdomains_seen, vec![7]);
    assert!(warehouse.get(inactive).subdomains_seen.is_empty());
}

#[test]
fn dependency_ordering_puts_producers_first_in_every_list() {
    let mut warehouse = Warehouse::with_dependency_ordering();
    let consumer = warehouse
        .add_object(&[1], Box::new(Probe::producing("consumer", 1, &[0])))
        .unwrap();
    let unrelated = warehouse
        .add_object(&[], Box::new(Probe::producing("unrelated", 2, &[])))
        .unwrap();
    let producer = warehouse
        .add_object(&[], Box::new(Probe::producing("producer", 0, &[])))
        .unwrap();

    let order = warehouse.handles_in_order();
    let position = |h: ObjectHandle| order.iter().position(|&k| k == h).unwrap();
    assert!(position(producer) < position(consumer));

    let on_one = active_on(&warehouse, 1);
    assert_eq!(names(&warehouse, &on_one), vec!["producer", "unrelated", "consumer"]);
    assert_eq!(names(&warehouse, &active_on(&warehouse, 2)), vec!["producer", "unrelated"]);

    let levels = warehouse.dependency_levels();
    assert_eq!(levels[producer.index()], 0);
    assert_eq!(levels[consumer.index()], 1);
    assert_eq!(levels[unrelated.index()], 0);
}

#[test]
fn dependency_ordered_warehouse_rejects_objects_without_variable() {
    let mut warehouse = Warehouse::with_dependency_ordering();
    let err = warehouse
        .add_object(&[], Box::new(Probe::new("anonymous")))
        .unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::MissingParameter {
            object: "anonymous".to_string(),
            parameter: "variable".to_string(),
        }
    );
    assert!(warehouse.is_empty());
}

#[test]
fn cyclic_object_is_rejected_and_warehouse_is_unchanged() {
    let mut warehouse = Warehouse::with_dependency_ordering();
    let a = warehouse
        .add_object(&[], Box::new(Probe::producing("a", 0, &[1])))
        .unwrap();
    let err = warehouse
        .add_object(&[], Box::new(Probe::producing("b", 1, &[0])))
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::CyclicDependency { .. }));
    assert_eq!(warehouse.len(), 1);
    assert_eq!(warehouse.active_global(), &[a]);
}
