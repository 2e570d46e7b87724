use std::sync::Arc;

use stagegraph_core::graph::cloudfoundry::{
    self, CREATE_SERVICE_KEY_STAGE, DELETE_SERVICE_KEY_STAGE, DELETE_SERVICE_KEY_TASK,
    MONITOR_SERVICES_TASK,
};
use stagegraph_core::graph::{
    StageCatalog, StageDefinitionBuilder, SubmitThenMonitorStage, TaskBinding, TaskGraphBuilder,
};
use stagegraph_core::models::{CoreErrorKind, StageSpec, TaskKind, TaskType};

fn catalog() -> StageCatalog {
    StageCatalog::new([
        Arc::new(cloudfoundry::delete_service_key_stage()) as Arc<dyn StageDefinitionBuilder>,
        Arc::new(cloudfoundry::create_service_key_stage()) as Arc<dyn StageDefinitionBuilder>,
    ])
    .unwrap()
}

#[test]
fn delete_service_key_graph_places_monitor_after_action() {
    let graph = catalog()
        .build(&StageSpec::new(DELETE_SERVICE_KEY_STAGE).with_cloud_provider("cloudfoundry"))
        .unwrap();

    let names: Vec<&str> = graph.nodes().iter().map(|node| node.name.as_str()).collect();
    assert_eq!(names, vec!["deleteServiceKey", "monitorDeleteServiceKey"]);

    assert_eq!(graph.nodes()[0].kind, TaskKind::Action);
    assert_eq!(graph.nodes()[0].task_type, TaskType::new(DELETE_SERVICE_KEY_TASK));
    assert_eq!(graph.nodes()[1].kind, TaskKind::Monitor);
    assert_eq!(graph.nodes()[1].task_type, TaskType::new(MONITOR_SERVICES_TASK));
    assert!(graph.is_asynchronous());
    assert_eq!(graph.position("monitorDeleteServiceKey"), Some(1));
    assert_eq!(
        graph.node("deleteServiceKey").map(|node| node.kind),
        Some(TaskKind::Action)
    );
}

#[test]
fn every_submit_then_monitor_graph_has_exactly_one_action_then_one_monitor() {
    let catalog = catalog();
    for stage_type in catalog.stage_types() {
        let graph = catalog.build(&StageSpec::new(stage_type)).unwrap();

        let actions: Vec<usize> = graph
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind == TaskKind::Action)
            .map(|(index, _)| index)
            .collect();
        let monitors: Vec<usize> = graph
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind == TaskKind::Monitor)
            .map(|(index, _)| index)
            .collect();

        assert_eq!(actions.len(), 1, "{stage_type} must declare one action");
        assert_eq!(monitors.len(), 1, "{stage_type} must declare one monitor");
        assert!(actions[0] < monitors[0], "{stage_type} monitors before acting");
        assert_eq!(monitors[0], graph.len() - 1, "{stage_type} must end in its monitor");
    }
}

#[test]
fn building_is_repeatable() {
    let catalog = catalog();
    let spec = StageSpec::new(CREATE_SERVICE_KEY_STAGE);

    assert_eq!(catalog.build(&spec).unwrap(), catalog.build(&spec).unwrap());
}

#[test]
fn unknown_stage_type_is_rejected() {
    let catalog = catalog();
    assert!(catalog.has_stage_type(DELETE_SERVICE_KEY_STAGE));
    assert!(!catalog.has_stage_type("destroyServerGroup"));

    let error = catalog
        .build(&StageSpec::new("destroyServerGroup"))
        .unwrap_err();

    assert_eq!(error.kind, CoreErrorKind::InvalidInput);
    assert_eq!(error.stage.as_deref(), Some("destroyServerGroup"));
}

#[test]
fn unbound_cloud_provider_is_rejected() {
    let error = catalog()
        .build(&StageSpec::new(DELETE_SERVICE_KEY_STAGE).with_cloud_provider("aws"))
        .unwrap_err();

    assert_eq!(error.kind, CoreErrorKind::InvalidInput);
    assert!(error.message.contains("aws"));
}

#[test]
fn cloud_provider_is_required_without_a_default() {
    let stage = SubmitThenMonitorStage::new("deleteLoadBalancer").bind(
        "aws",
        TaskBinding::new("deleteLoadBalancer", "aws.deleteLoadBalancer"),
        TaskBinding::new("monitorDelete", "aws.monitorKato"),
    );
    assert_eq!(stage.cloud_providers().collect::<Vec<_>>(), vec!["aws"]);

    let error = stage
        .build(&StageSpec::new("deleteLoadBalancer"))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidInput);

    let graph = stage
        .build(&StageSpec::new("deleteLoadBalancer").with_cloud_provider("aws"))
        .unwrap();
    assert_eq!(graph.nodes()[0].task_type, TaskType::new("aws.deleteLoadBalancer"));
}

#[test]
fn definition_refuses_specs_for_other_stage_types() {
    let error = cloudfoundry::delete_service_key_stage()
        .build(&StageSpec::new(CREATE_SERVICE_KEY_STAGE))
        .unwrap_err();

    assert_eq!(error.kind, CoreErrorKind::InvalidInput);
}

#[test]
fn duplicate_stage_definitions_are_rejected() {
    let result = StageCatalog::new([
        Arc::new(cloudfoundry::delete_service_key_stage()) as Arc<dyn StageDefinitionBuilder>,
        Arc::new(cloudfoundry::delete_service_key_stage()) as Arc<dyn StageDefinitionBuilder>,
    ]);

    assert_eq!(result.err().map(|error| error.kind), Some(CoreErrorKind::InvalidInput));
}

#[test]
fn duplicate_task_names_are_rejected() {
    let mut builder = TaskGraphBuilder::new("deleteServiceKey");
    builder
        .with_task("deleteServiceKey", DELETE_SERVICE_KEY_TASK, TaskKind::Action)
        .with_task("deleteServiceKey", MONITOR_SERVICES_TASK, TaskKind::Monitor);

    let error = builder.build().unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidInput);
    assert!(error.message.contains("duplicate task name"));
}

#[test]
fn monitor_before_action_is_rejected() {
    let mut builder = TaskGraphBuilder::new("deleteServiceKey");
    builder
        .with_task("monitorDeleteServiceKey", MONITOR_SERVICES_TASK, TaskKind::Monitor)
        .with_task("deleteServiceKey", DELETE_SERVICE_KEY_TASK, TaskKind::Action);

    assert_eq!(
        builder.build().unwrap_err().kind,
        CoreErrorKind::InvalidInput
    );
}

#[test]
fn action_without_monitor_is_rejected() {
    let mut builder = TaskGraphBuilder::new("deleteServiceKey");
    builder.with_task("deleteServiceKey", DELETE_SERVICE_KEY_TASK, TaskKind::Action);

    let error = builder.build().unwrap_err();
    assert!(error.message.contains("must be followed by a monitor"));
}

#[test]
fn empty_graph_is_rejected() {
    let error = TaskGraphBuilder::new("noop").build().unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidInput);
}
