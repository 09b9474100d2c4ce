mod common;

use armada_cloud::{
    ActionType, GlobalState, ManagedResource, Provisioner, RemoteFault, ResourceState,
    ResourceStatus, ResourceTimeouts, UnconfirmedDeletePolicy, Value,
};
use common::{Call, FakeCloud, context, widget_set, widget_set_id};
use std::sync::Arc;
use std::time::Duration;

fn provisioner(cloud: &Arc<FakeCloud>) -> Provisioner {
    Provisioner::new(Arc::new(context(cloud.clone())))
}

fn manifest(fault_domains: i64) -> Vec<ManagedResource> {
    vec![ManagedResource::new(
        "web",
        "fake_widget_set",
        widget_set("set1", fault_domains),
    )]
}

#[tokio::test(start_paused = true)]
async fn test_apply_then_plan_is_noop() {
    let cloud = FakeCloud::new();
    let provisioner = provisioner(&cloud);
    let mut state = GlobalState::new();

    let plan = provisioner.plan(&manifest(3), &state).unwrap();
    assert_eq!(plan.summary().create, 1);

    let result = provisioner.apply(&plan, &mut state).await;
    assert!(result.is_success(), "{:?}", result.failed);

    let record = state.get_resource("web").unwrap();
    assert_eq!(record.status, ResourceStatus::Present);
    assert_eq!(record.id, widget_set_id("set1"));

    let again = provisioner.plan(&manifest(3), &state).unwrap();
    assert!(!again.has_changes);
    assert_eq!(again.actions[0].action_type, ActionType::NoOp);
}

#[tokio::test(start_paused = true)]
async fn test_forcing_field_change_replaces_without_update() {
    let cloud = FakeCloud::new();
    let provisioner = provisioner(&cloud);
    let mut state = GlobalState::new();

    let plan = provisioner.plan(&manifest(3), &state).unwrap();
    provisioner.apply(&plan, &mut state).await;
    let before = cloud.calls().len();

    let plan = provisioner.plan(&manifest(2), &state).unwrap();
    assert_eq!(plan.actions[0].action_type, ActionType::Replace);
    assert_eq!(
        plan.actions[0].changes.replacement_fields(),
        vec!["platform_fault_domain_count"]
    );

    let result = provisioner.apply(&plan, &mut state).await;
    assert!(result.is_success(), "{:?}", result.failed);

    let mutations: Vec<Call> = cloud.calls()[before..]
        .iter()
        .filter(|c| matches!(c, Call::Put(..) | Call::Patch(..) | Call::Delete(_)))
        .cloned()
        .collect();
    assert!(matches!(mutations.as_slice(), [Call::Delete(_), Call::Put(..)]));

    let record = state.get_resource("web").unwrap();
    assert_eq!(
        record.attributes.get("platform_fault_domain_count"),
        Some(&Value::Int(2))
    );
}

#[tokio::test(start_paused = true)]
async fn test_removed_resource_is_destroyed() {
    let cloud = FakeCloud::new();
    let provisioner = provisioner(&cloud);
    let mut state = GlobalState::new();

    let plan = provisioner.plan(&manifest(3), &state).unwrap();
    provisioner.apply(&plan, &mut state).await;

    let plan = provisioner.plan(&[], &state).unwrap();
    assert_eq!(plan.summary().delete, 1);

    let result = provisioner.apply(&plan, &mut state).await;
    assert!(result.is_success());
    assert!(state.resources.is_empty());
    assert!(!cloud.contains(&widget_set_id("set1")));
}

#[tokio::test(start_paused = true)]
async fn test_one_failure_does_not_stop_the_others() {
    let cloud = FakeCloud::new();
    cloud.fail_puts(
        &widget_set_id("broken"),
        RemoteFault::new(400, "The value of parameter location is invalid.")
            .with_code("InvalidParameter"),
    );
    let provisioner = provisioner(&cloud);
    let mut state = GlobalState::new();

    let resources = vec![
        ManagedResource::new("good", "fake_widget_set", widget_set("set1", 3)),
        ManagedResource::new("bad", "fake_widget_set", widget_set("broken", 3)),
    ];
    let plan = provisioner.plan(&resources, &state).unwrap();
    let result = provisioner.apply(&plan, &mut state).await;

    assert_eq!(result.succeeded.len(), 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].name, "bad");
    assert!(
        result.failed[0]
            .error
            .as_deref()
            .unwrap()
            .contains("The value of parameter location is invalid.")
    );
    assert!(state.get_resource("good").is_some());
    assert!(state.get_resource("bad").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_two_resources_with_the_same_id_are_rejected() {
    let cloud = FakeCloud::new();
    let provisioner = provisioner(&cloud);

    let resources = vec![
        ManagedResource::new("a", "fake_widget_set", widget_set("set1", 3)),
        ManagedResource::new("b", "fake_widget_set", widget_set("SET1", 3)),
    ];
    assert!(provisioner.plan(&resources, &GlobalState::new()).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_drops_vanished_and_malformed_records() {
    let cloud = FakeCloud::new();
    cloud.insert(&widget_set_id("set1"), serde_json::json!({"location": "westeurope"}));
    let provisioner = provisioner(&cloud);

    let mut state = GlobalState::new();
    state.set_resource(
        "kept".to_string(),
        ResourceState::new(widget_set_id("set1"), "fake_widget_set"),
    );
    state.set_resource(
        "vanished".to_string(),
        ResourceState::new(widget_set_id("set2"), "fake_widget_set")
            .with_status(ResourceStatus::Present),
    );
    state.set_resource(
        "garbled".to_string(),
        ResourceState::new("/subscriptions/x/widgets", "fake_widget_set"),
    );

    let report = provisioner.refresh(&mut state).await;

    assert_eq!(report.refreshed, vec!["kept"]);
    assert_eq!(report.removed.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(state.resources.len(), 1);
    assert_eq!(
        state.get_resource("kept").unwrap().status,
        ResourceStatus::Present
    );
}

#[tokio::test(start_paused = true)]
async fn test_import_tracks_existing_object_regardless_of_casing() {
    let cloud = FakeCloud::new();
    cloud.insert(
        &widget_set_id("set1"),
        serde_json::json!({"location": "westeurope", "properties": {"platformFaultDomainCount": 3}}),
    );
    let provisioner = provisioner(&cloud);
    let mut state = GlobalState::new();

    provisioner
        .import("web", "fake_widget_set", &widget_set_id("set1"), &mut state)
        .await
        .unwrap();
    assert!(
        provisioner
            .import("web", "fake_widget_set", &widget_set_id("set1"), &mut state)
            .await
            .is_err()
    );

    // configuration spells the resource group differently than the API
    let resources = vec![ManagedResource::new(
        "web",
        "fake_widget_set",
        widget_set("set1", 3).with("resource_group_name", "RG1"),
    )];
    let plan = provisioner.plan(&resources, &state).unwrap();
    assert!(!plan.has_changes, "{:?}", plan.actions);
    assert!(cloud.mutations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_timeout_is_recorded_as_unconfirmed() {
    let cloud = FakeCloud::new().with_async_operations(1000);
    let ctx = context(cloud.clone()).with_timeouts(ResourceTimeouts {
        create: Duration::from_secs(60),
        ..ResourceTimeouts::default()
    });
    let provisioner = Provisioner::new(Arc::new(ctx));
    let mut state = GlobalState::new();

    let plan = provisioner.plan(&manifest(3), &state).unwrap();
    let result = provisioner.apply(&plan, &mut state).await;
    assert_eq!(result.failed.len(), 1);
    assert_eq!(
        state.get_resource("web").unwrap().status,
        ResourceStatus::Unconfirmed
    );
    assert!(provisioner.plan(&manifest(3), &state).is_err());

    // the object did get created, so a refresh resolves the ambiguity
    provisioner.refresh(&mut state).await;
    assert_eq!(
        state.get_resource("web").unwrap().status,
        ResourceStatus::Present
    );
    let plan = provisioner.plan(&manifest(3), &state).unwrap();
    assert!(!plan.has_changes);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_delete_policy() {
    for (policy, expect_tracked) in [
        (UnconfirmedDeletePolicy::Fail, true),
        (UnconfirmedDeletePolicy::Warn, false),
    ] {
        let cloud = FakeCloud::new();
        let ctx = context(cloud.clone()).with_timeouts(ResourceTimeouts {
            delete: Duration::from_secs(120),
            ..ResourceTimeouts::default()
        });
        let provisioner = Provisioner::new(Arc::new(ctx)).with_unconfirmed_delete(policy);
        let mut state = GlobalState::new();

        let plan = provisioner.plan(&manifest(3), &state).unwrap();
        provisioner.apply(&plan, &mut state).await;
        cloud.script_gets(&widget_set_id("set1"), vec![true; 1000]);

        let plan = provisioner.plan_destroy(&state, &[]).unwrap();
        let result = provisioner.apply(&plan, &mut state).await;

        assert_eq!(state.get_resource("web").is_some(), expect_tracked);
        assert_eq!(result.is_success(), !expect_tracked);
        assert_eq!(result.warnings.len(), usize::from(!expect_tracked));
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_existence_check_leaves_foreign_object_alone() {
    let cloud = FakeCloud::new();
    cloud.insert(&widget_set_id("set1"), serde_json::json!({"location": "westeurope"}));
    cloud.stall_gets(&widget_set_id("set1"));
    let ctx = context(cloud.clone()).with_timeouts(ResourceTimeouts {
        create: Duration::from_secs(60),
        ..ResourceTimeouts::default()
    });
    let provisioner = Provisioner::new(Arc::new(ctx));
    let mut state = GlobalState::new();

    let plan = provisioner.plan(&manifest(3), &state).unwrap();
    let result = provisioner.apply(&plan, &mut state).await;

    assert_eq!(result.failed.len(), 1);
    assert!(cloud.mutations().is_empty());
    // no PUT was sent, so the existing object is not claimed
    assert!(state.get_resource("web").is_none());

    let plan = provisioner.plan_destroy(&state, &[]).unwrap();
    assert!(!plan.has_changes);
    provisioner.apply(&plan, &mut state).await;
    assert!(cloud.contains(&widget_set_id("set1")));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_delete_confirmation_stops_at_the_delete_timeout() {
    for (policy, expect_tracked) in [
        (UnconfirmedDeletePolicy::Fail, true),
        (UnconfirmedDeletePolicy::Warn, false),
    ] {
        let cloud = FakeCloud::new();
        let ctx = context(cloud.clone()).with_timeouts(ResourceTimeouts {
            delete: Duration::from_secs(120),
            ..ResourceTimeouts::default()
        });
        let provisioner = Provisioner::new(Arc::new(ctx)).with_unconfirmed_delete(policy);
        let mut state = GlobalState::new();

        let plan = provisioner.plan(&manifest(3), &state).unwrap();
        provisioner.apply(&plan, &mut state).await;
        cloud.stall_gets(&widget_set_id("set1"));

        let started = tokio::time::Instant::now();
        let plan = provisioner.plan_destroy(&state, &[]).unwrap();
        let result = provisioner.apply(&plan, &mut state).await;

        assert!(started.elapsed() <= Duration::from_secs(120));
        assert_eq!(state.get_resource("web").is_some(), expect_tracked);
        if expect_tracked {
            let error = result.failed[0].error.as_deref().unwrap();
            assert!(error.contains("absence was not confirmed"), "{}", error);
        } else {
            assert!(result.is_success());
            assert_eq!(result.warnings.len(), 1);
        }
    }
}
