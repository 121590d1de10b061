//! End-to-end scenarios against the corner provider.

use corner_provider::action::ActionEvent;
use corner_provider::corner::{self, ERROR_LINE, LEGACY_USER_TYPE, PROVIDER_ADDRESS, UPDATE_LINE};
use corner_provider::testing::{
    assert_error_contains, assert_plan_unknown, ProviderTester, TestError,
};
use corner_provider::types::{
    MoveResourceStateRequest, UpgradeResourceIdentityRequest, UpgradeResourceStateRequest,
};
use corner_provider::{ClientCapabilities, DeferredReason, ProviderError, Value};
use serde_json::json;

async fn configured(deferral: bool) -> ProviderTester {
    let tester = ProviderTester::new(corner::provider().unwrap());
    tester
        .configure(Value::object([("deferral", Value::bool(deferral))]))
        .await
        .unwrap();
    tester
}

fn user_config(tester: &ProviderTester, email: &str, name: &str, age: f64) -> Value {
    tester
        .resource_config(
            "corner_user",
            [
                ("email", Value::string(email)),
                ("name", Value::string(name)),
                ("age", Value::number(age)),
            ],
        )
        .unwrap()
}

#[tokio::test]
async fn user_create_read_delete() {
    let tester = configured(false).await;
    let config = user_config(&tester, "ford@prefect.co", "Ford Prefect", 200.0);

    let plan = tester.plan_create("corner_user", config.clone()).await.unwrap();
    assert_eq!(plan.planned_state, config);

    let state = tester.create("corner_user", config.clone()).await.unwrap();
    assert_eq!(state, config);

    let read = tester.read("corner_user", state.clone()).await.unwrap();
    assert_eq!(read, state);

    let looked_up = tester
        .read_data_source(
            "corner_user",
            tester
                .data_source_config("corner_user", [("email", Value::string("ford@prefect.co"))])
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(looked_up.get_attr("name"), Some(&Value::string("Ford Prefect")));

    tester.delete("corner_user", state.clone()).await.unwrap();
    let gone = tester.read("corner_user", state).await.unwrap();
    assert!(gone.is_null());
}

#[tokio::test]
async fn write_only_password_never_reaches_state() {
    let tester = configured(false).await;
    let config = tester
        .resource_config(
            "corner_write_only",
            [("name", Value::string("db")), ("password", Value::string("s3cret"))],
        )
        .unwrap();

    let plan = tester.plan_create("corner_write_only", config.clone()).await.unwrap();
    assert!(plan.planned_state.get_attr("password").unwrap().is_null());

    let state = tester.create("corner_write_only", config).await.unwrap();
    assert!(state.get_attr("password").unwrap().is_null());
    assert_eq!(state.get_attr("saved_password"), Some(&Value::string("(saved)")));
}

#[tokio::test]
async fn leaky_write_only_resource_returns_password() {
    let tester = configured(false).await;
    let config = tester
        .resource_config(
            "corner_write_only_leak",
            [("name", Value::string("db")), ("password", Value::string("s3cret"))],
        )
        .unwrap();

    let state = tester.create("corner_write_only_leak", config).await.unwrap();
    assert_eq!(state.get_attr("password"), Some(&Value::string("s3cret")));
}

#[tokio::test]
async fn write_only_rejected_without_host_support() {
    let tester =
        ProviderTester::new(corner::provider().unwrap()).with_capabilities(ClientCapabilities {
            deferral_allowed: true,
            write_only_attributes_allowed: false,
        });
    tester.configure(Value::object([("deferral", Value::bool(false))])).await.unwrap();
    let config = tester
        .resource_config(
            "corner_write_only",
            [("name", Value::string("db")), ("password", Value::string("s3cret"))],
        )
        .unwrap();

    let err = tester.validate_resource_config("corner_write_only", config).await.unwrap_err();
    match err {
        TestError::Diagnostics(diagnostics) => {
            assert_error_contains(&diagnostics, "Write-only Attribute Not Allowed");
            let diagnostic = diagnostics
                .iter()
                .find(|d| d.summary == "Write-only Attribute Not Allowed")
                .unwrap();
            assert_eq!(diagnostic.attribute.as_deref(), Some("password"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn refinements_survive_plan() {
    let tester = configured(false).await;
    let config = tester
        .resource_config("corner_refinement", [("name", Value::string("abc"))])
        .unwrap();

    let plan = tester.plan_create("corner_refinement", config.clone()).await.unwrap();
    assert_plan_unknown(&plan, "str_value");
    for name in ["id", "str_value", "prefixed", "tags"] {
        let refinements = plan.planned_state.get_attr(name).and_then(Value::refinements).unwrap();
        assert!(refinements.definitely_not_null, "{} lost not-null", name);
    }
    let prefixed = plan.planned_state.get_attr("prefixed").and_then(Value::refinements).unwrap();
    assert_eq!(prefixed.string_prefix.as_deref(), Some("corner-"));

    let state = tester.create("corner_refinement", config).await.unwrap();
    assert_eq!(state.get_attr("str_value"), Some(&Value::string("hello")));
    assert_eq!(state.get_attr("prefixed"), Some(&Value::string("corner-abc")));
}

#[tokio::test]
async fn state_and_identity_upgrade_from_v0() {
    let tester = configured(false).await;
    let server = tester.server();

    let state = server
        .upgrade_resource_state(UpgradeResourceStateRequest {
            type_name: "corner_user".to_string(),
            version: 0,
            raw_state: json!({
                "email": "ford@prefect.co",
                "first_name": "Ford",
                "last_name": "Prefect",
                "age": 200
            }),
        })
        .await
        .unwrap();
    assert!(state.diagnostics.is_empty());
    let upgraded = state.upgraded_state.unwrap();
    assert_eq!(
        upgraded,
        Value::object([
            ("email", Value::string("ford@prefect.co")),
            ("name", Value::string("Ford Prefect")),
            ("age", Value::number(200.0)),
        ])
    );

    let identity = server
        .upgrade_resource_identity(UpgradeResourceIdentityRequest {
            type_name: "corner_user".to_string(),
            version: 0,
            raw_identity: json!({ "email": "ford@prefect.co" }),
        })
        .await
        .unwrap();
    assert_eq!(
        identity.upgraded_identity,
        Some(Value::object([
            ("local_part", Value::string("ford")),
            ("domain", Value::string("prefect.co")),
        ]))
    );

    let newer = server
        .upgrade_resource_state(UpgradeResourceStateRequest {
            type_name: "corner_user".to_string(),
            version: 7,
            raw_state: json!({}),
        })
        .await
        .unwrap();
    assert!(newer.upgraded_state.is_none());
    assert_error_contains(&newer.diagnostics, "Unable to Upgrade Resource State");
}

#[tokio::test]
async fn progress_action_streams_events() {
    let tester = configured(false).await;
    let config = Value::object([("fail", Value::null(corner_provider::Type::Bool))]);

    let events = tester
        .invoke_action("corner_progress", "inv-1", config, Vec::new())
        .await
        .unwrap();
    assert_eq!(
        events,
        vec![
            ActionEvent::Progress {
                stdout: vec![UPDATE_LINE.to_string()],
                stderr: vec![ERROR_LINE.to_string()],
            },
            ActionEvent::Finished {
                diagnostics: Vec::new(),
            },
        ]
    );

    let failing = Value::object([("fail", Value::bool(true))]);
    let events = tester
        .invoke_action("corner_progress", "inv-2", failing, Vec::new())
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    match events.last() {
        Some(ActionEvent::Error { diagnostics }) => {
            assert_error_contains(diagnostics, "Progress Failed")
        }
        other => panic!("unexpected final event: {:?}", other),
    }
}

#[tokio::test]
async fn unknown_type_names_are_router_misses() {
    let tester = configured(false).await;
    let err = tester.server().resource("does_not_exist").unwrap_err();
    assert!(matches!(err, ProviderError::UnsupportedType(ref name) if name == "does_not_exist"));

    let err = tester.read("does_not_exist", Value::string("x")).await.unwrap_err();
    assert!(matches!(err, TestError::Provider(ProviderError::UnsupportedType(_))));

    let err = tester.call_function("does_not_exist", &[]).await.unwrap_err();
    assert!(matches!(err, TestError::Provider(ProviderError::UnsupportedFunction(_))));
}

#[tokio::test]
async fn deferral_when_host_allows_it() {
    let tester = configured(true).await;
    let config = user_config(&tester, "a@b.c", "A", 1.0);

    let plan = tester.plan_create("corner_user", config).await.unwrap();
    assert_eq!(plan.deferred.map(|d| d.reason), Some(DeferredReason::ProviderConfigUnknown));
}

#[tokio::test]
async fn deferral_rejected_when_host_does_not_allow_it() {
    let tester =
        ProviderTester::new(corner::provider().unwrap()).with_capabilities(ClientCapabilities {
            deferral_allowed: false,
            write_only_attributes_allowed: true,
        });
    tester.configure(Value::object([("deferral", Value::bool(true))])).await.unwrap();
    let config = user_config(&tester, "a@b.c", "A", 1.0);

    let err = tester.plan_create("corner_user", config).await.unwrap_err();
    match err {
        TestError::Diagnostics(diagnostics) => {
            assert_error_contains(&diagnostics, "Invalid Deferred Response")
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn moves_only_from_whitelisted_sources() {
    let tester = configured(false).await;
    let server = tester.server();
    let request = |provider: &str| MoveResourceStateRequest {
        source_provider_address: provider.to_string(),
        source_type_name: LEGACY_USER_TYPE.to_string(),
        source_schema_version: 0,
        source_state: json!({
            "email": "ford@prefect.co",
            "full_name": "Ford Prefect",
            "age": 200
        }),
        target_type_name: "corner_user".to_string(),
        source_private: Vec::new(),
        source_identity: None,
        source_identity_schema_version: 0,
    };

    let moved = server.move_resource_state(request(PROVIDER_ADDRESS)).await.unwrap();
    assert!(moved.diagnostics.is_empty());
    let state = moved.target_state.unwrap();
    assert_eq!(state.get_attr("name"), Some(&Value::string("Ford Prefect")));
    assert_eq!(
        moved.target_identity.and_then(|i| i.get_attr("domain").cloned()),
        Some(Value::string("prefect.co"))
    );

    let rejected = server
        .move_resource_state(request("registry.terraform.io/hashicorp/elsewhere"))
        .await
        .unwrap();
    assert!(rejected.target_state.is_none());
    assert_error_contains(&rejected.diagnostics, "Unsupported Resource Move");
}

#[tokio::test]
async fn email_domain_function_reports_argument() {
    let tester = configured(false).await;
    let domain = tester
        .call_function("email_domain", &[Value::string("ford@prefect.co")])
        .await
        .unwrap();
    assert_eq!(domain, Value::string("prefect.co"));

    let err = tester.call_function("email_domain", &[Value::string("nope")]).await.unwrap_err();
    assert!(err.to_string().contains("argument 0"));
}
