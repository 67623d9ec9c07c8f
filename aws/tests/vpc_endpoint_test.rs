//! VPC endpoint driver against a mock control plane

mod common;

use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use tfcore::{
    attributes, AttributeValue, Context, DesiredConfig, MemoryStateStore, Outcome,
    ResourceAddress, ResourceSpec, StateStore,
};

fn address() -> ResourceAddress {
    ResourceAddress::new("aws_vpc_endpoint", "s3")
}

fn endpoint_body(state: &str, route_tables: &[&str]) -> String {
    json!({
        "vpc_endpoint": {
            "vpc_endpoint_id": "vpce-1",
            "vpc_id": "vpc-0a1b",
            "service_name": "com.amazonaws.us-east-1.s3",
            "state": state,
            "policy_document": "{\"Statement\":[]}",
            "route_table_ids": route_tables,
        }
    })
    .to_string()
}

fn stored_endpoint(route_tables: Vec<&str>) -> ResourceSpec {
    ResourceSpec::new("aws_vpc_endpoint")
        .with_id("vpce-1")
        .with_attribute("vpc_id", "vpc-0a1b")
        .with_attribute("service_name", "com.amazonaws.us-east-1.s3")
        .with_attribute("route_tables", route_tables)
        .with_attribute("policy_document", "{\"Statement\":[]}")
        .with_attribute("state", "available")
}

#[tokio::test(flavor = "multi_thread")]
async fn create_then_read_fills_computed_fields() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/ec2/vpc-endpoints")
        .match_header("authorization", common::bearer().as_str())
        .match_body(Matcher::Json(json!({
            "vpc_id": "vpc-0a1b",
            "service_name": "com.amazonaws.us-east-1.s3",
            "route_table_ids": ["rtb-1"]
        })))
        .with_body(endpoint_body("pending", &["rtb-1"]))
        .expect(1)
        .create_async()
        .await;
    let _read = server
        .mock("GET", "/ec2/vpc-endpoints/vpce-1")
        .with_body(endpoint_body("available", &["rtb-1"]))
        .create_async()
        .await;

    let store = Arc::new(MemoryStateStore::new());
    let reconciler = common::reconciler(&server.url(), store.clone());

    let result = reconciler
        .reconcile(
            &Context::new(),
            &address(),
            Some(attributes! {
                "vpc_id" => "vpc-0a1b",
                "service_name" => "com.amazonaws.us-east-1.s3",
                "route_tables" => vec!["rtb-1"],
            }),
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Created);
    assert_eq!(result.id.as_deref(), Some("vpce-1"));

    let stored = store.get(&address()).await.unwrap().unwrap();
    assert_eq!(stored.get_str("state"), Some("available"));
    assert_eq!(stored.get_str("policy_document"), Some("{\"Statement\":[]}"));
    create.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn route_table_changes_become_add_and_remove() {
    let mut server = Server::new_async().await;
    let modify = server
        .mock("PATCH", "/ec2/vpc-endpoints/vpce-1")
        .match_body(Matcher::Json(json!({
            "add_route_table_ids": ["rtb-3"],
            "remove_route_table_ids": ["rtb-1"]
        })))
        .with_body(r#"{"return":true}"#)
        .expect(1)
        .create_async()
        .await;
    let _read = server
        .mock("GET", "/ec2/vpc-endpoints/vpce-1")
        .with_body(endpoint_body("available", &["rtb-2", "rtb-3"]))
        .create_async()
        .await;

    let store = Arc::new(MemoryStateStore::new());
    store
        .put(&address(), stored_endpoint(vec!["rtb-1", "rtb-2"]))
        .await
        .unwrap();
    let reconciler = common::reconciler(&server.url(), store.clone());

    let result = reconciler
        .reconcile(
            &Context::new(),
            &address(),
            Some(attributes! {
                "vpc_id" => "vpc-0a1b",
                "service_name" => "com.amazonaws.us-east-1.s3",
                "route_tables" => vec!["rtb-3", "rtb-2"],
            }),
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Updated);
    assert_eq!(
        store
            .get(&address())
            .await
            .unwrap()
            .unwrap()
            .get("route_tables"),
        Some(&AttributeValue::from(vec!["rtb-3", "rtb-2"]))
    );
    modify.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn reordered_route_tables_are_not_a_change() {
    let mut server = Server::new_async().await;
    let modify = server
        .mock("PATCH", "/ec2/vpc-endpoints/vpce-1")
        .expect(0)
        .create_async()
        .await;

    let store = Arc::new(MemoryStateStore::new());
    store
        .put(&address(), stored_endpoint(vec!["rtb-1", "rtb-2"]))
        .await
        .unwrap();
    let reconciler = common::reconciler(&server.url(), store);

    let result = reconciler
        .reconcile(
            &Context::new(),
            &address(),
            Some(attributes! {
                "vpc_id" => "vpc-0a1b",
                "service_name" => "com.amazonaws.us-east-1.s3",
                "route_tables" => vec!["rtb-2", "rtb-1"],
            }),
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Unchanged);
    modify.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn policy_change_is_sent_in_place() {
    let mut server = Server::new_async().await;
    let modify = server
        .mock("PATCH", "/ec2/vpc-endpoints/vpce-1")
        .match_body(Matcher::Json(json!({
            "policy_document": "{\"Statement\":[{\"Effect\":\"Allow\"}]}"
        })))
        .with_body(r#"{"return":true}"#)
        .expect(1)
        .create_async()
        .await;
    let _read = server
        .mock("GET", "/ec2/vpc-endpoints/vpce-1")
        .with_body(endpoint_body("available", &["rtb-1"]))
        .create_async()
        .await;

    let store = Arc::new(MemoryStateStore::new());
    store
        .put(&address(), stored_endpoint(vec!["rtb-1"]))
        .await
        .unwrap();
    let reconciler = common::reconciler(&server.url(), store);

    let result = reconciler
        .reconcile(
            &Context::new(),
            &address(),
            Some(attributes! {
                "vpc_id" => "vpc-0a1b",
                "service_name" => "com.amazonaws.us-east-1.s3",
                "policy_document" => "{\"Statement\":[{\"Effect\":\"Allow\"}]}",
            }),
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Updated);
    modify.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn vpc_change_replaces_endpoint() {
    let mut server = Server::new_async().await;
    let delete = server
        .mock("DELETE", "/ec2/vpc-endpoints/vpce-1")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/ec2/vpc-endpoints")
        .match_body(Matcher::PartialJson(json!({"vpc_id": "vpc-ff"})))
        .with_body(
            json!({
                "vpc_endpoint": {
                    "vpc_endpoint_id": "vpce-2",
                    "vpc_id": "vpc-ff",
                    "service_name": "com.amazonaws.us-east-1.s3",
                    "state": "pending"
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let _read = server
        .mock("GET", "/ec2/vpc-endpoints/vpce-2")
        .with_body(
            json!({
                "vpc_endpoint": {
                    "vpc_endpoint_id": "vpce-2",
                    "vpc_id": "vpc-ff",
                    "service_name": "com.amazonaws.us-east-1.s3",
                    "state": "available"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let store = Arc::new(MemoryStateStore::new());
    store
        .put(&address(), stored_endpoint(vec!["rtb-1"]))
        .await
        .unwrap();
    let reconciler = common::reconciler(&server.url(), store.clone());

    let result = reconciler
        .reconcile(
            &Context::new(),
            &address(),
            Some(attributes! {
                "vpc_id" => "vpc-ff",
                "service_name" => "com.amazonaws.us-east-1.s3",
            }),
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Replaced);
    assert_eq!(result.id.as_deref(), Some("vpce-2"));

    let stored = store.get(&address()).await.unwrap().unwrap();
    assert_eq!(stored.get("route_tables"), Some(&AttributeValue::List(vec![])));
    delete.assert_async().await;
    create.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_drops_deleted_endpoint() {
    let mut server = Server::new_async().await;
    let _read = server
        .mock("GET", "/ec2/vpc-endpoints/vpce-1")
        .with_body(endpoint_body("deleted", &[]))
        .create_async()
        .await;

    let store = Arc::new(MemoryStateStore::new());
    store
        .put(&address(), stored_endpoint(vec!["rtb-1"]))
        .await
        .unwrap();
    let reconciler = common::reconciler(&server.url(), store.clone());

    let refreshed = reconciler.refresh(&Context::new(), &address()).await.unwrap();

    assert!(refreshed.is_none());
    assert!(store.get(&address()).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn apply_handles_both_resource_types() {
    let mut server = Server::new_async().await;
    let _create_endpoint = server
        .mock("POST", "/ec2/vpc-endpoints")
        .with_body(endpoint_body("available", &[]))
        .create_async()
        .await;
    let _read_endpoint = server
        .mock("GET", "/ec2/vpc-endpoints/vpce-1")
        .with_body(endpoint_body("available", &[]))
        .create_async()
        .await;
    let _create_app = server
        .mock("POST", "/sns/platform-applications")
        .with_body(r#"{"platform_application_arn":"arn:app"}"#)
        .create_async()
        .await;
    let _read_app = server
        .mock("GET", "/sns/platform-applications/arn%3Aapp")
        .with_body(r#"{"attributes":{}}"#)
        .create_async()
        .await;

    let desired = DesiredConfig::from_json(
        br#"{
            "aws_vpc_endpoint": {
                "s3": {"vpc_id": "vpc-0a1b", "service_name": "com.amazonaws.us-east-1.s3"}
            },
            "aws_sns_application": {
                "push": {"name": "push", "platform": "GCM", "credential": "key"}
            }
        }"#,
    )
    .unwrap();

    let store = Arc::new(MemoryStateStore::new());
    let reconciler = common::reconciler(&server.url(), store.clone());

    let reports = reconciler.apply(&Context::new(), &desired).await.unwrap();

    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(
            report.result.as_ref().unwrap().outcome,
            Outcome::Created,
            "{}",
            report.address
        );
    }
    assert_eq!(store.list().await.unwrap().len(), 2);
}
