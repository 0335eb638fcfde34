//! Integration tests for the resource facade.
//!
//! These tests run [`CosmosClient`], [`Database`](cosmosdb::Database) and
//! [`Container`](cosmosdb::Container) against an in-memory store to verify
//! status mapping, session propagation, option validation and partition key
//! handling.

mod common;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use common::{container_link, test_config, MemoryStore};
use cosmosdb::resource::{PartitionKey, ResourceType};
use cosmosdb::transport::Operation;
use cosmosdb::{
    AccessCondition, ContainerProperties, CosmosClient, CosmosError, PartitionKeyDefinition, Query,
    RequestOptions, ResourceRef,
};

fn client_with_store() -> (CosmosClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.seed("dbs/shop", json!({"id": "shop"}));
    store.seed(
        "dbs/shop/colls/orders",
        json!({
            "id": "orders",
            "partitionKey": {"paths": ["/customerId"], "kind": "Hash"},
            "_self": "dbs/shop/colls/orders/"
        }),
    );
    let client = CosmosClient::with_transport(test_config(), store.clone());
    (client, store)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Order {
    id: String,
    customer_id: String,
    total: u32,
}

// ============================================================================
// Create / upsert semantics
// ============================================================================

#[tokio::test]
async fn test_create_twice_reports_already_exists() {
    let (client, store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();
    let options = RequestOptions::new();

    let first = json!({"id": "1", "customerId": "c-7", "total": 10});
    assert_ok!(orders.create_item(&first, &options).await);

    let second = json!({"id": "1", "customerId": "c-7", "total": 99});
    let error = orders.create_item(&second, &options).await.unwrap_err();

    assert!(matches!(
        error,
        CosmosError::AlreadyExists { ref link } if link == "dbs/shop/colls/orders/docs/1"
    ));
    assert_eq!(error.status_code(), Some(409));
    assert_eq!(store.get("dbs/shop/colls/orders/docs/1").unwrap(), first);
}

#[tokio::test]
async fn test_upsert_twice_then_get_returns_second_payload() {
    let (client, _store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();
    let options = RequestOptions::new();

    let first = Order {
        id: "1".to_string(),
        customer_id: "c-7".to_string(),
        total: 10,
    };
    let second = Order { total: 25, ..first.clone() };
    assert_ok!(orders.upsert_item(&first, &options).await);
    assert_ok!(orders.upsert_item(&second, &options).await);

    let read = orders
        .get_item("1", &RequestOptions::new().with_partition_key("c-7"))
        .await
        .unwrap();
    let typed = read.into_typed::<Order>().unwrap();
    assert_eq!(typed.data(), &second);
}

#[tokio::test]
async fn test_create_database_if_not_exists_reads_existing() {
    let (client, store) = client_with_store();
    let options = RequestOptions::new().with_offer_throughput(400);

    let existing = client
        .create_database_if_not_exists("shop", &options)
        .await
        .unwrap();
    assert_eq!(existing.data()["id"], "shop");

    let created = client
        .create_database_if_not_exists("archive", &options)
        .await
        .unwrap();
    assert_eq!(created.status_code(), 201);
    assert!(store.get("dbs/archive").is_some());

    let operations: Vec<Operation> = store
        .point_requests()
        .iter()
        .map(|r| r.operation)
        .collect();
    assert_eq!(
        operations,
        vec![Operation::Create, Operation::Read, Operation::Create]
    );
}

#[tokio::test]
async fn test_create_container_if_not_exists() {
    let (client, store) = client_with_store();
    let shop = client.database("shop").unwrap();
    let properties = ContainerProperties::new("invoices")
        .with_partition_key(PartitionKeyDefinition::new("/accountId"))
        .with_default_ttl(0);

    let created = shop
        .create_container_if_not_exists(&properties, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(created.status_code(), 201);
    assert_eq!(
        store.get("dbs/shop/colls/invoices").unwrap()["defaultTtl"],
        json!(0)
    );

    let again = shop
        .create_container_if_not_exists(&properties, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(again.status_code(), 200);
}

// ============================================================================
// Status mapping
// ============================================================================

#[tokio::test]
async fn test_missing_item_is_not_found() {
    let (client, _store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();

    let error = orders
        .get_item("missing", &RequestOptions::new().with_partition_key("c-7"))
        .await
        .unwrap_err();

    assert!(matches!(error, CosmosError::NotFound { .. }));
    assert_eq!(error.link(), Some("dbs/shop/colls/orders/docs/missing"));
}

#[tokio::test]
async fn test_replace_of_missing_item_is_not_found() {
    let (client, _store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();

    let result = orders
        .replace_item(
            "9",
            &json!({"id": "9", "customerId": "c-1"}),
            &RequestOptions::new(),
        )
        .await;

    assert!(matches!(result, Err(CosmosError::NotFound { .. })));
}

#[tokio::test]
async fn test_replace_with_stale_etag_fails_access_condition() {
    let (client, store) = client_with_store();
    store.seed(
        "dbs/shop/colls/orders/docs/1",
        json!({"id": "1", "customerId": "c-7", "total": 10, "_etag": "\"v2\""}),
    );
    let orders = client
        .database("shop")
        .unwrap()
        .container("orders")
        .unwrap()
        .with_partition_key_definition(PartitionKeyDefinition::new("/customerId"));
    let body = json!({"id": "1", "customerId": "c-7", "total": 25});

    let stale = RequestOptions::new().with_access_condition(AccessCondition::IfMatch("\"v1\"".to_string()));
    let error = orders.replace_item("1", &body, &stale).await.unwrap_err();

    assert!(matches!(error, CosmosError::AccessConditionFailed { .. }));
    assert_eq!(error.status_code(), Some(412));
    assert_eq!(error.link(), Some("dbs/shop/colls/orders/docs/1"));
    assert_eq!(store.get("dbs/shop/colls/orders/docs/1").unwrap()["total"], 10);

    let current = RequestOptions::new().with_access_condition(AccessCondition::IfMatch("\"v2\"".to_string()));
    assert_ok!(orders.replace_item("1", &body, &current).await);
    assert_eq!(store.get("dbs/shop/colls/orders/docs/1").unwrap()["total"], 25);
}

// ============================================================================
// Identity and options
// ============================================================================

#[tokio::test]
async fn test_invalid_identity_makes_no_call() {
    let (client, store) = client_with_store();

    assert!(matches!(
        client.database("bad/id"),
        Err(CosmosError::InvalidIdentity { .. })
    ));
    let orders = client.database("shop").unwrap().container("orders").unwrap();
    let result = orders
        .create_item(&json!({"customerId": "c-1"}), &RequestOptions::new())
        .await;

    assert!(matches!(result, Err(CosmosError::InvalidIdentity { .. })));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_option_outside_call_scope_is_rejected() {
    let (client, store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();

    let result = orders
        .get_item(
            "1",
            &RequestOptions::new()
                .with_partition_key("c-7")
                .with_offer_throughput(400),
        )
        .await;

    assert!(matches!(
        result,
        Err(CosmosError::InvalidOption { ref option, .. }) if option == "offerThroughput"
    ));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_partition_key_comes_from_body() {
    let (client, store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();

    orders
        .create_item(
            &json!({"id": "1", "customerId": "c-7", "total": 10}),
            &RequestOptions::new(),
        )
        .await
        .unwrap();
    orders
        .create_item(
            &json!({"id": "2", "customerId": "c-8", "total": 10}),
            &RequestOptions::new(),
        )
        .await
        .unwrap();

    let requests = store.point_requests();
    // One container read to learn the definition, then the two creates.
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].operation, Operation::Read);
    assert_eq!(
        requests[1].options.options().partition_key,
        Some(PartitionKey::from("c-7"))
    );
    assert_eq!(
        requests[2].options.options().partition_key,
        Some(PartitionKey::from("c-8"))
    );
}

#[tokio::test]
async fn test_explicit_definition_skips_container_read() {
    let (client, store) = client_with_store();
    let orders = client
        .database("shop")
        .unwrap()
        .container("orders")
        .unwrap()
        .with_partition_key_definition(PartitionKeyDefinition::new("/customerId"));

    orders
        .upsert_item(&json!({"id": "1", "customerId": "c-7"}), &RequestOptions::new())
        .await
        .unwrap();

    let requests = store.point_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].operation, Operation::Upsert);
}

// ============================================================================
// Session propagation
// ============================================================================

#[tokio::test]
async fn test_session_token_flows_from_write_to_read() {
    let (client, store) = client_with_store();
    let orders = client
        .database("shop")
        .unwrap()
        .container("orders")
        .unwrap()
        .with_partition_key_definition(PartitionKeyDefinition::new("/customerId"));

    let created = orders
        .create_item(&json!({"id": "1", "customerId": "c-7"}), &RequestOptions::new())
        .await
        .unwrap();
    let token = created.session_token().unwrap().to_string();
    assert_eq!(
        client
            .session_tracker()
            .current_token(&container_link("shop", "orders")),
        Some(token.clone())
    );

    orders
        .get_item("1", &RequestOptions::new().with_partition_key("c-7"))
        .await
        .unwrap();

    let requests = store.point_requests();
    assert_eq!(requests[0].options.options().session_token, None);
    assert_eq!(
        requests[1].options.options().session_token.as_deref(),
        Some(token.as_str())
    );
}

#[tokio::test]
async fn test_explicit_session_token_wins() {
    let (client, store) = client_with_store();
    let orders = client
        .database("shop")
        .unwrap()
        .container("orders")
        .unwrap()
        .with_partition_key_definition(PartitionKeyDefinition::new("/customerId"));
    orders
        .upsert_item(&json!({"id": "1", "customerId": "c-7"}), &RequestOptions::new())
        .await
        .unwrap();

    orders
        .get_item(
            "1",
            &RequestOptions::new()
                .with_partition_key("c-7")
                .with_session_token("0:1#99"),
        )
        .await
        .unwrap();

    let requests = store.point_requests();
    assert_eq!(
        requests[1].options.options().session_token.as_deref(),
        Some("0:1#99")
    );
}

#[tokio::test]
async fn test_delete_container_forgets_session_token() {
    let (client, _store) = client_with_store();
    let shop = client.database("shop").unwrap();
    let orders = shop
        .container("orders")
        .unwrap()
        .with_partition_key_definition(PartitionKeyDefinition::new("/customerId"));
    orders
        .upsert_item(&json!({"id": "1", "customerId": "c-7"}), &RequestOptions::new())
        .await
        .unwrap();
    let link = container_link("shop", "orders");
    assert!(client.session_tracker().current_token(&link).is_some());

    shop.delete_container("orders", &RequestOptions::new())
        .await
        .unwrap();

    assert!(client.session_tracker().current_token(&link).is_none());
}

// ============================================================================
// Listings and queries
// ============================================================================

#[tokio::test]
async fn test_item_query_without_partition_needs_opt_in() {
    let (client, store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();

    let result = orders
        .query_items(Query::select_all(), &RequestOptions::new())
        .await;

    assert_err!(&result);
    assert!(matches!(
        result,
        Err(CosmosError::CrossPartitionRequired { .. })
    ));
    assert!(store.feed_requests().is_empty());
}

#[tokio::test]
async fn test_list_items_is_primed_with_metadata() {
    let (client, store) = client_with_store();
    let orders = client
        .database("shop")
        .unwrap()
        .container("orders")
        .unwrap()
        .with_partition_key_definition(PartitionKeyDefinition::new("/customerId"));
    for id in ["1", "2", "3"] {
        orders
            .create_item(&json!({"id": id, "customerId": "c-7"}), &RequestOptions::new())
            .await
            .unwrap();
    }

    let mut items = orders
        .list_items(&RequestOptions::new().with_cross_partition_query(true))
        .await
        .unwrap();
    assert_eq!(store.feed_requests().len(), 1);
    assert_eq!(items.request_charge(), 2.5);

    let all = items.collect_all().await.unwrap();
    let ids: Vec<&str> = all.iter().map(|i| i["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(items.final_metadata().unwrap().page_count, 1);
}

#[tokio::test]
async fn test_list_databases_and_users() {
    let (client, _store) = client_with_store();
    let shop = client.database("shop").unwrap();
    shop.create_user(json!({"id": "alice"}), &RequestOptions::new())
        .await
        .unwrap();
    shop.upsert_user(json!({"id": "bob"}), &RequestOptions::new())
        .await
        .unwrap();

    let databases = client
        .list_databases(&RequestOptions::new())
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(databases, vec![json!({"id": "shop"})]);

    let users = shop
        .list_users(&RequestOptions::new())
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(users.len(), 2);

    let alice = shop
        .get_user("alice", &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(alice.data()["id"], "alice");
    assert!(matches!(
        shop.create_user(json!({"id": "alice"}), &RequestOptions::new())
            .await,
        Err(CosmosError::AlreadyExists { .. })
    ));
}

#[tokio::test]
async fn test_materialized_reference_is_used_verbatim() {
    let (client, store) = client_with_store();
    let shop = client.database("shop").unwrap();

    let properties = shop
        .get_container("orders", &RequestOptions::new())
        .await
        .unwrap();
    let reference = properties.resource_ref().unwrap();
    assert_eq!(
        reference,
        ResourceRef::Materialized("dbs/shop/colls/orders/".to_string())
    );

    let orders = shop.container(reference).unwrap();
    assert_eq!(orders.link().as_str(), "dbs/shop/colls/orders/");
    assert_eq!(orders.id(), "orders");
    assert_eq!(store.point_requests().len(), 1);
}

#[tokio::test]
async fn test_change_feed_through_container() {
    let (client, _store) = client_with_store();
    let orders = client
        .database("shop")
        .unwrap()
        .container("orders")
        .unwrap()
        .with_partition_key_definition(PartitionKeyDefinition::new("/customerId"));
    orders
        .upsert_item(&json!({"id": "1", "customerId": "c-7"}), &RequestOptions::new())
        .await
        .unwrap();

    let mut feed = orders
        .query_items_change_feed(true, &RequestOptions::new())
        .await
        .unwrap();
    let changes = feed.collect_all().await.unwrap();

    assert_eq!(changes.len(), 1);
    assert!(feed.final_metadata().is_some());
}

// ============================================================================
// Server-side scripts
// ============================================================================

#[tokio::test]
async fn test_stored_procedure_lifecycle() {
    let (client, store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();
    let options = RequestOptions::new();
    let procedure = json!({"id": "bulkImport", "body": "function () {}"});

    let created = orders
        .create_stored_procedure(procedure.clone(), &options)
        .await
        .unwrap();
    assert_eq!(created.status_code(), 201);
    assert!(store.get("dbs/shop/colls/orders/sprocs/bulkImport").is_some());
    assert!(matches!(
        orders.create_stored_procedure(procedure, &options).await,
        Err(CosmosError::AlreadyExists { .. })
    ));

    let replaced = json!({"id": "bulkImport", "body": "function () { return 1; }"});
    assert_ok!(
        orders
            .replace_stored_procedure("bulkImport", replaced.clone(), &options)
            .await
    );
    let read = orders
        .get_stored_procedure("bulkImport", &options)
        .await
        .unwrap();
    assert_eq!(read.data(), &replaced);

    let listed = orders
        .list_stored_procedures(&options)
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(listed, vec![replaced]);

    assert_ok!(orders.delete_stored_procedure("bulkImport", &options).await);
    assert_err!(orders.get_stored_procedure("bulkImport", &options).await);

    let writes: Vec<_> = store
        .point_requests()
        .into_iter()
        .filter(|r| r.operation != Operation::Read)
        .collect();
    assert!(writes
        .iter()
        .all(|r| r.resource_type == ResourceType::StoredProcedure));
    assert!(writes
        .iter()
        .all(|r| r.parent.as_str() == "dbs/shop/colls/orders"));
}

#[tokio::test]
async fn test_triggers_and_functions_are_listed_separately() {
    let (client, _store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();
    let options = RequestOptions::new();

    orders
        .upsert_trigger(
            json!({
                "id": "stampCreated",
                "body": "function () {}",
                "triggerType": "Pre",
                "triggerOperation": "Create"
            }),
            &options,
        )
        .await
        .unwrap();
    orders
        .create_user_defined_function(json!({"id": "tax", "body": "function (x) { return x; }"}), &options)
        .await
        .unwrap();
    orders
        .upsert_user_defined_function(json!({"id": "discount", "body": "function (x) { return x; }"}), &options)
        .await
        .unwrap();

    let triggers = orders
        .list_triggers(&options)
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0]["triggerType"], "Pre");

    let mut functions = orders
        .query_user_defined_functions(Query::select_all(), &options)
        .await
        .unwrap();
    assert_eq!(functions.partition_count(), 1);
    let ids: Vec<String> = functions
        .collect_all()
        .await
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["discount", "tax"]);

    let trigger = orders.get_trigger("stampCreated", &options).await.unwrap();
    assert_eq!(trigger.data()["triggerOperation"], "Create");
    assert_ok!(orders.delete_user_defined_function("tax", &options).await);
    assert!(matches!(
        orders.delete_trigger("missing", &options).await,
        Err(CosmosError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_script_writes_reject_partition_key() {
    let (client, store) = client_with_store();
    let orders = client.database("shop").unwrap().container("orders").unwrap();

    let result = orders
        .create_trigger(
            json!({"id": "t", "body": "function () {}"}),
            &RequestOptions::new().with_partition_key("c-7"),
        )
        .await;

    assert!(matches!(
        result,
        Err(CosmosError::InvalidOption { ref option, .. }) if option == "partitionKey"
    ));
    assert_eq!(store.calls(), 0);
}
