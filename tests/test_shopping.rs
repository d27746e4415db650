//! Shopping list service against a mocked Supabase project.

mod common;

use common::*;
use pantry::AppError;
use pantry::models::ListItemRow;
use pantry::shopping::{DEFAULT_LIST_NAME, ShoppingListService};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIST_ID: &str = "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";

fn ids() -> (Uuid, Uuid, Uuid) {
    (
        Uuid::parse_str(GROUP_ID).unwrap(),
        Uuid::parse_str(USER_ID).unwrap(),
        Uuid::parse_str(LIST_ID).unwrap(),
    )
}

#[tokio::test]
async fn existing_active_shopping_list_is_reused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/lists"))
        .and(query_param("group_id", format!("eq.{GROUP_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "list_id": Uuid::new_v4(),
                "group_id": GROUP_ID,
                "name": "Old",
                "list_type": "shopping",
                "created_by_user": USER_ID,
                "archived_at": "2024-02-01T00:00:00Z"
            },
            {
                "list_id": LIST_ID,
                "group_id": GROUP_ID,
                "name": "Groceries",
                "list_type": "SHOPPING",
                "created_by_user": USER_ID
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/lists"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let (group_id, user_id, list_id) = ids();
    let list = ShoppingListService::new(service(&server))
        .get_or_create_shopping_list(group_id, user_id)
        .await
        .unwrap();
    assert_eq!(list.list_id, list_id);
    assert_eq!(list.name, "Groceries");
}

#[tokio::test]
async fn missing_list_is_created() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/lists"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({
            "group_id": GROUP_ID,
            "name": DEFAULT_LIST_NAME,
            "list_type": "shopping",
            "created_by_user": USER_ID
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "list_id": LIST_ID,
            "group_id": GROUP_ID,
            "name": DEFAULT_LIST_NAME,
            "list_type": "shopping",
            "created_by_user": USER_ID
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let (group_id, user_id, list_id) = ids();
    let list = ShoppingListService::new(service(&server))
        .get_or_create_shopping_list(group_id, user_id)
        .await
        .unwrap();
    assert_eq!(list.list_id, list_id);
}

#[tokio::test]
async fn items_come_back_unchecked_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/list_items"))
        .and(query_param("list_id", format!("eq.{LIST_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "list_item_id": Uuid::new_v4(), "list_id": LIST_ID, "custom_name": "Eggs", "is_checked": true },
            { "list_item_id": Uuid::new_v4(), "list_id": LIST_ID, "custom_name": "milk" },
            { "list_item_id": Uuid::new_v4(), "list_id": LIST_ID, "custom_name": "Bread" }
        ])))
        .mount(&server)
        .await;

    let (_, _, list_id) = ids();
    let items = ShoppingListService::new(service(&server))
        .items(list_id)
        .await
        .unwrap();
    let names: Vec<&str> = items
        .iter()
        .filter_map(|i| i.custom_name.as_deref())
        .collect();
    assert_eq!(names, vec!["Bread", "milk", "Eggs"]);
}

#[tokio::test]
async fn custom_item_is_normalised_before_insert() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/list_items"))
        .and(body_partial_json(json!({
            "list_id": LIST_ID,
            "custom_name": "Milk",
            "quantity": 1.0,
            "unit": "l",
            "is_checked": false,
            "added_by_user": USER_ID
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "list_item_id": Uuid::new_v4(),
            "list_id": LIST_ID,
            "custom_name": "Milk",
            "quantity": 1.0,
            "unit": "l"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let (_, user_id, list_id) = ids();
    let shopping = ShoppingListService::new(service(&server));
    let row = shopping
        .add_custom(list_id, user_id, "  Milk ", -3.0, Some(" l "))
        .await
        .unwrap();
    assert_eq!(row.custom_name.as_deref(), Some("Milk"));

    let blank = shopping.add_custom(list_id, user_id, "   ", 1.0, None).await;
    assert!(matches!(blank, Err(AppError::InvalidInput(_))));
}

#[tokio::test]
async fn toggle_patches_row_by_primary_key() {
    let server = MockServer::start().await;
    let item_id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/list_items"))
        .and(query_param("list_item_id", format!("eq.{item_id}")))
        .and(body_partial_json(json!({ "is_checked": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "list_item_id": item_id,
            "list_id": LIST_ID,
            "custom_name": "Milk",
            "is_checked": true
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let row = ListItemRow {
        list_item_id: item_id,
        list_id: Uuid::parse_str(LIST_ID).unwrap(),
        item_id: None,
        custom_name: Some("Milk".to_string()),
        quantity: 1.0,
        unit: None,
        is_checked: false,
        added_by_user: None,
        created_at: None,
    };
    let toggled = ShoppingListService::new(service(&server))
        .toggle_checked(&row)
        .await
        .unwrap();
    assert!(toggled.is_checked);
}

#[tokio::test]
async fn user_group_comes_from_first_membership() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/group_members"))
        .and(query_param("user_id", format!("eq.{USER_ID}")))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([membership_row("owner")])))
        .mount(&server)
        .await;

    let (group_id, user_id, _) = ids();
    let found = ShoppingListService::new(service(&server))
        .user_group_id(user_id)
        .await
        .unwrap();
    assert_eq!(found, Some(group_id));
}
