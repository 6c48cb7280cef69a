//! HTTP-level tests for `/menus`.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete_auth, get_auth, post_json_auth, put_json_auth, token_for};
use gatehouse_core::permissions::{Action, Permission, PermissionSet, Resource};
use gatehouse_core::roles::RoleName;
use gatehouse_db::repositories::RoleRepo;
use serde_json::{json, Value};
use sqlx::PgPool;

async fn create_menu(app: &axum::Router, token: &str, body: Value) -> Value {
    let response = post_json_auth(app.clone(), "/api/v1/menus", body, token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

fn labels(items: &Value) -> Vec<String> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["label"].as_str().unwrap().to_string())
        .collect()
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn create_with_items_and_fetch_by_name(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;

    let menu = create_menu(
        &app,
        &admin,
        json!({ "name": "main", "items": [
            { "label": "Home", "url": "/" },
            { "label": "Admin", "url": "/admin", "roles": ["Admin"] },
        ]}),
    )
    .await;
    assert_eq!(labels(&menu["items"]), ["Home", "Admin"]);

    let denied = post_json_auth(app.clone(), "/api/v1/menus", json!({ "name": "x" }), &editor)
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let by_name = get_auth(app.clone(), "/api/v1/menus/name/main", &editor).await;
    assert_eq!(by_name.status(), StatusCode::OK);
    assert_eq!(body_json(by_name).await["data"]["id"], menu["id"]);

    let missing = get_auth(app, "/api/v1/menus/name/footer", &editor).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn repeated_label_is_409(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;

    let response = post_json_auth(
        app.clone(),
        "/api/v1/menus",
        json!({ "name": "dupes", "items": [
            { "label": "Docs", "url": "/docs" },
            { "label": "Docs", "url": "/docs2" },
        ]}),
        &admin,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let menu = create_menu(&app, &admin, json!({ "name": "single" })).await;
    let uri = format!("/api/v1/menus/{}/items", menu["id"]);
    let first = post_json_auth(app.clone(), &uri, json!({ "label": "Blog", "url": "/blog" }), &admin)
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = post_json_auth(app, &uri, json!({ "label": "Blog", "url": "/b" }), &admin).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn visible_menus_filter_items_by_role(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let viewer = token_for(&pool, &app, "vicky", RoleName::Viewer).await;
    create_menu(
        &app,
        &admin,
        json!({ "name": "nav", "items": [
            { "label": "Home", "url": "/" },
            { "label": "Settings", "url": "/settings", "roles": ["Admin", "Editor"] },
            { "label": "Help", "url": "/help", "roles": ["Viewer"] },
        ]}),
    )
    .await;

    let as_viewer = body_json(get_auth(app.clone(), "/api/v1/menus/visible", &viewer).await).await;
    assert_eq!(labels(&as_viewer["data"][0]["items"]), ["Home", "Help"]);

    let as_admin = body_json(get_auth(app, "/api/v1/menus/visible", &admin).await).await;
    assert_eq!(labels(&as_admin["data"][0]["items"]), ["Home", "Settings"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn item_roles_must_name_known_roles(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let menu = create_menu(&app, &admin, json!({ "name": "strict" })).await;

    let response = post_json_auth(
        app,
        &format!("/api/v1/menus/{}/items", menu["id"]),
        json!({ "label": "Secret", "url": "/s", "roles": ["Superuser"] }),
        &admin,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn reorder_follows_given_ids(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let menu = create_menu(
        &app,
        &admin,
        json!({ "name": "ordered", "items": [
            { "label": "A", "url": "/a" },
            { "label": "B", "url": "/b" },
            { "label": "C", "url": "/c" },
        ]}),
    )
    .await;
    let ids: Vec<i64> = menu["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect();

    let response = put_json_auth(
        app,
        &format!("/api/v1/menus/{}/reorder", menu["id"]),
        json!({ "item_ids": [ids[2], ids[0], ids[1], 999999] }),
        &admin,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(labels(&body_json(response).await["data"]), ["C", "A", "B"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_copies_items_and_delete_removes_menu(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let menu = create_menu(
        &app,
        &admin,
        json!({ "name": "source", "items": [{ "label": "One", "url": "/1" }] }),
    )
    .await;

    let copy = post_json_auth(
        app.clone(),
        &format!("/api/v1/menus/{}/duplicate", menu["id"]),
        json!({ "name": "copy" }),
        &admin,
    )
    .await;
    assert_eq!(copy.status(), StatusCode::CREATED);
    let copy = body_json(copy).await["data"].clone();
    assert_eq!(copy["name"], "copy");
    assert_eq!(labels(&copy["items"]), ["One"]);
    assert_ne!(copy["items"][0]["id"], menu["items"][0]["id"]);

    let uri = format!("/api/v1/menus/{}", menu["id"]);
    let deleted = delete_auth(app.clone(), &uri, &admin).await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let gone = get_auth(app, &uri, &admin).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn manage_mixes_menu_and_item_operations(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let menu = create_menu(&app, &admin, json!({ "name": "bulk" })).await;
    let menu_id = menu["id"].as_i64().unwrap();

    let response = post_json_auth(
        app,
        "/api/v1/menus/manage",
        json!({ "operations": [
            { "action": "add_item", "data": { "menu_id": menu_id, "label": "Top", "url": "/top" } },
            { "action": "update", "data": { "id": menu_id, "name": "bulk-renamed" } },
            { "action": "remove_item", "data": { "menu_id": menu_id, "item_id": 999999 } },
        ]}),
        &admin,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await["data"]["results"].clone();
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["item"]["label"], "Top");
    assert_eq!(results[1]["menu"]["name"], "bulk-renamed");
    assert_eq!(results[2]["success"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn manage_denies_delete_without_menus_delete(pool: PgPool) {
    let editor_role = RoleRepo::find_by_name(&pool, "Editor").await.unwrap().unwrap();
    let permissions = PermissionSet::new(vec![Permission::new(
        Resource::Menus,
        &[Action::Read, Action::Update],
    )]);
    RoleRepo::update(&pool, editor_role.id, None, Some(&permissions))
        .await
        .unwrap();

    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let menu = create_menu(&app, &admin, json!({ "name": "guarded" })).await;

    let response = post_json_auth(
        app.clone(),
        "/api/v1/menus/manage",
        json!({ "operations": [
            { "action": "delete", "data": { "id": menu["id"] } },
            { "action": "create", "data": { "name": "sneaky" } },
            { "action": "update", "data": { "id": menu["id"], "name": "guarded-2" } },
        ]}),
        &editor,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await["data"]["results"].clone();
    assert_eq!(results[0]["success"], false);
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[2]["success"], true);

    let kept = get_auth(app.clone(), &format!("/api/v1/menus/{}", menu["id"]), &editor).await;
    assert_eq!(kept.status(), StatusCode::OK);
    let missing = get_auth(app, "/api/v1/menus/name/sneaky", &editor).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
