//! HTTP-level tests for `/roles`.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, delete_auth, delete_json_auth, get_auth, post_json_auth, put_json_auth, seed_user,
    token_for,
};
use gatehouse_core::roles::RoleName;
use gatehouse_db::repositories::{RoleRepo, UserRepo};
use serde_json::json;
use sqlx::PgPool;

async fn role_id(pool: &PgPool, name: &str) -> i64 {
    RoleRepo::find_by_name(pool, name).await.unwrap().unwrap().id
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn roles_require_admin(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;

    let denied = get_auth(app.clone(), "/api/v1/roles", &editor).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let response = get_auth(app, "/api/v1/roles", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    let names: Vec<String> = body_json(response).await["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"Viewer".to_string()));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn fallback_and_admin_roles_cannot_be_deleted(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let viewer_id = role_id(&pool, "Viewer").await;
    let admin_id = role_id(&pool, "Admin").await;

    let response = delete_auth(app.clone(), &format!("/api/v1/roles/{viewer_id}"), &admin).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = delete_auth(app.clone(), &format!("/api/v1/roles/{admin_id}"), &admin).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let rename = put_json_auth(
        app,
        &format!("/api/v1/roles/{viewer_id}"),
        json!({ "name": "Editor" }),
        &admin,
    )
    .await;
    assert_eq!(rename.status(), StatusCode::CONFLICT);
}

/// Members of a deleted role land in Viewer in the same transaction.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn deleting_role_moves_members_to_viewer(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let first = seed_user(&pool, "ed1", RoleName::Editor).await;
    seed_user(&pool, "ed2", RoleName::Editor).await;
    let editor_id = role_id(&pool, "Editor").await;

    let response = delete_auth(app.clone(), &format!("/api/v1/roles/{editor_id}"), &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["reassigned_users"], 2);

    let moved = UserRepo::find_response(&pool, first.id).await.unwrap().unwrap();
    assert_eq!(moved.role, "Viewer");

    // The name is free again.
    let recreated = post_json_auth(
        app,
        "/api/v1/roles",
        json!({ "name": "Editor", "permissions": [{ "resource": "pages", "actions": ["read"] }] }),
        &admin,
    )
    .await;
    assert_eq!(recreated.status(), StatusCode::CREATED);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn creating_existing_role_is_409(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;

    let response = post_json_auth(app, "/api/v1/roles", json!({ "name": "Editor" }), &admin).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn permissions_update_applies_to_members(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let viewer = token_for(&pool, &app, "vicky", RoleName::Viewer).await;
    let viewer_id = role_id(&pool, "Viewer").await;

    let before = get_auth(app.clone(), "/api/v1/users", &viewer).await;
    assert_eq!(before.status(), StatusCode::FORBIDDEN);

    let response = put_json_auth(
        app.clone(),
        &format!("/api/v1/roles/{viewer_id}/permissions"),
        json!({ "permissions": [
            { "resource": "users", "actions": ["read"] },
            { "resource": "pages", "actions": ["read"] },
        ]}),
        &admin,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let after = get_auth(app.clone(), "/api/v1/users", &viewer).await;
    assert_eq!(after.status(), StatusCode::OK);

    let listed = get_auth(app, &format!("/api/v1/roles/{viewer_id}/permissions"), &admin).await;
    let data = body_json(listed).await["data"].clone();
    assert_eq!(data["role"], "Viewer");
    assert_eq!(data["permissions"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn assign_and_remove_members(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let user = seed_user(&pool, "hopper", RoleName::Viewer).await;
    let editor_id = role_id(&pool, "Editor").await;
    let viewer_id = role_id(&pool, "Viewer").await;
    let members_uri = format!("/api/v1/roles/{editor_id}/users");

    let empty = post_json_auth(app.clone(), &members_uri, json!({ "user_ids": [] }), &admin).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let assigned =
        post_json_auth(app.clone(), &members_uri, json!({ "user_ids": [user.id] }), &admin).await;
    assert_eq!(assigned.status(), StatusCode::OK);
    assert_eq!(body_json(assigned).await["data"]["updated"], 1);

    let members = get_auth(app.clone(), &members_uri, &admin).await;
    assert_eq!(body_json(members).await["data"][0]["username"], "hopper");

    let from_viewer = delete_json_auth(
        app.clone(),
        &format!("/api/v1/roles/{viewer_id}/users"),
        json!({ "user_ids": [user.id] }),
        &admin,
    )
    .await;
    assert_eq!(from_viewer.status(), StatusCode::BAD_REQUEST);

    let removed =
        delete_json_auth(app, &members_uri, json!({ "user_ids": [user.id] }), &admin).await;
    assert_eq!(removed.status(), StatusCode::OK);
    let stored = UserRepo::find_response(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(stored.role, "Viewer");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn manage_reports_each_operation(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let viewer_id = role_id(&pool, "Viewer").await;
    let editor_id = role_id(&pool, "Editor").await;

    let response = post_json_auth(
        app,
        "/api/v1/roles/manage",
        json!({ "operations": [
            { "action": "delete", "data": { "id": viewer_id } },
            { "action": "update", "data": {
                "id": editor_id,
                "permissions": [{ "resource": "menus", "actions": ["read", "update"] }]
            }},
            { "action": "promote", "data": {} },
        ]}),
        &admin,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await["data"]["results"].clone();
    assert_eq!(results[0]["success"], false);
    assert_eq!(results[1]["success"], true);
    assert_eq!(results[1]["role"]["name"], "Editor");
    assert_eq!(results[2]["action"], "promote");
    assert_eq!(results[2]["message"], "Invalid action");
}

/// Admin keeps its name even once the target name is free.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn admin_role_cannot_be_renamed(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let admin_id = role_id(&pool, "Admin").await;
    let editor_id = role_id(&pool, "Editor").await;

    let response = delete_auth(app.clone(), &format!("/api/v1/roles/{editor_id}"), &admin).await;
    assert_eq!(response.status(), StatusCode::OK);

    let rename = put_json_auth(
        app.clone(),
        &format!("/api/v1/roles/{admin_id}"),
        json!({ "name": "Editor" }),
        &admin,
    )
    .await;
    assert_eq!(rename.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(rename).await["error"], "The Admin role cannot be renamed");

    let response = post_json_auth(
        app.clone(),
        "/api/v1/roles/manage",
        json!({ "operations": [
            { "action": "update", "data": { "id": admin_id, "name": "Editor" } },
        ]}),
        &admin,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await["data"]["results"].clone();
    assert_eq!(results[0]["success"], false);
    assert_eq!(results[0]["message"], "The Admin role cannot be renamed");

    let stored = RoleRepo::find_by_id(&pool, admin_id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Admin");
    let response = get_auth(app, "/api/v1/roles", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
}
