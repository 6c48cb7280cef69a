//! HTTP-level tests for `/pages`.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete_auth, get_auth, post_json_auth, put_json_auth, token_for};
use gatehouse_core::roles::RoleName;
use serde_json::{json, Value};
use sqlx::PgPool;

/// Create a page as `token` and return its JSON.
async fn create_page(app: &axum::Router, token: &str, body: Value) -> Value {
    let response = post_json_auth(app.clone(), "/api/v1/pages", body, token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// CRUD and visibility
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn create_derives_slug_and_viewer_cannot_create(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let viewer = token_for(&pool, &app, "vicky", RoleName::Viewer).await;

    let page = create_page(&app, &editor, json!({ "title": "About Our Team!" })).await;
    assert_eq!(page["slug"], "about-our-team");
    assert_eq!(page["is_published"], false);

    let denied = post_json_auth(app.clone(), "/api/v1/pages", json!({ "title": "Nope" }), &viewer)
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let duplicate =
        post_json_auth(app, "/api/v1/pages", json!({ "title": "About our team" }), &editor).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

/// Callers without pages:update never see unpublished pages, by list, id or slug.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn unpublished_pages_are_hidden_from_readers(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let viewer = token_for(&pool, &app, "vicky", RoleName::Viewer).await;

    let draft = create_page(&app, &editor, json!({ "title": "Hidden" })).await;
    let live = create_page(&app, &editor, json!({ "title": "Live" })).await;
    let publish = post_json_auth(
        app.clone(),
        &format!("/api/v1/pages/{}/publish", live["id"]),
        json!({}),
        &editor,
    )
    .await;
    assert_eq!(publish.status(), StatusCode::OK);

    let listed = get_auth(app.clone(), "/api/v1/pages", &viewer).await;
    let data = body_json(listed).await["data"].clone();
    assert_eq!(data["total"], 1);
    assert_eq!(data["pages"][0]["slug"], "live");

    let by_id = get_auth(app.clone(), &format!("/api/v1/pages/{}", draft["id"]), &viewer).await;
    assert_eq!(by_id.status(), StatusCode::NOT_FOUND);
    let by_slug = get_auth(app.clone(), "/api/v1/pages/slug/hidden", &viewer).await;
    assert_eq!(by_slug.status(), StatusCode::NOT_FOUND);

    let editor_view = get_auth(app, "/api/v1/pages", &editor).await;
    assert_eq!(body_json(editor_view).await["data"]["total"], 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn delete_requires_pages_delete(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let admin = token_for(&pool, &app, "root", RoleName::Admin).await;
    let page = create_page(&app, &editor, json!({ "title": "Short lived" })).await;
    let uri = format!("/api/v1/pages/{}", page["id"]);

    let denied = delete_auth(app.clone(), &uri, &editor).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let response = delete_auth(app.clone(), &uri, &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    let gone = get_auth(app, &uri, &admin).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Publishing, versions and drafts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn publish_snapshots_and_restore_keeps_replaced_content(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let page = create_page(&app, &editor, json!({ "title": "Policy", "content": "v1" })).await;
    let id = page["id"].as_i64().unwrap();

    post_json_auth(app.clone(), &format!("/api/v1/pages/{id}/publish"), json!({}), &editor).await;
    let updated = put_json_auth(
        app.clone(),
        &format!("/api/v1/pages/{id}"),
        json!({ "content": "v2" }),
        &editor,
    )
    .await;
    assert_eq!(body_json(updated).await["data"]["content"], "v2");

    let versions = get_auth(app.clone(), &format!("/api/v1/pages/{id}/versions"), &editor).await;
    assert_eq!(versions.status(), StatusCode::OK);
    let versions = body_json(versions).await;
    assert_eq!(versions["pagination"]["total"], 1);
    let version_id = versions["data"][0]["id"].as_i64().unwrap();
    assert_eq!(versions["data"][0]["content"], "v1");

    let restored = post_json_auth(
        app.clone(),
        &format!("/api/v1/pages/{id}/versions/{version_id}/restore"),
        json!({}),
        &editor,
    )
    .await;
    assert_eq!(restored.status(), StatusCode::OK);
    assert_eq!(body_json(restored).await["data"]["content"], "v1");

    let versions = get_auth(app.clone(), &format!("/api/v1/pages/{id}/versions"), &editor).await;
    assert_eq!(body_json(versions).await["pagination"]["total"], 2);

    let missing = post_json_auth(
        app,
        &format!("/api/v1/pages/{id}/versions/999999/restore"),
        json!({}),
        &editor,
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn unpublish_hides_page_again(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let viewer = token_for(&pool, &app, "vicky", RoleName::Viewer).await;
    let page = create_page(&app, &editor, json!({ "title": "Seasonal" })).await;
    let id = page["id"].as_i64().unwrap();

    post_json_auth(app.clone(), &format!("/api/v1/pages/{id}/publish"), json!({}), &editor).await;
    let visible = get_auth(app.clone(), "/api/v1/pages/slug/seasonal", &viewer).await;
    assert_eq!(visible.status(), StatusCode::OK);

    let response =
        post_json_auth(app.clone(), &format!("/api/v1/pages/{id}/unpublish"), json!({}), &editor)
            .await;
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["is_published"], false);
    assert!(data["unpublished_at"].is_string());

    let hidden = get_auth(app, "/api/v1/pages/slug/seasonal", &viewer).await;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn draft_slot_round_trip(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let page = create_page(&app, &editor, json!({ "title": "Drafty", "content": "live" })).await;
    let uri = format!("/api/v1/pages/{}/draft", page["id"]);

    let saved = put_json_auth(app.clone(), &uri, json!({ "content": "work in progress" }), &editor)
        .await;
    assert_eq!(saved.status(), StatusCode::OK);

    let draft = body_json(get_auth(app.clone(), &uri, &editor).await).await["data"].clone();
    assert_eq!(draft["draft_content"], "work in progress");
    assert!(draft["draft_saved_at"].is_string());

    let page_now =
        get_auth(app.clone(), &format!("/api/v1/pages/{}", page["id"]), &editor).await;
    assert_eq!(body_json(page_now).await["data"]["content"], "live");

    let deleted = delete_auth(app.clone(), &uri, &editor).await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let draft = body_json(get_auth(app, &uri, &editor).await).await["data"].clone();
    assert!(draft["draft_content"].is_null());
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// Moving a page under its own descendant is rejected with 400.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn move_rejects_cycles_and_tree_nests_children(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let root = create_page(&app, &editor, json!({ "title": "Docs" })).await;
    let child = create_page(
        &app,
        &editor,
        json!({ "title": "Guide", "parent_id": root["id"] }),
    )
    .await;

    let cycle = put_json_auth(
        app.clone(),
        &format!("/api/v1/pages/{}/move", root["id"]),
        json!({ "parent_id": child["id"] }),
        &editor,
    )
    .await;
    assert_eq!(cycle.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(cycle).await["error"],
        "A page cannot be moved under itself or one of its descendants"
    );

    let missing_parent = put_json_auth(
        app.clone(),
        &format!("/api/v1/pages/{}/move", child["id"]),
        json!({ "parent_id": 999999 }),
        &editor,
    )
    .await;
    assert_eq!(missing_parent.status(), StatusCode::NOT_FOUND);

    let tree = body_json(get_auth(app.clone(), "/api/v1/pages/tree", &editor).await).await;
    let top = tree["data"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["children"][0]["slug"], "guide");

    let to_top = put_json_auth(
        app,
        &format!("/api/v1/pages/{}/move", child["id"]),
        json!({ "parent_id": null, "sort_order": 5 }),
        &editor,
    )
    .await;
    assert_eq!(to_top.status(), StatusCode::OK);
    let data = body_json(to_top).await["data"].clone();
    assert!(data["parent_id"].is_null());
    assert_eq!(data["sort_order"], 5);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_copies_content_unpublished(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let page = create_page(&app, &editor, json!({ "title": "Pricing", "content": "$$" })).await;
    post_json_auth(
        app.clone(),
        &format!("/api/v1/pages/{}/publish", page["id"]),
        json!({}),
        &editor,
    )
    .await;

    let response = post_json_auth(
        app,
        &format!("/api/v1/pages/{}/duplicate", page["id"]),
        json!({}),
        &editor,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let copy = body_json(response).await["data"].clone();
    assert_eq!(copy["title"], "Copy of Pricing");
    assert_eq!(copy["slug"], "copy-of-pricing");
    assert_eq!(copy["content"], "$$");
    assert_eq!(copy["is_published"], false);
}

// ---------------------------------------------------------------------------
// Bulk
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn manage_continues_past_failures(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;

    let response = post_json_auth(
        app.clone(),
        "/api/v1/pages/manage",
        json!({ "operations": [
            { "action": "create", "data": { "title": "Bulk One" } },
            { "action": "publish", "data": { "id": 999999 } },
            { "action": "create", "data": { "title": "Bulk Two", "slug": "bulk-two" } },
        ]}),
        &editor,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await["data"]["results"].clone();
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["page"]["slug"], "bulk-one");
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[2]["success"], true);

    let not_array = post_json_auth(
        app,
        "/api/v1/pages/manage",
        json!({ "operations": { "action": "create" } }),
        &editor,
    )
    .await;
    assert_eq!(not_array.status(), StatusCode::BAD_REQUEST);
}

/// Bulk operations are held to the permission of their single endpoint.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn manage_denies_operations_the_role_lacks(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let editor = token_for(&pool, &app, "eddy", RoleName::Editor).await;
    let page = create_page(&app, &editor, json!({ "title": "Keep Me" })).await;
    let uri = format!("/api/v1/pages/{}", page["id"]);

    let single = delete_auth(app.clone(), &uri, &editor).await;
    assert_eq!(single.status(), StatusCode::FORBIDDEN);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/pages/manage",
        json!({ "operations": [
            { "action": "delete", "data": { "id": page["id"] } },
            { "action": "publish", "data": { "id": page["id"] } },
        ]}),
        &editor,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await["data"]["results"].clone();
    assert_eq!(results[0]["success"], false);
    assert_eq!(
        results[0]["message"],
        "Access denied: delete permission required on pages"
    );
    assert_eq!(results[1]["success"], true);

    let still_there = get_auth(app, &uri, &editor).await;
    assert_eq!(still_there.status(), StatusCode::OK);
}
