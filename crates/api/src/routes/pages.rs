//! Route definitions for `/pages`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::pages;
use crate::state::AppState;

/// Routes mounted at `/pages`.
///
/// ```text
/// GET    /                                        -> list_pages       (pages:read)
/// POST   /                                        -> create_page      (pages:create)
/// GET    /tree                                    -> page_tree        (pages:read)
/// POST   /manage                                  -> manage_pages     (pages:update)
/// GET    /slug/{slug}                             -> get_page_by_slug (pages:read)
/// GET    /{id}                                    -> get_page         (pages:read)
/// PUT    /{id}                                    -> update_page      (pages:update)
/// DELETE /{id}                                    -> delete_page      (pages:delete)
/// POST   /{id}/publish                            -> publish_page     (pages:update)
/// POST   /{id}/unpublish                          -> unpublish_page   (pages:update)
/// GET    /{id}/versions                           -> list_versions    (pages:update)
/// POST   /{id}/versions/{version_id}/restore      -> restore_version  (pages:update)
/// GET    /{id}/draft                              -> get_draft        (pages:update)
/// PUT    /{id}/draft                              -> save_draft       (pages:update)
/// DELETE /{id}/draft                              -> delete_draft     (pages:update)
/// POST   /{id}/duplicate                          -> duplicate_page   (pages:create)
/// PUT    /{id}/move                               -> move_page        (pages:update)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::list_pages).post(pages::create_page))
        .route("/tree", get(pages::page_tree))
        .route("/manage", post(pages::manage_pages))
        .route("/slug/{slug}", get(pages::get_page_by_slug))
        .route(
            "/{id}",
            get(pages::get_page)
                .put(pages::update_page)
                .delete(pages::delete_page),
        )
        .route("/{id}/publish", post(pages::publish_page))
        .route("/{id}/unpublish", post(pages::unpublish_page))
        .route("/{id}/versions", get(pages::list_versions))
        .route(
            "/{id}/versions/{version_id}/restore",
            post(pages::restore_version),
        )
        .route(
            "/{id}/draft",
            get(pages::get_draft)
                .put(pages::save_draft)
                .delete(pages::delete_draft),
        )
        .route("/{id}/duplicate", post(pages::duplicate_page))
        .route("/{id}/move", put(pages::move_page))
}
