//! Route definitions for `/menus`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::menus;
use crate::state::AppState;

/// Routes mounted at `/menus`.
///
/// ```text
/// GET    /                        -> list_menus        (menus:read)
/// POST   /                        -> create_menu       (menus:create)
/// GET    /visible                 -> visible_menus     (any authenticated user)
/// POST   /manage                  -> manage_menus      (menus:update)
/// GET    /name/{name}             -> get_menu_by_name  (menus:read)
/// GET    /{id}                    -> get_menu          (menus:read)
/// PUT    /{id}                    -> update_menu       (menus:update)
/// DELETE /{id}                    -> delete_menu       (menus:delete)
/// POST   /{id}/duplicate          -> duplicate_menu    (menus:create)
/// POST   /{id}/items              -> add_item          (menus:update)
/// PUT    /{id}/items/{item_id}    -> update_item       (menus:update)
/// DELETE /{id}/items/{item_id}    -> delete_item       (menus:update)
/// PUT    /{id}/reorder            -> reorder_items     (menus:update)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(menus::list_menus).post(menus::create_menu))
        .route("/visible", get(menus::visible_menus))
        .route("/manage", post(menus::manage_menus))
        .route("/name/{name}", get(menus::get_menu_by_name))
        .route(
            "/{id}",
            get(menus::get_menu)
                .put(menus::update_menu)
                .delete(menus::delete_menu),
        )
        .route("/{id}/duplicate", post(menus::duplicate_menu))
        .route("/{id}/items", post(menus::add_item))
        .route(
            "/{id}/items/{item_id}",
            put(menus::update_item).delete(menus::delete_item),
        )
        .route("/{id}/reorder", put(menus::reorder_items))
}
