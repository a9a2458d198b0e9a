//! Route handlers of the mock backend.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use basket_core::wire::{
    Account, AddCartItemRequest, AddFavoriteRequest, ErrorBody, LoginRequest, LoginResponse,
    UpdateQuantityRequest,
};
use basket_core::{Product, ProductId, RemoteItem, RemoteItemId, UserId};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{BackendState, Shared, lock};

pub fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/products/{id}", get(product))
        .route(
            "/cart/items",
            get(list_cart).post(add_cart_item).delete(clear_cart),
        )
        .route(
            "/cart/items/{id}",
            patch(update_cart_item).delete(remove_cart_item),
        )
        .route(
            "/favorites",
            get(list_favorites)
                .post(add_favorite)
                .delete(clear_favorites),
        )
        .route("/favorites/{id}", delete(remove_favorite));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// =============================================================================
// Errors and extractors
// =============================================================================

/// Error response, rendered as `{"message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// The account owning the bearer token.
///
/// Also answers 503 while the backend is offline, so every collection
/// endpoint fails the same way.
pub struct CurrentUser(UserId);

impl FromRequestParts<Shared> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Shared) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "missing bearer token"))?;

        let state = lock(state);
        if state.offline {
            return Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "service unavailable",
            ));
        }
        state
            .tokens
            .get(token)
            .copied()
            .map(Self)
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "invalid or expired token"))
    }
}

// =============================================================================
// Auth and catalog
// =============================================================================

async fn login(
    State(state): State<Shared>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let mut state = lock(&state);
    let account = state
        .users
        .iter()
        .find(|u| u.email == body.email && u.password == body.password)
        .map(|u| Account {
            id: u.id,
            email: u.email.clone(),
        })
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "invalid email or password"))?;

    let token = Uuid::new_v4().to_string();
    state.tokens.insert(token.clone(), account.id);
    state.logins += 1;
    Ok(Json(LoginResponse {
        token,
        user: account,
    }))
}

async fn product(
    State(state): State<Shared>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    lock(&state)
        .products
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format_args!("product {id}")))
}

/// Catalog entry for an add, honoring the rejection list.
fn addable(state: &BackendState, product_id: ProductId) -> Result<Product, ApiError> {
    if state.rejected.contains(&product_id) {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("product {product_id} is unavailable"),
        ));
    }
    state
        .products
        .get(&product_id)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format_args!("product {product_id}")))
}

// =============================================================================
// Cart
// =============================================================================

async fn list_cart(
    State(state): State<Shared>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<RemoteItem>> {
    Json(lock(&state).carts.get(&user).cloned().unwrap_or_default())
}

async fn add_cart_item(
    State(state): State<Shared>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<RemoteItem>), ApiError> {
    if body.quantity == 0 {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "quantity must be positive",
        ));
    }
    let mut state = lock(&state);
    let product = addable(&state, body.product_id)?;

    // Adding a product already in the cart merges quantities
    if let Some(item) = state
        .carts
        .get_mut(&user)
        .and_then(|items| items.iter_mut().find(|i| i.product_id == body.product_id))
    {
        item.quantity += body.quantity;
        return Ok((StatusCode::OK, Json(item.clone())));
    }

    let item = state.item(&product, body.quantity);
    state.carts.entry(user).or_default().push(item.clone());
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_cart_item(
    State(state): State<Shared>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RemoteItemId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<RemoteItem>, ApiError> {
    let mut state = lock(&state);
    let item = state
        .carts
        .get_mut(&user)
        .and_then(|items| items.iter_mut().find(|i| i.id == id))
        .ok_or_else(|| ApiError::not_found(format_args!("cart item {id}")))?;
    item.quantity = body.quantity;
    Ok(Json(item.clone()))
}

async fn remove_cart_item(
    State(state): State<Shared>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RemoteItemId>,
) -> Result<StatusCode, ApiError> {
    remove_entry(lock(&state).carts.get_mut(&user), id, "cart item")
}

async fn clear_cart(State(state): State<Shared>, CurrentUser(user): CurrentUser) -> StatusCode {
    lock(&state).carts.remove(&user);
    StatusCode::NO_CONTENT
}

// =============================================================================
// Favorites
// =============================================================================

async fn list_favorites(
    State(state): State<Shared>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<RemoteItem>> {
    Json(lock(&state).favorites.get(&user).cloned().unwrap_or_default())
}

async fn add_favorite(
    State(state): State<Shared>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AddFavoriteRequest>,
) -> Result<(StatusCode, Json<RemoteItem>), ApiError> {
    let mut state = lock(&state);
    let product = addable(&state, body.product_id)?;

    if let Some(item) = state
        .favorites
        .get(&user)
        .and_then(|items| items.iter().find(|i| i.product_id == body.product_id))
    {
        return Ok((StatusCode::OK, Json(item.clone())));
    }

    let item = state.item(&product, 1);
    state.favorites.entry(user).or_default().push(item.clone());
    Ok((StatusCode::CREATED, Json(item)))
}

async fn remove_favorite(
    State(state): State<Shared>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RemoteItemId>,
) -> Result<StatusCode, ApiError> {
    remove_entry(lock(&state).favorites.get_mut(&user), id, "favorite")
}

async fn clear_favorites(
    State(state): State<Shared>,
    CurrentUser(user): CurrentUser,
) -> StatusCode {
    lock(&state).favorites.remove(&user);
    StatusCode::NO_CONTENT
}

fn remove_entry(
    items: Option<&mut Vec<RemoteItem>>,
    id: RemoteItemId,
    what: &str,
) -> Result<StatusCode, ApiError> {
    let items = items.ok_or_else(|| ApiError::not_found(format_args!("{what} {id}")))?;
    let before = items.len();
    items.retain(|i| i.id != id);
    if items.len() == before {
        return Err(ApiError::not_found(format_args!("{what} {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
