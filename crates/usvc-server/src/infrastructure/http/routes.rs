//! HTTP handlers.  Each one parses its input, calls one account use case,
//! and shapes the JSON response.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use usvc_core::{Claims, UserId};

use super::errors::ApiError;
use crate::application::accounts::{AccountService, ProfileUpdate, UserView};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
}

// ── Request bodies ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_name: String,
}

// ── Public routes ─────────────────────────────────────────────────────────────

pub async fn health() -> &'static str {
    "ok"
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body?;
    let user = state
        .accounts
        .register(&req.email, &req.password, &req.full_name)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": user.id, "email": user.email })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body?;
    let session = state.accounts.login(&req.email, &req.password).await?;
    Ok(Json(json!({
        "token": session.token,
        "user": {
            "id": session.user.id,
            "email": session.user.email,
            "full_name": session.user.full_name,
        },
    })))
}

// ── Gated routes ──────────────────────────────────────────────────────────────

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<UserView>>, ApiError> {
    Ok(Json(state.accounts.list_users(&claims).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<UserView>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.accounts.get_user(&claims, UserId::new(id)).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<u64>, PathRejection>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserView>, ApiError> {
    let Path(id) = id?;
    let Json(req) = body?;
    let update = ProfileUpdate {
        full_name: req.full_name,
        password: req.password,
    };
    Ok(Json(
        state
            .accounts
            .update_user(&claims, UserId::new(id), update)
            .await?,
    ))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.accounts.delete_user(&claims, UserId::new(id)).await?;
    Ok(Json(json!({ "status": "deleted" })))
}

pub async fn create_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<CreateRoleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = body?;
    let role = state.accounts.create_role(&claims, &req.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": role.id, "name": role.name })),
    ))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<u64>, PathRejection>,
    body: Result<Json<AssignRoleRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let Json(req) = body?;
    state
        .accounts
        .assign_role(&claims, UserId::new(id), &req.role_name)
        .await?;
    Ok(Json(json!({ "status": "assigned" })))
}
