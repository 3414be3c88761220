//! Account handlers

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{
    ApiResult, CreateAccountRequest, PageQuery, Principal, created, ok,
};
use crate::ledger::{Account, Entry};

/// POST /api/v1/accounts
///
/// Opens an account in the requested currency for the caller, balance 0.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(Principal(owner)): Extension<Principal>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<Account> {
    req.validate()?;
    let account = state.accounts.open_account(&owner, &req.currency).await?;
    created(account)
}

/// GET /api/v1/accounts/{id}
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(Principal(owner)): Extension<Principal>,
    Path(id): Path<i64>,
) -> ApiResult<Account> {
    ok(state.accounts.get_account(&owner, id).await?)
}

/// GET /api/v1/accounts?page_id=&page_size=
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(Principal(owner)): Extension<Principal>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<Account>> {
    page.validate()?;
    let accounts = state
        .accounts
        .list_accounts(&owner, page.page_id, page.page_size)
        .await?;
    ok(accounts)
}

/// DELETE /api/v1/accounts/{id}
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(Principal(owner)): Extension<Principal>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.accounts.delete_account(&owner, id).await?;
    ok(())
}

/// GET /api/v1/accounts/{id}/entries?page_id=&page_size=
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(Principal(owner)): Extension<Principal>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<Entry>> {
    page.validate()?;
    let entries = state
        .accounts
        .account_entries(&owner, id, page.page_id, page.page_size)
        .await?;
    ok(entries)
}
