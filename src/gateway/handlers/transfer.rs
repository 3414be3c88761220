//! Transfer handlers

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiResult, CreateTransferRequest, Principal, created, ok};
use crate::ledger::Transfer;
use crate::transfer::{TransferRequest, TransferTxResult};

/// POST /api/v1/transfers
///
/// Moves funds out of an account the caller owns. The response carries the
/// transfer, both entries and both updated accounts.
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(Principal(principal)): Extension<Principal>,
    Json(req): Json<CreateTransferRequest>,
) -> ApiResult<TransferTxResult> {
    req.validate()?;
    tracing::info!(
        principal = %principal,
        from = req.from_account_id,
        to = req.to_account_id,
        amount = req.amount,
        "Transfer request"
    );

    let result = state
        .transfers
        .create_transfer(TransferRequest::new(
            principal,
            req.from_account_id,
            req.to_account_id,
            req.amount,
            req.currency,
        ))
        .await?;
    created(result)
}

/// GET /api/v1/transfers/{id}
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Extension(Principal(principal)): Extension<Principal>,
    Path(id): Path<i64>,
) -> ApiResult<Transfer> {
    ok(state.transfers.get_transfer(&principal, id).await?)
}
