// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet and donation endpoints.

use axum::{extract::State, http::StatusCode, Json};

use super::{ApiJson, ApiQuery};
use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        CreateDonationRequest, CreateDonationResponse, DonationsResponse, MessageResponse,
        SelectedDonationsQuery, WalletResponse,
    },
    services::ledger,
    state::AppState,
};

/// Balance and the 20 most recent donations received.
#[utoipa::path(
    get,
    path = "/api/wallet",
    tag = "Donations",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Wallet balance and recent donations", body = WalletResponse),
        (status = 401, description = "Unauthorized - invalid or missing token", body = MessageResponse),
    )
)]
pub async fn get_wallet(
    State(state): State<AppState>,
    Auth(session): Auth,
) -> Result<Json<WalletResponse>, ApiError> {
    let wallet = ledger::get_wallet(&state.db, &session.user).await?;
    Ok(Json(wallet))
}

/// Donate to another user.
#[utoipa::path(
    post,
    path = "/api/donations",
    request_body = CreateDonationRequest,
    tag = "Donations",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Donation recorded", body = CreateDonationResponse),
        (status = 400, description = "Invalid amount or recipient", body = MessageResponse),
        (status = 401, description = "Unauthorized - invalid or missing token", body = MessageResponse),
        (status = 404, description = "Recipient not found", body = MessageResponse),
    )
)]
pub async fn create_donation(
    State(state): State<AppState>,
    Auth(session): Auth,
    ApiJson(request): ApiJson<CreateDonationRequest>,
) -> Result<(StatusCode, Json<CreateDonationResponse>), ApiError> {
    let response = ledger::create_donation(
        &state.db,
        &session.user,
        session.session_id.as_deref(),
        request,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Donations received among a comma-separated list of ids.
#[utoipa::path(
    get,
    path = "/api/donations/selected",
    params(SelectedDonationsQuery),
    tag = "Donations",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Matching donations, newest first", body = DonationsResponse),
        (status = 400, description = "Missing or malformed ids", body = MessageResponse),
        (status = 401, description = "Unauthorized - invalid or missing token", body = MessageResponse),
    )
)]
pub async fn selected_donations(
    State(state): State<AppState>,
    Auth(session): Auth,
    ApiQuery(query): ApiQuery<SelectedDonationsQuery>,
) -> Result<Json<DonationsResponse>, ApiError> {
    let ids = query.ids.unwrap_or_default();
    let response = ledger::get_selected_donations(&state.db, &session.user, ids.split(',')).await?;
    Ok(Json(response))
}
