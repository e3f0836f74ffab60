// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, Request, Response,
    },
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::require_session,
    error::ApiError,
    models::{
        AuthResponse, CreateDonationRequest, CreateDonationResponse, CurrentUserResponse,
        DonationsResponse, LoginRequest, MessageResponse, PublicProfileResponse, PublicUser,
        RecipientSummary, RegisterRequest, SanitizedUser, UpdateProfileRequest,
        WalletDonationView, WalletResponse,
    },
    state::AppState,
};

pub mod auth;
pub mod donations;
pub mod health;
pub mod users;

/// JSON body extractor whose rejections render as `{"message": ...}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections render as `{"message": ...}`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path parameter extractor whose rejections render as `{"message": ...}`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// CORS policy for the single browser frontend.
pub fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/wallet", get(donations::get_wallet))
        .route("/api/donations", post(donations::create_donation))
        .route("/api/donations/selected", get(donations::selected_donations))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/users/{username}", get(users::get_profile))
        // Shadows `{username}` for the name "update"; PUT authenticates
        // through its `Auth` extractor.
        .route(
            "/api/users/update",
            get(users::get_profile_named_update).put(users::update_profile),
        )
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = %request_id,
                        status = tracing::field::Empty,
                    )
                })
                .on_response(|res: &Response<_>, latency: Duration, span: &Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, latency_ms = latency.as_millis() as u64, "response");
                    } else {
                        tracing::info!(%status, latency_ms = latency.as_millis() as u64, "response");
                    }
                }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register,
        auth::login,
        auth::me,
        users::get_profile,
        users::update_profile,
        donations::get_wallet,
        donations::create_donation,
        donations::selected_donations
    ),
    components(
        schemas(
            health::HealthResponse,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            CurrentUserResponse,
            SanitizedUser,
            PublicUser,
            PublicProfileResponse,
            UpdateProfileRequest,
            MessageResponse,
            CreateDonationRequest,
            CreateDonationResponse,
            RecipientSummary,
            WalletDonationView,
            WalletResponse,
            DonationsResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and store reachability"),
        (name = "Auth", description = "Registration, login and sessions"),
        (name = "Users", description = "Public profiles and profile updates"),
        (name = "Donations", description = "Wallet balance and donations")
    )
)]
struct ApiDoc;
