// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Donations - Peer-to-peer donation ledger service
//!
//! Users register, log in with bearer tokens, hold a wallet balance and
//! donate to each other by username.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Password hashing, session tokens and the session gate
//! - `services` - Registration, login, ledger and profile operations
//! - `storage` - Document store backends (redb, in-memory) and repositories

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
