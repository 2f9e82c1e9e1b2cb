// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use ids_core::CoreError;

/// Transport-level error codes, extending `ids_core::CoreError`'s four kinds
/// (spec §7) with the two that only make sense at the HTTP boundary
/// (spec §6 expansion: "transport-level `BadRequest` / `Internal`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerError {
    BackendUnavailable,
    RuleLoadError,
    ParseError,
    EvaluationError,
    BadRequest,
    Internal,
}

impl ServerError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BackendUnavailable => 503,
            Self::RuleLoadError => 400,
            Self::ParseError => 400,
            Self::EvaluationError => 500,
            Self::BadRequest => 400,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::RuleLoadError => "RULE_LOAD_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::EvaluationError => "EVALUATION_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: ErrorBody { code: self.as_str().to_owned(), message: message.into() },
        };
        (status, Json(body))
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&CoreError> for ServerError {
    fn from(e: &CoreError) -> Self {
        match e {
            CoreError::BackendUnavailable(_) => Self::BackendUnavailable,
            CoreError::RuleLoadError(_) => Self::RuleLoadError,
            CoreError::ParseError(_) => Self::ParseError,
            CoreError::EvaluationError(_) => Self::EvaluationError,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
