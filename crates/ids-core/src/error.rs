// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Error kinds produced by the detection pipeline.
///
/// Deliberately a plain enum rather than a `thiserror` derive: the mapping
/// to an HTTP status and a machine-readable code is small and closed, and
/// callers mostly match on the kind rather than the message.
#[derive(Debug, Clone)]
pub enum CoreError {
    /// State store or event bus unreachable.
    BackendUnavailable(String),
    /// A rule document failed to parse or validate at load time.
    RuleLoadError(String),
    /// The upstream parser failed to produce an event (the core never sees it).
    ParseError(String),
    /// Regex or dedup-template evaluation failed for a single rule at event time.
    EvaluationError(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            Self::RuleLoadError(_) => "RULE_LOAD_ERROR",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::EvaluationError(_) => "EVALUATION_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::BackendUnavailable(_) => 503,
            Self::RuleLoadError(_) => 400,
            Self::ParseError(_) => 400,
            Self::EvaluationError(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BackendUnavailable(m)
            | Self::RuleLoadError(m)
            | Self::ParseError(m)
            | Self::EvaluationError(m) => m,
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for CoreError {}

impl From<redis::RedisError> for CoreError {
    fn from(e: redis::RedisError) -> Self {
        Self::BackendUnavailable(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
