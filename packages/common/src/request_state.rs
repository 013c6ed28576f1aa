#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State of a build request.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// The build worker has not finished with the request yet.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "in_progress"))]
    InProgress,
    /// The index image was built and pushed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "complete"))]
    Complete,
    /// The build gave up; see the state reason.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "failed"))]
    Failed,
}

impl RequestState {
    /// All states, sorted by name.
    pub const ALL: &'static [RequestState] = &[Self::Complete, Self::Failed, Self::InProgress];

    /// Returns true once no further work will happen on the request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for RequestState {
    fn default() -> Self {
        Self::InProgress
    }
}

/// Returned when a string does not name a build request state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{invalid} is not a valid build request state. Valid states are: {}",
    valid_state_names()
)]
pub struct InvalidStateError {
    invalid: String,
}

fn valid_state_names() -> String {
    RequestState::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for RequestState {
    type Err = InvalidStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            _ => Err(InvalidStateError {
                invalid: s.to_string(),
            }),
        }
    }
}
