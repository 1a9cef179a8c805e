use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{Match, MatchStatus, MatchType, Team, Winner},
    dto::{format_system_time, validation::validate_schedulable_type},
};

/// Payload used to add a match to the schedule.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateMatchRequest {
    /// Type of the new match. `test` is rejected.
    #[serde(rename = "type")]
    #[validate(custom(function = "validate_schedulable_type"))]
    pub match_type: MatchType,
    /// Label shown on the displays.
    #[validate(length(min = 1, max = 32))]
    pub display_name: String,
    /// Team slots; `0` leaves the station empty.
    #[serde(default)]
    pub red1: u32,
    /// Team in red station 2.
    #[serde(default)]
    pub red2: u32,
    /// Team in red station 3.
    #[serde(default)]
    pub red3: u32,
    /// Team in blue station 1.
    #[serde(default)]
    pub blue1: u32,
    /// Team in blue station 2.
    #[serde(default)]
    pub blue2: u32,
    /// Team in blue station 3.
    #[serde(default)]
    pub blue3: u32,
}

impl From<CreateMatchRequest> for Match {
    fn from(value: CreateMatchRequest) -> Self {
        Match {
            id: 0,
            match_type: value.match_type,
            display_name: value.display_name,
            status: MatchStatus::Scheduled,
            winner: Winner::None,
            red1: value.red1,
            red2: value.red2,
            red3: value.red3,
            blue1: value.blue1,
            blue2: value.blue2,
            blue3: value.blue3,
            started_at: None,
        }
    }
}

/// Payload used to register a team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateTeamRequest {
    /// Team number.
    #[validate(range(min = 1))]
    pub id: u32,
    /// Team name.
    #[validate(length(max = 64))]
    #[serde(default)]
    pub name: String,
}

/// Optional filter of the match listing.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MatchListQuery {
    /// Only return matches of this type.
    #[serde(rename = "type")]
    #[param(value_type = Option<MatchType>)]
    pub match_type: Option<MatchType>,
}

/// Match as exposed over HTTP.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchSummary {
    /// Match id.
    pub id: u32,
    /// Match type.
    #[serde(rename = "type")]
    pub match_type: MatchType,
    /// Display label.
    pub display_name: String,
    /// Whether a result was committed.
    pub status: MatchStatus,
    /// Winner of the latest committed result.
    pub winner: Winner,
    /// Red stations 1 to 3.
    pub red_teams: [u32; 3],
    /// Blue stations 1 to 3.
    pub blue_teams: [u32; 3],
    /// RFC 3339 timestamp of the last start, if any.
    pub started_at: Option<String>,
}

impl From<&Match> for MatchSummary {
    fn from(value: &Match) -> Self {
        Self {
            id: value.id,
            match_type: value.match_type,
            display_name: value.display_name.clone(),
            status: value.status,
            winner: value.winner,
            red_teams: value.red_teams(),
            blue_teams: value.blue_teams(),
            started_at: value.started_at.map(format_system_time),
        }
    }
}

/// Team as exposed over HTTP.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamSummary {
    /// Team number.
    pub id: u32,
    /// Team name.
    pub name: String,
    /// Carries a yellow card into its next match.
    pub yellow_card: bool,
}

impl From<&Team> for TeamSummary {
    fn from(value: &Team) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            yellow_card: value.yellow_card,
        }
    }
}
