use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    dao::models::{Card, Score, ScoreSummary},
    error::CommandError,
    state::{
        arena::{Alliance, AllianceStation, Arena, ScoringStatus, StationKey},
        state_machine::{MatchState, MatchTiming},
    },
};

/// Envelope of every frame exchanged on the match play socket.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InboundEnvelope {
    /// Command name, e.g. `startMatch`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Command arguments, `null` when there are none.
    #[serde(default)]
    pub data: Value,
}

/// Frame pushed to match play clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    /// Topic name, or `error` for rejected commands.
    #[serde(rename = "type")]
    pub message_type: &'static str,
    /// Topic payload.
    pub data: Value,
}

impl OutboundMessage {
    /// Error reply sent to the client whose command was rejected.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message_type: "error",
            data: Value::String(message.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
/// Arguments of the `substituteTeam` command.
pub struct SubstituteTeamArgs {
    /// Team number to place, `0` to empty the station.
    #[serde(default)]
    pub team: u32,
    /// Station key such as `R1`.
    #[serde(default)]
    pub position: String,
}

/// Commands accepted from match play clients, decoded once from the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPlayCommand {
    /// Put `team` in station `position` before the match.
    SubstituteTeam {
        /// Team number, `0` to empty the station.
        team: u32,
        /// Station to fill.
        position: StationKey,
    },
    /// Flip the bypass flag of a station.
    ToggleBypass(StationKey),
    /// Start the loaded match.
    StartMatch,
    /// Jump to post-match.
    AbortMatch,
    /// Commit the live scores and load the next match.
    CommitResults,
    /// Drop the live scores and load the next match.
    DiscardResults,
    /// Switch the audience display mode.
    SetAudienceDisplay(String),
    /// Switch the alliance station display mode.
    SetAllianceStationDisplay(String),
}

impl MatchPlayCommand {
    /// Decode and validate a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, CommandError> {
        let envelope: InboundEnvelope =
            serde_json::from_str(text).map_err(|source| CommandError::ParseFailed {
                kind: "envelope".into(),
                source,
            })?;
        Self::from_envelope(envelope)
    }

    /// Decode the payload of an already parsed envelope.
    pub fn from_envelope(envelope: InboundEnvelope) -> Result<Self, CommandError> {
        let InboundEnvelope { message_type, data } = envelope;
        let command = match message_type.as_str() {
            "substituteTeam" => {
                let args: SubstituteTeamArgs = if data.is_null() {
                    SubstituteTeamArgs::default()
                } else {
                    parse_data(&message_type, data)?
                };
                MatchPlayCommand::SubstituteTeam {
                    team: args.team,
                    position: args.position.parse()?,
                }
            }
            "toggleBypass" => {
                let station: String = parse_data(&message_type, data)?;
                MatchPlayCommand::ToggleBypass(station.parse()?)
            }
            "startMatch" => MatchPlayCommand::StartMatch,
            "abortMatch" => MatchPlayCommand::AbortMatch,
            "commitResults" => MatchPlayCommand::CommitResults,
            "discardResults" => MatchPlayCommand::DiscardResults,
            "setAudienceDisplay" => {
                MatchPlayCommand::SetAudienceDisplay(parse_data(&message_type, data)?)
            }
            "setAllianceStationDisplay" => {
                MatchPlayCommand::SetAllianceStationDisplay(parse_data(&message_type, data)?)
            }
            _ => return Err(CommandError::UnknownType(message_type)),
        };
        Ok(command)
    }
}

fn parse_data<T: serde::de::DeserializeOwned>(kind: &str, data: Value) -> Result<T, CommandError> {
    serde_json::from_value(data).map_err(|source| CommandError::ParseFailed {
        kind: kind.to_string(),
        source,
    })
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload of the `status` topic.
pub struct StatusPayload {
    /// Loaded match id.
    pub match_id: u32,
    /// Wire index of the match state.
    #[schema(value_type = u8)]
    pub match_state: MatchState,
    /// Every station is ready or bypassed.
    pub can_start_match: bool,
    /// Station assignments keyed `R1`..`B3`.
    #[schema(value_type = Object)]
    pub alliance_stations: IndexMap<StationKey, AllianceStation>,
}

impl From<&Arena> for StatusPayload {
    fn from(arena: &Arena) -> Self {
        Self {
            match_id: arena.current_match().id,
            match_state: arena.match_state(),
            can_start_match: arena.check_can_start_match().is_ok(),
            alliance_stations: arena.alliance_stations().clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload of the `matchTiming` topic.
pub struct MatchTimingPayload {
    /// Warmup length.
    pub warmup_duration_sec: u64,
    /// Autonomous length.
    pub auto_duration_sec: u64,
    /// Pause length between autonomous and teleop.
    pub pause_duration_sec: u64,
    /// Teleop length.
    pub teleop_duration_sec: u64,
    /// Seconds left in teleop when the warning sounds.
    pub warning_remaining_duration_sec: u64,
}

impl From<&MatchTiming> for MatchTimingPayload {
    fn from(timing: &MatchTiming) -> Self {
        Self {
            warmup_duration_sec: timing.warmup_duration_sec,
            auto_duration_sec: timing.auto_duration_sec,
            pause_duration_sec: timing.pause_duration_sec,
            teleop_duration_sec: timing.teleop_duration_sec,
            warning_remaining_duration_sec: timing.warning_remaining_duration_sec,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload of the `realtimeScore` topic.
pub struct RealtimeScorePayload {
    /// Raw red score.
    pub red_score: Score,
    /// Raw blue score.
    pub blue_score: Score,
    /// Red breakdown after card penalties.
    pub red_score_summary: ScoreSummary,
    /// Blue breakdown after card penalties.
    pub blue_score_summary: ScoreSummary,
    /// Cards given to red teams.
    #[schema(value_type = Object)]
    pub red_cards: IndexMap<u32, Card>,
    /// Cards given to blue teams.
    #[schema(value_type = Object)]
    pub blue_cards: IndexMap<u32, Card>,
}

impl From<&Arena> for RealtimeScorePayload {
    fn from(arena: &Arena) -> Self {
        let red = arena.realtime_score(Alliance::Red);
        let blue = arena.realtime_score(Alliance::Blue);
        Self {
            red_score: red.current_score.clone(),
            blue_score: blue.current_score.clone(),
            red_score_summary: red.current_score.summarize(),
            blue_score_summary: blue.current_score.summarize(),
            red_cards: red.cards.clone(),
            blue_cards: blue.cards.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload of the `scoringStatus` topic.
pub struct ScoringStatusPayload {
    /// Red scorer signed off.
    pub red_score_ready: bool,
    /// Blue scorer signed off.
    pub blue_score_ready: bool,
}

impl From<ScoringStatus> for ScoringStatusPayload {
    fn from(status: ScoringStatus) -> Self {
        Self {
            red_score_ready: status.red_score_ready,
            blue_score_ready: status.blue_score_ready,
        }
    }
}
