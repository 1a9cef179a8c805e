use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::{Card, Foul, Match, MatchResult, MatchType, ScoreSummary, Winner};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name, the topic type.
    pub event: Option<String>,
    /// JSON-encoded payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Display-only event naming the match on the field and its teams.
pub struct SetMatchEvent {
    /// Match id.
    pub match_id: u32,
    /// Match type.
    pub match_type: MatchType,
    /// Display label.
    pub display_name: String,
    /// Red stations 1 to 3.
    pub red_teams: [u32; 3],
    /// Blue stations 1 to 3.
    pub blue_teams: [u32; 3],
}

impl From<&Match> for SetMatchEvent {
    fn from(value: &Match) -> Self {
        Self {
            match_id: value.id,
            match_type: value.match_type,
            display_name: value.display_name.clone(),
            red_teams: value.red_teams(),
            blue_teams: value.blue_teams(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Display-only event carrying the final score of the saved match.
pub struct FinalScoreEvent {
    /// Saved match.
    #[serde(rename = "match")]
    pub current: SetMatchEvent,
    /// Play number of the saved result.
    pub play_number: u32,
    /// Winner of the saved result.
    pub winner: Winner,
    /// Red breakdown after card penalties.
    pub red_score_summary: ScoreSummary,
    /// Blue breakdown after card penalties.
    pub blue_score_summary: ScoreSummary,
    /// Fouls credited to red, committed by blue teams.
    pub red_fouls: Vec<Foul>,
    /// Fouls credited to blue, committed by red teams.
    pub blue_fouls: Vec<Foul>,
    /// Cards given to red teams.
    #[schema(value_type = Object)]
    pub red_cards: IndexMap<u32, Card>,
    /// Cards given to blue teams.
    #[schema(value_type = Object)]
    pub blue_cards: IndexMap<u32, Card>,
}

impl FinalScoreEvent {
    /// Build the event from the arena's saved snapshot.
    pub fn new(saved_match: &Match, result: &MatchResult) -> Self {
        Self {
            current: saved_match.into(),
            play_number: result.play_number,
            winner: result.winner(),
            red_score_summary: result.red_score_summary(),
            blue_score_summary: result.blue_score_summary(),
            red_fouls: result.red_score.fouls.clone(),
            blue_fouls: result.blue_score.fouls.clone(),
            red_cards: result.red_cards.clone(),
            blue_cards: result.blue_cards.clone(),
        }
    }
}
