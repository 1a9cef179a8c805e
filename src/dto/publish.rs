use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    dao::models::{Card, Match, MatchResult, MatchType, ScoreSummary, Winner},
    dto::format_system_time,
};

/// Body pushed to the external publishing services after a commit.
#[derive(Debug, Clone, Serialize)]
pub struct PublishSnapshot {
    /// Committed match.
    pub match_id: u32,
    /// Match type.
    #[serde(rename = "type")]
    pub match_type: MatchType,
    /// Display label.
    pub display_name: String,
    /// Play number of this result.
    pub play_number: u32,
    /// Winner of this result.
    pub winner: Winner,
    /// Red stations 1 to 3.
    pub red_teams: [u32; 3],
    /// Blue stations 1 to 3.
    pub blue_teams: [u32; 3],
    /// Red breakdown after card penalties.
    pub red_score: ScoreSummary,
    /// Blue breakdown after card penalties.
    pub blue_score: ScoreSummary,
    /// Cards given to red teams.
    pub red_cards: IndexMap<u32, Card>,
    /// Cards given to blue teams.
    pub blue_cards: IndexMap<u32, Card>,
    /// RFC 3339 start time, used to cut the match video.
    pub started_at: Option<String>,
    /// RFC 3339 commit time.
    pub committed_at: Option<String>,
}

impl PublishSnapshot {
    /// Capture a committed match and its result.
    pub fn new(entity: &Match, result: &MatchResult) -> Self {
        Self {
            match_id: entity.id,
            match_type: entity.match_type,
            display_name: entity.display_name.clone(),
            play_number: result.play_number,
            winner: result.winner(),
            red_teams: entity.red_teams(),
            blue_teams: entity.blue_teams(),
            red_score: result.red_score_summary(),
            blue_score: result.blue_score_summary(),
            red_cards: result.red_cards.clone(),
            blue_cards: result.blue_cards.clone(),
            started_at: entity.started_at.map(format_system_time),
            committed_at: result.committed_at.map(format_system_time),
        }
    }
}
