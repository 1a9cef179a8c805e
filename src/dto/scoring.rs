use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::{Card, Foul};

/// Points reported by a scoring panel, added to the alliance's live score.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct ScoreUpdateRequest {
    /// Autonomous points to add, negative to correct.
    #[validate(range(min = -1000, max = 1000))]
    pub auto_points: i32,
    /// Teleoperated points to add, negative to correct.
    #[validate(range(min = -1000, max = 1000))]
    pub teleop_points: i32,
    /// Endgame points to add, negative to correct.
    #[validate(range(min = -1000, max = 1000))]
    pub endgame_points: i32,
    /// Fouls committed by the opposing alliance.
    #[validate(length(max = 50))]
    pub fouls: Vec<Foul>,
}

/// Card assignment for a team of the alliance. `card: null` clears it.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CardRequest {
    /// Team receiving the card.
    pub team_id: u32,
    /// New card, or `null` to clear it.
    #[serde(default)]
    pub card: Option<Card>,
}
