use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier reserved for the test match, which is never persisted nor scored.
pub const TEST_MATCH_ID: u32 = 0;
/// Points credited to an alliance for each regular foul committed by its opponent.
pub const FOUL_POINTS: i32 = 5;
/// Points credited to an alliance for each technical foul committed by its opponent.
pub const TECH_FOUL_POINTS: i32 = 15;

/// Category of a match, driving scoring rules and schedule handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Practice match, played before qualifications.
    Practice,
    /// Ranked qualification match.
    Qualification,
    /// Playoff match. A red card zeroes the alliance score.
    Elimination,
    /// Unscheduled test match, never persisted.
    Test,
}

impl MatchType {
    /// Human readable label used by displays.
    pub fn label(self) -> &'static str {
        match self {
            MatchType::Practice => "Practice",
            MatchType::Qualification => "Qualification",
            MatchType::Elimination => "Elimination",
            MatchType::Test => "Test",
        }
    }
}

/// Lifecycle status of a scheduled match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Not played yet, or played without a committed result.
    #[default]
    Scheduled,
    /// At least one result was committed.
    Complete,
}

/// Outcome of a committed match. `None` serializes as the empty string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Winner {
    /// Not committed yet.
    #[default]
    #[serde(rename = "")]
    None,
    /// Red scored more.
    #[serde(rename = "R")]
    Red,
    /// Blue scored more.
    #[serde(rename = "B")]
    Blue,
    /// Equal totals. Never broken, eliminations included.
    #[serde(rename = "T")]
    Tie,
}

/// A scheduled (or test) match with its six team slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Primary key; [`TEST_MATCH_ID`] marks the test match.
    pub id: u32,
    /// Practice, qualification, elimination or test.
    #[serde(rename = "type")]
    pub match_type: MatchType,
    /// Short label shown on the displays.
    pub display_name: String,
    /// Whether a result was committed.
    pub status: MatchStatus,
    /// Winner of the latest committed result.
    pub winner: Winner,
    /// Team in red station 1, `0` when empty.
    pub red1: u32,
    /// Team in red station 2, `0` when empty.
    pub red2: u32,
    /// Team in red station 3, `0` when empty.
    pub red3: u32,
    /// Team in blue station 1, `0` when empty.
    pub blue1: u32,
    /// Team in blue station 2, `0` when empty.
    pub blue2: u32,
    /// Team in blue station 3, `0` when empty.
    pub blue3: u32,
    /// Wall-clock time the match was last started.
    pub started_at: Option<SystemTime>,
}

impl Match {
    /// Build the sentinel match used when nothing from the schedule is loaded.
    pub fn test_match() -> Self {
        Self {
            id: TEST_MATCH_ID,
            match_type: MatchType::Test,
            display_name: String::new(),
            status: MatchStatus::Scheduled,
            winner: Winner::None,
            red1: 0,
            red2: 0,
            red3: 0,
            blue1: 0,
            blue2: 0,
            blue3: 0,
            started_at: None,
        }
    }

    /// Whether this is the test match sentinel.
    pub fn is_test(&self) -> bool {
        self.id == TEST_MATCH_ID
    }

    /// Team numbers of the red alliance, in station order.
    pub fn red_teams(&self) -> [u32; 3] {
        [self.red1, self.red2, self.red3]
    }

    /// Team numbers of the blue alliance, in station order.
    pub fn blue_teams(&self) -> [u32; 3] {
        [self.blue1, self.blue2, self.blue3]
    }
}

/// Penalty card given by the head referee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Card {
    /// Warning. Sticks to the team until a later result clears it.
    Yellow,
    /// Disqualification.
    Red,
}

/// A foul committed by the opposing alliance and credited to the scored one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Foul {
    /// Team that committed the foul.
    pub team_id: u32,
    /// Rule number cited by the referee.
    pub rule: String,
    /// Technical fouls are worth more points.
    pub is_technical: bool,
}

impl Foul {
    /// Points this foul awards to the other alliance.
    pub fn points(&self) -> i32 {
        if self.is_technical {
            TECH_FOUL_POINTS
        } else {
            FOUL_POINTS
        }
    }
}

/// Raw per-alliance score accumulated by the scoring panels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Score {
    /// Points scored during autonomous.
    pub auto_points: i32,
    /// Points scored during teleoperated play.
    pub teleop_points: i32,
    /// Points scored during the endgame.
    pub endgame_points: i32,
    /// Fouls committed by the opposing alliance.
    pub fouls: Vec<Foul>,
}

impl Score {
    /// Collapse the raw score into its point breakdown.
    pub fn summarize(&self) -> ScoreSummary {
        let foul_points = self
            .fouls
            .iter()
            .map(Foul::points)
            .fold(0, i32::saturating_add);
        let score = [self.auto_points, self.teleop_points, self.endgame_points]
            .into_iter()
            .fold(foul_points, i32::saturating_add);
        ScoreSummary {
            auto_points: self.auto_points,
            teleop_points: self.teleop_points,
            endgame_points: self.endgame_points,
            foul_points,
            score,
        }
    }
}

/// Point breakdown derived from a [`Score`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScoreSummary {
    /// Autonomous points.
    pub auto_points: i32,
    /// Teleoperated points.
    pub teleop_points: i32,
    /// Endgame points.
    pub endgame_points: i32,
    /// Points awarded for opponent fouls.
    pub foul_points: i32,
    /// Total, saturating at the integer bounds.
    pub score: i32,
}

/// A committed (or about to be committed) outcome for one play of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Storage identifier, assigned on creation.
    pub id: u32,
    /// Match this result belongs to.
    pub match_id: u32,
    /// 1-based sequence among all results stored for `match_id`.
    pub play_number: u32,
    /// Type of the match when it was committed.
    pub match_type: MatchType,
    /// Raw red score.
    pub red_score: Score,
    /// Raw blue score.
    pub blue_score: Score,
    /// Cards given to red teams, keyed by team number.
    pub red_cards: IndexMap<u32, Card>,
    /// Cards given to blue teams, keyed by team number.
    pub blue_cards: IndexMap<u32, Card>,
    /// When the result was persisted.
    pub committed_at: Option<SystemTime>,
}

impl MatchResult {
    /// Create an empty result for the given match.
    pub fn new(match_id: u32, match_type: MatchType) -> Self {
        Self {
            id: 0,
            match_id,
            play_number: 0,
            match_type,
            red_score: Score::default(),
            blue_score: Score::default(),
            red_cards: IndexMap::new(),
            blue_cards: IndexMap::new(),
            committed_at: None,
        }
    }

    /// Red alliance breakdown after card penalties.
    pub fn red_score_summary(&self) -> ScoreSummary {
        self.alliance_summary(&self.red_score, &self.red_cards)
    }

    /// Blue alliance breakdown after card penalties.
    pub fn blue_score_summary(&self) -> ScoreSummary {
        self.alliance_summary(&self.blue_score, &self.blue_cards)
    }

    /// Compare both totals. Ties are never broken, eliminations included.
    pub fn winner(&self) -> Winner {
        let red = self.red_score_summary().score;
        let blue = self.blue_score_summary().score;
        match red.cmp(&blue) {
            std::cmp::Ordering::Greater => Winner::Red,
            std::cmp::Ordering::Less => Winner::Blue,
            std::cmp::Ordering::Equal => Winner::Tie,
        }
    }

    fn alliance_summary(&self, score: &Score, cards: &IndexMap<u32, Card>) -> ScoreSummary {
        let mut summary = score.summarize();
        // A red card disqualifies the whole alliance in eliminations.
        if self.match_type == MatchType::Elimination && cards.values().any(|card| *card == Card::Red)
        {
            summary.score = 0;
        }
        summary
    }
}

/// A team registered at the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team number.
    pub id: u32,
    /// Team name.
    pub name: String,
    /// Carried over from the most recent committed result the team played in.
    pub yellow_card: bool,
}

impl Team {
    /// Build a team without any card history.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            yellow_card: false,
        }
    }
}
