use std::{fmt, str::FromStr, time::Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dao::models::{Card, Match, MatchResult, Score},
    state::state_machine::{
        ClockUpdate, InvalidTransition, MatchEvent, MatchState, MatchStateMachine, MatchTime,
        MatchTiming,
    },
};

/// Audience/alliance station display mode showing the match in progress.
pub const DISPLAY_MATCH: &str = "match";
/// Display mode hiding everything.
pub const DISPLAY_BLANK: &str = "blank";

/// One of the six driver station positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum StationKey {
    /// Red station 1.
    R1,
    /// Red station 2.
    R2,
    /// Red station 3.
    R3,
    /// Blue station 1.
    B1,
    /// Blue station 2.
    B2,
    /// Blue station 3.
    B3,
}

impl StationKey {
    /// All stations in display order.
    pub const ALL: [StationKey; 6] = [
        StationKey::R1,
        StationKey::R2,
        StationKey::R3,
        StationKey::B1,
        StationKey::B2,
        StationKey::B3,
    ];

    /// Alliance the station belongs to.
    pub fn alliance(self) -> Alliance {
        match self {
            StationKey::R1 | StationKey::R2 | StationKey::R3 => Alliance::Red,
            StationKey::B1 | StationKey::B2 | StationKey::B3 => Alliance::Blue,
        }
    }

    /// Wire name of the station.
    pub fn as_str(self) -> &'static str {
        match self {
            StationKey::R1 => "R1",
            StationKey::R2 => "R2",
            StationKey::R3 => "R3",
            StationKey::B1 => "B1",
            StationKey::B2 => "B2",
            StationKey::B3 => "B3",
        }
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a station name is not one of the six known keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid alliance station '{0}'")]
pub struct InvalidStation(pub String);

impl FromStr for StationKey {
    type Err = InvalidStation;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        StationKey::ALL
            .into_iter()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| InvalidStation(value.to_string()))
    }
}

/// Red or blue side of the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Alliance {
    /// Red alliance.
    Red,
    /// Blue alliance.
    Blue,
}

/// Team assignment and bypass flag of a single station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AllianceStation {
    /// Team number, zero when the station is empty.
    pub team: u32,
    /// Ignore this station when checking whether the match can start.
    pub bypass: bool,
}

impl AllianceStation {
    /// A station is ready when it is bypassed or has a team assigned.
    pub fn is_ready(&self) -> bool {
        self.bypass || self.team != 0
    }
}

/// Live, uncommitted score of one alliance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealtimeScore {
    /// Points and fouls reported so far.
    pub current_score: Score,
    /// Cards given so far, keyed by team number.
    pub cards: IndexMap<u32, Card>,
}

/// Whether each alliance's scorer has signed off on the final score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringStatus {
    /// Red scorer signed off.
    pub red_score_ready: bool,
    /// Blue scorer signed off.
    pub blue_score_ready: bool,
}

/// Rejections raised by arena mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The clock refused the transition.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    /// A station has no team and is not bypassed.
    #[error("station {0} is neither bypassed nor assigned a team")]
    StationNotReady(StationKey),
    /// The match must be in pre-match.
    #[error("a match is in progress or has results pending")]
    MatchInProgress,
}

/// Outcome of a clock update as seen by the arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaUpdate {
    /// Clock changes.
    pub clock: ClockUpdate,
    /// Both display modes switched because the match went live.
    pub displays_changed: bool,
}

/// Everything that is happening on the field right now.
#[derive(Debug, Clone)]
pub struct Arena {
    current_match: Match,
    clock: MatchStateMachine,
    alliance_stations: IndexMap<StationKey, AllianceStation>,
    /// Live red score.
    pub red_realtime_score: RealtimeScore,
    /// Live blue score.
    pub blue_realtime_score: RealtimeScore,
    /// Last match posted to the displays along with its result.
    pub saved_match: Match,
    /// Result shown on the final score display.
    pub saved_match_result: MatchResult,
    /// Audience display mode.
    pub audience_display_screen: String,
    /// Alliance station display mode.
    pub alliance_station_display_screen: String,
    /// Scorer sign-off flags.
    pub scoring_status: ScoringStatus,
}

impl Arena {
    /// Build an arena with the test match loaded.
    pub fn new(timing: MatchTiming) -> Self {
        let test_match = Match::test_match();
        let saved_match_result = MatchResult::new(test_match.id, test_match.match_type);
        Self {
            current_match: test_match.clone(),
            clock: MatchStateMachine::new(timing),
            alliance_stations: StationKey::ALL
                .into_iter()
                .map(|key| (key, AllianceStation::default()))
                .collect(),
            red_realtime_score: RealtimeScore::default(),
            blue_realtime_score: RealtimeScore::default(),
            saved_match: test_match,
            saved_match_result,
            audience_display_screen: DISPLAY_BLANK.into(),
            alliance_station_display_screen: DISPLAY_MATCH.into(),
            scoring_status: ScoringStatus::default(),
        }
    }

    /// The match currently on the field.
    pub fn current_match(&self) -> &Match {
        &self.current_match
    }

    /// Current lifecycle state.
    pub fn match_state(&self) -> MatchState {
        self.clock.state()
    }

    /// Configured period durations.
    pub fn timing(&self) -> &MatchTiming {
        self.clock.timing()
    }

    /// Snapshot for the `matchTime` topic.
    pub fn match_time(&self, now: Instant) -> MatchTime {
        self.clock.match_time(now)
    }

    /// All six stations in display order.
    pub fn alliance_stations(&self) -> &IndexMap<StationKey, AllianceStation> {
        &self.alliance_stations
    }

    /// Live score of one alliance.
    pub fn realtime_score(&self, alliance: Alliance) -> &RealtimeScore {
        match alliance {
            Alliance::Red => &self.red_realtime_score,
            Alliance::Blue => &self.blue_realtime_score,
        }
    }

    /// Mutable live score of one alliance.
    pub fn realtime_score_mut(&mut self, alliance: Alliance) -> &mut RealtimeScore {
        match alliance {
            Alliance::Red => &mut self.red_realtime_score,
            Alliance::Blue => &mut self.blue_realtime_score,
        }
    }

    /// Team numbers currently assigned to an alliance's stations.
    pub fn alliance_teams(&self, alliance: Alliance) -> Vec<u32> {
        self.alliance_stations
            .iter()
            .filter(|(key, station)| key.alliance() == alliance && station.team != 0)
            .map(|(_, station)| station.team)
            .collect()
    }

    /// Reason the match cannot start, if any.
    pub fn check_can_start_match(&self) -> Result<(), ArenaError> {
        if self.match_state() != MatchState::PreMatch {
            return Err(ArenaError::MatchInProgress);
        }
        match self
            .alliance_stations
            .iter()
            .find(|(_, station)| !station.is_ready())
        {
            Some((key, _)) => Err(ArenaError::StationNotReady(*key)),
            None => Ok(()),
        }
    }

    /// Put a match on the field, assigning its teams to the stations.
    pub fn load_match(&mut self, next: Match) -> Result<(), ArenaError> {
        self.ensure_pre_match()?;
        let teams = next.red_teams().into_iter().chain(next.blue_teams());
        for (station, team) in self.alliance_stations.values_mut().zip(teams) {
            *station = AllianceStation { team, bypass: false };
        }
        self.current_match = next;
        self.reset_live_scores();
        Ok(())
    }

    /// Replace the team at `key`, mirroring the change on the current match.
    pub fn substitute_team(&mut self, key: StationKey, team: u32) -> Result<(), ArenaError> {
        self.ensure_pre_match()?;
        if let Some(station) = self.alliance_stations.get_mut(&key) {
            station.team = team;
        }
        let slot = match key {
            StationKey::R1 => &mut self.current_match.red1,
            StationKey::R2 => &mut self.current_match.red2,
            StationKey::R3 => &mut self.current_match.red3,
            StationKey::B1 => &mut self.current_match.blue1,
            StationKey::B2 => &mut self.current_match.blue2,
            StationKey::B3 => &mut self.current_match.blue3,
        };
        *slot = team;
        Ok(())
    }

    /// Flip the bypass flag of a station, returning the new value.
    pub fn toggle_bypass(&mut self, key: StationKey) -> bool {
        let station = self.alliance_stations.entry(key).or_default();
        station.bypass = !station.bypass;
        station.bypass
    }

    /// Start the match clock once every station is ready or bypassed.
    pub fn start_match(&mut self, now: Instant) -> Result<(), ArenaError> {
        self.check_can_start_match()?;
        self.clock.start(now)?;
        self.current_match.started_at = Some(std::time::SystemTime::now());
        self.reset_live_scores();
        Ok(())
    }

    /// Force post-match and blank the audience display.
    pub fn abort_match(&mut self) -> Result<(), ArenaError> {
        self.clock.abort()?;
        self.audience_display_screen = DISPLAY_BLANK.into();
        Ok(())
    }

    /// Advance the clock, switching displays when the match goes live.
    pub fn update(&mut self, now: Instant) -> ArenaUpdate {
        let previous = self.clock.state();
        let clock = self.clock.update(now);
        let displays_changed = previous == MatchState::StartMatch && clock.period_changed.is_some();
        if displays_changed {
            self.audience_display_screen = DISPLAY_MATCH.into();
            self.alliance_station_display_screen = DISPLAY_MATCH.into();
        }
        ArenaUpdate {
            clock,
            displays_changed,
        }
    }

    /// Fail unless the match is waiting for its results to be handled.
    pub fn ensure_post_match(&self) -> Result<(), ArenaError> {
        if self.match_state() == MatchState::PostMatch {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.match_state(),
                event: MatchEvent::Reset,
            }
            .into())
        }
    }

    /// Return to pre-match, clearing bypasses and live scores.
    pub fn reset_match(&mut self) -> Result<(), ArenaError> {
        self.clock.reset()?;
        for station in self.alliance_stations.values_mut() {
            station.bypass = false;
        }
        self.reset_live_scores();
        self.alliance_station_display_screen = DISPLAY_MATCH.into();
        Ok(())
    }

    /// Build an uncommitted result from the live scores.
    pub fn build_match_result(&self) -> MatchResult {
        let mut result = MatchResult::new(self.current_match.id, self.current_match.match_type);
        result.red_score = self.red_realtime_score.current_score.clone();
        result.blue_score = self.blue_realtime_score.current_score.clone();
        result.red_cards = self.red_realtime_score.cards.clone();
        result.blue_cards = self.blue_realtime_score.cards.clone();
        result
    }

    fn ensure_pre_match(&self) -> Result<(), ArenaError> {
        if self.match_state() == MatchState::PreMatch {
            Ok(())
        } else {
            Err(ArenaError::MatchInProgress)
        }
    }

    fn reset_live_scores(&mut self) {
        self.red_realtime_score = RealtimeScore::default();
        self.blue_realtime_score = RealtimeScore::default();
        self.scoring_status = ScoringStatus::default();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::models::MatchType;

    fn bypass_all(arena: &mut Arena) {
        for key in StationKey::ALL {
            arena.toggle_bypass(key);
        }
    }

    fn scheduled_match() -> Match {
        Match {
            id: 7,
            match_type: MatchType::Qualification,
            display_name: "7".into(),
            red1: 101,
            red2: 102,
            red3: 103,
            blue1: 104,
            blue2: 105,
            blue3: 106,
            ..Match::test_match()
        }
    }

    #[test]
    fn station_keys_parse() {
        assert_eq!("R3".parse::<StationKey>(), Ok(StationKey::R3));
        assert_eq!("B1".parse::<StationKey>().unwrap().alliance(), Alliance::Blue);
        assert_eq!(
            "B5".parse::<StationKey>(),
            Err(InvalidStation("B5".into()))
        );
        assert!("".parse::<StationKey>().is_err());
    }

    #[test]
    fn start_requires_every_station_ready() {
        let mut arena = Arena::new(MatchTiming::default());
        let err = arena.start_match(Instant::now()).unwrap_err();
        assert_eq!(err, ArenaError::StationNotReady(StationKey::R1));

        for key in StationKey::ALL.into_iter().take(5) {
            arena.toggle_bypass(key);
        }
        let err = arena.start_match(Instant::now()).unwrap_err();
        assert_eq!(err, ArenaError::StationNotReady(StationKey::B3));

        arena.substitute_team(StationKey::B3, 254).unwrap();
        arena.start_match(Instant::now()).unwrap();
        assert_eq!(arena.match_state(), MatchState::StartMatch);
        assert!(arena.current_match().started_at.is_some());
    }

    #[test]
    fn assigned_teams_make_stations_ready() {
        let mut arena = Arena::new(MatchTiming::default());
        arena.load_match(scheduled_match()).unwrap();
        assert!(arena.check_can_start_match().is_ok());
        assert_eq!(arena.alliance_teams(Alliance::Red), vec![101, 102, 103]);
        assert_eq!(arena.alliance_stations()[&StationKey::B2].team, 105);
    }

    #[test]
    fn toggle_bypass_round_trips() {
        let mut arena = Arena::new(MatchTiming::default());
        assert!(arena.toggle_bypass(StationKey::R3));
        assert!(!arena.toggle_bypass(StationKey::R3));
        assert!(!arena.alliance_stations()[&StationKey::R3].bypass);
    }

    #[test]
    fn substitution_updates_current_match() {
        let mut arena = Arena::new(MatchTiming::default());
        arena.substitute_team(StationKey::B1, 254).unwrap();
        assert_eq!(arena.current_match().blue1, 254);
        arena.substitute_team(StationKey::B1, 0).unwrap();
        assert_eq!(arena.current_match().blue1, 0);
    }

    #[test]
    fn substitution_and_load_rejected_during_match() {
        let mut arena = Arena::new(MatchTiming::default());
        bypass_all(&mut arena);
        arena.start_match(Instant::now()).unwrap();
        assert_eq!(
            arena.substitute_team(StationKey::R1, 254),
            Err(ArenaError::MatchInProgress)
        );
        assert_eq!(
            arena.load_match(scheduled_match()),
            Err(ArenaError::MatchInProgress)
        );
    }

    #[test]
    fn going_live_switches_displays() {
        let mut arena = Arena::new(MatchTiming::default());
        bypass_all(&mut arena);
        let t0 = Instant::now();
        arena.start_match(t0).unwrap();

        let update = arena.update(t0);
        assert!(update.displays_changed);
        assert_eq!(arena.audience_display_screen, DISPLAY_MATCH);
        assert_eq!(arena.alliance_station_display_screen, DISPLAY_MATCH);

        let update = arena.update(t0 + Duration::from_secs(3));
        assert!(!update.displays_changed);
        assert_eq!(update.clock.period_changed, Some(MatchState::AutoPeriod));
    }

    #[test]
    fn abort_blanks_audience_display() {
        let mut arena = Arena::new(MatchTiming::default());
        assert!(matches!(
            arena.abort_match(),
            Err(ArenaError::Transition(_))
        ));

        bypass_all(&mut arena);
        arena.start_match(Instant::now()).unwrap();
        arena.audience_display_screen = DISPLAY_MATCH.into();
        arena.abort_match().unwrap();
        assert_eq!(arena.match_state(), MatchState::PostMatch);
        assert_eq!(arena.audience_display_screen, DISPLAY_BLANK);
    }

    #[test]
    fn reset_clears_bypass_and_scores() {
        let mut arena = Arena::new(MatchTiming::default());
        bypass_all(&mut arena);
        arena.start_match(Instant::now()).unwrap();
        arena.red_realtime_score.current_score.auto_points = 12;
        arena.blue_realtime_score.cards.insert(104, Card::Yellow);
        assert!(arena.reset_match().is_err());
        assert!(arena.ensure_post_match().is_err());

        arena.abort_match().unwrap();
        let result = arena.build_match_result();
        assert_eq!(result.red_score.auto_points, 12);
        assert_eq!(result.blue_cards.get(&104), Some(&Card::Yellow));

        arena.ensure_post_match().unwrap();
        arena.reset_match().unwrap();
        assert_eq!(arena.match_state(), MatchState::PreMatch);
        assert!(arena.alliance_stations().values().all(|s| !s.bypass));
        assert_eq!(arena.red_realtime_score, RealtimeScore::default());
    }
}
