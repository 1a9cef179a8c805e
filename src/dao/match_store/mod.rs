mod memory;

pub use self::memory::InMemoryMatchStore;

use futures::future::BoxFuture;

use crate::dao::models::{Match, MatchResult, MatchType, Team};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for matches, results and teams.
pub trait MatchStore: Send + Sync {
    /// Insert a match, allocating an identifier when `id` is zero.
    fn create_match(&self, entity: Match) -> BoxFuture<'static, StorageResult<Match>>;
    /// Fetch a match by identifier.
    fn get_match_by_id(&self, id: u32) -> BoxFuture<'static, StorageResult<Option<Match>>>;
    /// Overwrite an existing match.
    fn save_match(&self, entity: Match) -> BoxFuture<'static, StorageResult<()>>;
    /// List matches ordered by identifier, optionally restricted to one type.
    fn list_matches(
        &self,
        match_type: Option<MatchType>,
    ) -> BoxFuture<'static, StorageResult<Vec<Match>>>;
    /// Insert a result, allocating its identifier.
    fn create_match_result(
        &self,
        result: MatchResult,
    ) -> BoxFuture<'static, StorageResult<MatchResult>>;
    /// Most recently created result for the match, if any.
    fn get_match_result_for_match(
        &self,
        match_id: u32,
    ) -> BoxFuture<'static, StorageResult<Option<MatchResult>>>;
    /// Register a team. Fails with a conflict on a duplicate number.
    fn create_team(&self, team: Team) -> BoxFuture<'static, StorageResult<Team>>;
    /// Fetch a team by number.
    fn get_team_by_id(&self, id: u32) -> BoxFuture<'static, StorageResult<Option<Team>>>;
    /// Overwrite an existing team.
    fn save_team(&self, team: Team) -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
