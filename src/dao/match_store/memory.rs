use std::{collections::BTreeMap, sync::Arc};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    match_store::MatchStore,
    models::{Match, MatchResult, MatchType, Team},
    storage::{StorageError, StorageResult},
};

#[derive(Debug, Default)]
struct Tables {
    matches: BTreeMap<u32, Match>,
    results: BTreeMap<u32, MatchResult>,
    teams: BTreeMap<u32, Team>,
    last_match_id: u32,
    last_result_id: u32,
}

/// Process-local store used when no external database is configured.
#[derive(Clone, Default)]
pub struct InMemoryMatchStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchStore for InMemoryMatchStore {
    fn create_match(&self, mut entity: Match) -> BoxFuture<'static, StorageResult<Match>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.write().await;
            if entity.id == 0 {
                entity.id = tables.last_match_id + 1;
            }
            if tables.matches.contains_key(&entity.id) {
                return Err(StorageError::Conflict(format!("match {}", entity.id)));
            }
            tables.last_match_id = tables.last_match_id.max(entity.id);
            tables.matches.insert(entity.id, entity.clone());
            Ok(entity)
        })
    }

    fn get_match_by_id(&self, id: u32) -> BoxFuture<'static, StorageResult<Option<Match>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.read().await.matches.get(&id).cloned()) })
    }

    fn save_match(&self, entity: Match) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.write().await;
            match tables.matches.get_mut(&entity.id) {
                Some(slot) => {
                    *slot = entity;
                    Ok(())
                }
                None => Err(StorageError::NotFound(format!("match {}", entity.id))),
            }
        })
    }

    fn list_matches(
        &self,
        match_type: Option<MatchType>,
    ) -> BoxFuture<'static, StorageResult<Vec<Match>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let tables = tables.read().await;
            Ok(tables
                .matches
                .values()
                .filter(|entity| match_type.is_none_or(|kind| entity.match_type == kind))
                .cloned()
                .collect())
        })
    }

    fn create_match_result(
        &self,
        mut result: MatchResult,
    ) -> BoxFuture<'static, StorageResult<MatchResult>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.write().await;
            if !tables.matches.contains_key(&result.match_id) {
                return Err(StorageError::NotFound(format!("match {}", result.match_id)));
            }
            tables.last_result_id += 1;
            result.id = tables.last_result_id;
            tables.results.insert(result.id, result.clone());
            Ok(result)
        })
    }

    fn get_match_result_for_match(
        &self,
        match_id: u32,
    ) -> BoxFuture<'static, StorageResult<Option<MatchResult>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let tables = tables.read().await;
            Ok(tables
                .results
                .values()
                .rev()
                .find(|result| result.match_id == match_id)
                .cloned())
        })
    }

    fn create_team(&self, team: Team) -> BoxFuture<'static, StorageResult<Team>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.write().await;
            if tables.teams.contains_key(&team.id) {
                return Err(StorageError::Conflict(format!("team {}", team.id)));
            }
            tables.teams.insert(team.id, team.clone());
            Ok(team)
        })
    }

    fn get_team_by_id(&self, id: u32) -> BoxFuture<'static, StorageResult<Option<Team>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.read().await.teams.get(&id).cloned()) })
    }

    fn save_team(&self, team: Team) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.write().await;
            match tables.teams.get_mut(&team.id) {
                Some(slot) => {
                    *slot = team;
                    Ok(())
                }
                None => Err(StorageError::NotFound(format!("team {}", team.id))),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
