//! Where catches end up.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use miette::Diagnostic;

use crate::{
    catch::{Catch, CatchRecord},
    species::SpeciesId,
};

/// Number of rows returned when a caller asks for a limit of zero.
pub const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("storage backend failed")]
    #[diagnostic(code(fishing::store::backend))]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("store lock poisoned")]
    #[diagnostic(code(fishing::store::lock_poisoned))]
    LockPoisoned,
}

impl Error {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

#[async_trait]
pub trait CatchStore: Send + Sync {
    /// Persists a catch and returns the id assigned to it.
    async fn append(&self, catch: &Catch) -> Result<i64, Error>;

    /// Persists several catches, returning their ids in order.
    async fn append_batch(&self, catches: &[Catch]) -> Result<Vec<i64>, Error> {
        let mut ids = Vec::with_capacity(catches.len());
        for catch in catches {
            ids.push(self.append(catch).await?);
        }
        Ok(ids)
    }

    /// The biggest catches of a guild, optionally of a single species.
    ///
    /// Ordered by size descending, equal sizes newest first. A `limit` of
    /// zero means [`DEFAULT_LIMIT`].
    async fn top_by_size(
        &self,
        guild_id: i64,
        limit: u32,
        species: Option<SpeciesId>,
    ) -> Result<Vec<CatchRecord>, Error>;
}

pub fn effective_limit(limit: u32) -> u32 {
    if limit == 0 {
        DEFAULT_LIMIT
    } else {
        limit
    }
}

/// A store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<CatchRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, Vec<CatchRecord>>, Error> {
        self.records.lock().map_err(|_| Error::LockPoisoned)
    }

    pub fn len(&self) -> usize {
        self.records().map_or(0, |records| records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn push(records: &mut Vec<CatchRecord>, catch: &Catch) -> i64 {
    let id = records.last().map_or(1, |record| record.id + 1);
    records.push(CatchRecord {
        id,
        catch: catch.clone(),
    });
    id
}

#[async_trait]
impl CatchStore for MemoryStore {
    async fn append(&self, catch: &Catch) -> Result<i64, Error> {
        Ok(push(&mut *self.records()?, catch))
    }

    async fn append_batch(&self, catches: &[Catch]) -> Result<Vec<i64>, Error> {
        let mut records = self.records()?;
        Ok(catches.iter().map(|catch| push(&mut records, catch)).collect())
    }

    async fn top_by_size(
        &self,
        guild_id: i64,
        limit: u32,
        species: Option<SpeciesId>,
    ) -> Result<Vec<CatchRecord>, Error> {
        let mut top: Vec<CatchRecord> = self
            .records()?
            .iter()
            .filter(|record| record.catch.guild_id == guild_id)
            .filter(|record| species.map_or(true, |id| record.catch.species_id == id))
            .cloned()
            .collect();

        top.sort_by(|a, b| {
            b.catch
                .size_tenths()
                .cmp(&a.catch.size_tenths())
                .then(b.id.cmp(&a.id))
        });
        top.truncate(effective_limit(limit) as usize);

        Ok(top)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn catch(guild_id: i64, species: u32, size: f64) -> Catch {
        Catch::new(guild_id, 1, SpeciesId::new(species), size, Utc::now())
    }

    fn ids(records: &[CatchRecord]) -> Vec<i64> {
        records.iter().map(|record| record.id).collect()
    }

    #[tokio::test]
    async fn ties_break_towards_newest() {
        let store = MemoryStore::new();
        for size in [5.0, 5.0, 3.2] {
            store.append(&catch(1, 0, size)).await.unwrap();
        }

        let top = store.top_by_size(1, 2, None).await.unwrap();

        assert_eq!(ids(&top), vec![2, 1]);
    }

    #[tokio::test]
    async fn filters_by_guild_and_species() {
        let store = MemoryStore::new();
        store
            .append_batch(&[
                catch(1, 0, 4.0),
                catch(2, 0, 90.0),
                catch(1, 1, 12.5),
                catch(1, 0, 7.1),
            ])
            .await
            .unwrap();

        let all = store.top_by_size(1, 10, None).await.unwrap();
        assert_eq!(ids(&all), vec![3, 4, 1]);

        let minnows = store.top_by_size(1, 10, Some(SpeciesId::new(0))).await.unwrap();
        assert_eq!(ids(&minnows), vec![4, 1]);
    }

    #[tokio::test]
    async fn zero_limit_uses_default() {
        let store = MemoryStore::new();
        for i in 0..15 {
            store.append(&catch(1, 0, f64::from(i))).await.unwrap();
        }

        let top = store.top_by_size(1, 0, None).await.unwrap();

        assert_eq!(top.len(), DEFAULT_LIMIT as usize);
        assert_eq!(top[0].catch.size, 14.0);
    }

    #[tokio::test]
    async fn empty_guild_is_not_an_error() {
        let store = MemoryStore::new();

        assert!(store.top_by_size(42, 5, None).await.unwrap().is_empty());
        assert!(store.is_empty());
    }
}
