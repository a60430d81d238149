#![forbid(unsafe_code)]

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fishing::{
    store::{self, CatchStore},
    Catch, CatchRecord, SpeciesId,
};
use log::{debug, info};
use miette::Diagnostic;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Executor, Sqlite, SqlitePool,
};

pub const DATABASE_URL: &str = "sqlite://fish.db";

const INSERT_CATCH: &str = r#"
    INSERT INTO catches (guild_id, user_id, species_id, size_tenths, caught_at)
    VALUES (?, ?, ?, ?, ?)
"#;

const TOP_BY_SIZE: &str = r#"
    SELECT id, guild_id, user_id, species_id, size_tenths, caught_at
    FROM catches
    WHERE guild_id = ?
    ORDER BY size_tenths DESC, id DESC
    LIMIT ?
"#;

const TOP_BY_SIZE_FOR_SPECIES: &str = r#"
    SELECT id, guild_id, user_id, species_id, size_tenths, caught_at
    FROM catches
    WHERE guild_id = ? AND species_id = ?
    ORDER BY size_tenths DESC, id DESC
    LIMIT ?
"#;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("could not connect to database")]
    #[diagnostic(code(database::connect))]
    Connect(#[source] sqlx::Error),

    #[error("could not migrate database")]
    #[diagnostic(code(database::migrate))]
    Migrate(#[source] sqlx::migrate::MigrateError),

    #[error("database query failed")]
    #[diagnostic(code(database::query))]
    Query(#[source] sqlx::Error),

    #[error("catch {id} has invalid species id {species_id}")]
    #[diagnostic(code(database::invalid_species_id))]
    InvalidSpeciesId { id: i64, species_id: i64 },
}

impl From<Error> for store::Error {
    fn from(err: Error) -> Self {
        store::Error::backend(err)
    }
}

pub async fn connection(url: &str) -> Result<SqlitePool, Error> {
    debug!("Opening database connection");

    let options = SqliteConnectOptions::from_str(url)
        .map_err(Error::Connect)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    // a single connection keeps writes serialized and in-memory databases alive
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(Error::Connect)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), Error> {
    info!("Running Migrations");
    sqlx::migrate!().run(pool).await.map_err(Error::Migrate)
}

#[derive(Debug, sqlx::FromRow)]
struct CatchRow {
    id: i64,
    guild_id: i64,
    user_id: i64,
    species_id: i64,
    size_tenths: i64,
    caught_at: i64,
}

impl TryFrom<CatchRow> for CatchRecord {
    type Error = Error;

    fn try_from(row: CatchRow) -> Result<Self, Self::Error> {
        let species_id = u32::try_from(row.species_id).map_err(|_| Error::InvalidSpeciesId {
            id: row.id,
            species_id: row.species_id,
        })?;

        Ok(Self {
            id: row.id,
            catch: Catch {
                guild_id: row.guild_id,
                user_id: row.user_id,
                species_id: SpeciesId::new(species_id),
                size: row.size_tenths as f64 / 10.0,
                caught_at: Utc
                    .timestamp_opt(row.caught_at, 0)
                    .single()
                    .unwrap_or_default(),
            },
        })
    }
}

async fn insert<'e, E>(executor: E, catch: &Catch) -> Result<i64, Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(INSERT_CATCH)
        .bind(catch.guild_id)
        .bind(catch.user_id)
        .bind(i64::from(catch.species_id.get()))
        .bind(catch.size_tenths())
        .bind(catch.caught_at.timestamp())
        .execute(executor)
        .await
        .map_err(Error::Query)?;

    Ok(result.last_insert_rowid())
}

/// Catches stored in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to `url` and brings the schema up to date.
    pub async fn open(url: &str) -> Result<Self, Error> {
        let pool = connection(url).await?;
        migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CatchStore for SqliteStore {
    async fn append(&self, catch: &Catch) -> Result<i64, store::Error> {
        Ok(insert(&self.pool, catch).await?)
    }

    async fn append_batch(&self, catches: &[Catch]) -> Result<Vec<i64>, store::Error> {
        let mut tx = self.pool.begin().await.map_err(Error::Query)?;

        let mut ids = Vec::with_capacity(catches.len());
        for catch in catches {
            ids.push(insert(&mut tx, catch).await?);
        }

        tx.commit().await.map_err(Error::Query)?;
        Ok(ids)
    }

    async fn top_by_size(
        &self,
        guild_id: i64,
        limit: u32,
        species: Option<SpeciesId>,
    ) -> Result<Vec<CatchRecord>, store::Error> {
        let limit = i64::from(store::effective_limit(limit));

        let rows: Vec<CatchRow> = match species {
            Some(species_id) => {
                sqlx::query_as::<_, CatchRow>(TOP_BY_SIZE_FOR_SPECIES)
                    .bind(guild_id)
                    .bind(i64::from(species_id.get()))
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, CatchRow>(TOP_BY_SIZE)
                    .bind(guild_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(Error::Query)?;

        Ok(rows
            .into_iter()
            .map(CatchRecord::try_from)
            .collect::<Result<Vec<_>, Error>>()?)
    }
}

#[cfg(test)]
mod tests {
    use fishing::store::DEFAULT_LIMIT;

    use super::*;

    async fn memory_store() -> SqliteStore {
        SqliteStore::open("sqlite::memory:").await.unwrap()
    }

    fn catch(guild_id: i64, species: u32, size: f64) -> Catch {
        Catch::new(
            guild_id,
            99,
            SpeciesId::new(species),
            size,
            Utc.with_ymd_and_hms(2023, 4, 26, 11, 58, 12).unwrap(),
        )
    }

    fn ids(records: &[CatchRecord]) -> Vec<i64> {
        records.iter().map(|record| record.id).collect()
    }

    #[tokio::test]
    async fn equal_sizes_rank_newest_first() {
        let store = memory_store().await;
        for size in [5.0, 5.0, 3.2] {
            store.append(&catch(1, 0, size)).await.unwrap();
        }

        let top = store.top_by_size(1, 2, None).await.unwrap();

        assert_eq!(ids(&top), vec![2, 1]);
    }

    #[tokio::test]
    async fn round_trips_a_catch() {
        let store = memory_store().await;
        let stored = catch(7, 3, 1234.5);

        let id = store.append(&stored).await.unwrap();
        let top = store.top_by_size(7, 1, None).await.unwrap();

        assert_eq!(top, vec![CatchRecord { id, catch: stored }]);
    }

    #[tokio::test]
    async fn filters_by_species_and_guild() {
        let store = memory_store().await;
        let ids_in_order = store
            .append_batch(&[
                catch(1, 0, 4.0),
                catch(1, 1, 40.0),
                catch(2, 0, 8.0),
                catch(1, 0, 6.5),
            ])
            .await
            .unwrap();
        assert_eq!(ids_in_order, vec![1, 2, 3, 4]);

        let minnows = store.top_by_size(1, 10, Some(SpeciesId::new(0))).await.unwrap();
        assert_eq!(ids(&minnows), vec![4, 1]);

        let guild = store.top_by_size(1, 10, None).await.unwrap();
        assert_eq!(ids(&guild), vec![2, 4, 1]);
    }

    #[tokio::test]
    async fn zero_limit_falls_back_to_default() {
        let store = memory_store().await;
        let catches: Vec<_> = (0..12).map(|i| catch(1, 0, f64::from(i))).collect();
        store.append_batch(&catches).await.unwrap();

        let top = store.top_by_size(1, 0, None).await.unwrap();

        assert_eq!(top.len(), DEFAULT_LIMIT as usize);
        assert_eq!(top[0].catch.size, 11.0);
    }
}
