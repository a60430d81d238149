use log::warn;
use miette::Diagnostic;

use crate::{
    catch::CatchRecord,
    size_class::{size_class_for, SizeClass},
    species::{Species, SpeciesRegistry},
    store::{self, CatchStore},
};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("unknown fish '{0}'")]
    #[diagnostic(code(fishing::leaderboard::unknown_species))]
    UnknownSpecies(String),

    #[error("could not load leaderboard")]
    #[diagnostic(code(fishing::leaderboard::store))]
    Store(#[from] store::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// One-based position.
    pub rank: usize,
    pub record: CatchRecord,
    pub species: Species,
    pub size_class: SizeClass,
}

/// Loads the biggest catches of a guild and labels them for display.
///
/// `species_key` restricts the board to one species and must name a species
/// in the registry. Records whose species is no longer in the catalog are
/// skipped.
pub async fn top_catches(
    store: &dyn CatchStore,
    registry: &SpeciesRegistry,
    guild_id: i64,
    species_key: Option<&str>,
    limit: u32,
) -> Result<Vec<LeaderboardEntry>, Error> {
    let species_id = species_key
        .map(|key| {
            registry
                .id_by_key(key)
                .ok_or_else(|| Error::UnknownSpecies(key.to_string()))
        })
        .transpose()?;

    let records = store.top_by_size(guild_id, limit, species_id).await?;

    let entries = records
        .into_iter()
        .filter_map(|record| match registry.get(record.catch.species_id) {
            Some(species) => Some((record, species.clone())),
            None => {
                warn!(
                    "Catch {} references unknown species {}",
                    record.id, record.catch.species_id
                );
                None
            }
        })
        .enumerate()
        .map(|(index, (record, species))| LeaderboardEntry {
            rank: index + 1,
            size_class: size_class_for(&species, record.catch.size),
            record,
            species,
        })
        .collect();

    Ok(entries)
}
