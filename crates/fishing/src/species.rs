//! The species catalog.
//!
//! The catalog is loaded once at startup and never changes afterwards. Ids
//! are dense: a catalog of `n` species uses exactly the ids `0..n`, so a
//! species can be looked up by indexing.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    fs,
    path::Path,
};

use log::debug;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};

use crate::catch::round_to_tenths;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("could not read species file")]
    #[diagnostic(code(fishing::species::read))]
    Read(#[source] std::io::Error),

    #[error("could not parse species file")]
    #[diagnostic(code(fishing::species::parse))]
    Parse(#[source] serde_json::Error),

    #[error("species list is empty")]
    #[diagnostic(code(fishing::species::empty))]
    Empty,

    #[error("negative id at index {index}")]
    #[diagnostic(code(fishing::species::negative_id))]
    NegativeId { index: usize },

    #[error("duplicate id {0}")]
    #[diagnostic(code(fishing::species::duplicate_id))]
    DuplicateId(i64),

    #[error("missing key at id {0}")]
    #[diagnostic(code(fishing::species::missing_key))]
    MissingKey(i64),

    #[error("duplicate key {0:?}")]
    #[diagnostic(code(fishing::species::duplicate_key))]
    DuplicateKey(String),

    #[error("gap at id {0}")]
    #[diagnostic(
        code(fishing::species::gap),
        help("species ids must cover 0..n without holes")
    )]
    Gap(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(u32);

impl SpeciesId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl Display for SpeciesId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Species {
    pub id: SpeciesId,
    /// Stable identifier used by commands, survives renames.
    pub key: String,
    pub name: String,
    /// Relative commonness, at least 1.
    pub weight: u32,
    /// Lower size bound in centimeters.
    pub min_size: f64,
    pub max_size: f64,
    /// `1.0` rolls uniformly, larger values make big catches rarer.
    pub size_bias: f64,
    pub tags: Vec<String>,
    pub image: Option<String>,
}

impl Species {
    /// Upper size bound with an inverted range collapsed onto the lower bound.
    pub fn effective_max_size(&self) -> f64 {
        self.max_size.max(self.min_size)
    }

    /// Indefinite article for the species name.
    pub fn article(&self) -> &'static str {
        match self.name.chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
            _ => "a",
        }
    }
}

impl Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.1}cm - {:.1}cm)",
            self.name,
            self.min_size,
            self.effective_max_size()
        )
    }
}

fn default_size_bias() -> f64 {
    1.0
}

/// One entry of the species file as written on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesDescriptor {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub weight: i64,
    pub min_size: f64,
    pub max_size: f64,
    #[serde(default = "default_size_bias")]
    pub size_bias: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "thumbnail")]
    pub image: Option<String>,
}

/// Narrows `[min, max]` to the tenths it contains.
///
/// A range too small to hold a tenth, or an inverted one, is only rounded.
fn tenths_within(min: f64, max: f64) -> (f64, f64) {
    // tolerate representation error such as 2.0 * 10.0 = 20.000000000000004
    const SLACK: f64 = 1e-6;

    let low = (min * 10.0 - SLACK).ceil() / 10.0;
    let high = (max * 10.0 + SLACK).floor() / 10.0;
    if high < low {
        (round_to_tenths(min), round_to_tenths(max))
    } else {
        (low, high)
    }
}

#[derive(Debug, Clone)]
pub struct SpeciesRegistry {
    by_id: Vec<Species>,
    by_key: HashMap<String, SpeciesId>,
}

impl SpeciesRegistry {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        debug!("Loading species from {}", path.display());

        let raw = fs::read_to_string(path).map_err(Error::Read)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, Error> {
        let descriptors: Vec<SpeciesDescriptor> = serde_json::from_str(raw).map_err(Error::Parse)?;
        Self::load(descriptors)
    }

    /// Validates the descriptors and builds the registry.
    ///
    /// Weights below 1 are raised to 1 and size bounds are narrowed to whole
    /// tenths, so rounded rolls never leave them. Every other irregularity
    /// rejects the whole catalog.
    pub fn load(descriptors: Vec<SpeciesDescriptor>) -> Result<Self, Error> {
        if descriptors.is_empty() {
            return Err(Error::Empty);
        }

        let mut seen_ids = HashSet::with_capacity(descriptors.len());
        let mut seen_keys = HashSet::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.iter().enumerate() {
            if descriptor.id < 0 {
                return Err(Error::NegativeId { index });
            }
            if !seen_ids.insert(descriptor.id) {
                return Err(Error::DuplicateId(descriptor.id));
            }
            if descriptor.key.is_empty() {
                return Err(Error::MissingKey(descriptor.id));
            }
            if !seen_keys.insert(descriptor.key.as_str()) {
                return Err(Error::DuplicateKey(descriptor.key.clone()));
            }
        }

        // with unique ids, every id fits into 0..len exactly when there is no gap
        let mut slots: Vec<Option<Species>> = vec![None; descriptors.len()];
        for descriptor in descriptors {
            let Ok(index) = usize::try_from(descriptor.id) else {
                continue;
            };
            let (min_size, max_size) = tenths_within(descriptor.min_size, descriptor.max_size);
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(Species {
                    id: SpeciesId::from_index(index),
                    key: descriptor.key,
                    name: descriptor.name,
                    weight: u32::try_from(descriptor.weight.max(1)).unwrap_or(u32::MAX),
                    min_size,
                    max_size,
                    size_bias: descriptor.size_bias,
                    tags: descriptor.tags,
                    image: descriptor.image.filter(|image| !image.is_empty()),
                });
            }
        }

        let by_id = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(Error::Gap(index)))
            .collect::<Result<Vec<_>, _>>()?;

        let by_key = by_id
            .iter()
            .map(|species| (species.key.clone(), species.id))
            .collect();

        debug!("Loaded {} species", by_id.len());

        Ok(Self { by_id, by_key })
    }

    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.by_id.get(id.index())
    }

    pub fn name_by_id(&self, id: SpeciesId) -> &str {
        self.get(id).map_or("Unknown", |species| species.name.as_str())
    }

    pub fn id_by_key(&self, key: &str) -> Option<SpeciesId> {
        self.by_key.get(key).copied()
    }

    /// An owned copy of the catalog in id order.
    pub fn all(&self) -> Vec<Species> {
        self.by_id.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.by_id.iter()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
