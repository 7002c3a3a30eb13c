use std::collections::{HashMap, HashSet};
use std::fs::read_to_string;
use std::path::Path;

use anyhow::{Context, Error, bail};
use log::{trace, warn};
use serde::Deserialize;

use crate::gallery::io::directory::sanitize_filename;

/// One row of the movie list: a gallery id and the title it is saved under.
///
/// Extra fields in the input file are ignored.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct MovieRecord {
    pub(crate) id: u64,
    pub(crate) title: String,
}

/// Read-only id to title table driving a batch.
#[derive(Debug, Clone, Default)]
pub(crate) struct MovieList {
    /// Ids in the order they appeared in the input.
    order: Vec<u64>,
    titles: HashMap<u64, String>,
}

impl MovieList {
    /// Builds the table, rejecting duplicate ids.
    pub(crate) fn from_records(records: Vec<MovieRecord>) -> Result<Self, Error> {
        let mut list = MovieList {
            order: Vec::with_capacity(records.len()),
            titles: HashMap::with_capacity(records.len()),
        };

        for record in records {
            if list.titles.contains_key(&record.id) {
                bail!("Gallery id {} appears more than once in the movie list", record.id);
            }
            list.order.push(record.id);
            list.titles.insert(record.id, record.title);
        }

        list.warn_on_shared_titles();
        Ok(list)
    }

    /// Loads the movie list from a JSON array of `{ "id": .., "title": .. }` records.
    pub(crate) fn load(path: &Path) -> Result<Self, Error> {
        let contents = read_to_string(path)
            .with_context(|| format!("Failed to read movie list: {}", path.display()))?;
        let records: Vec<MovieRecord> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse movie list: {}", path.display()))?;
        trace!("Loaded {} records from {}", records.len(), path.display());

        Self::from_records(records)
    }

    /// Resolves a gallery id to its title.
    pub(crate) fn title(&self, id: u64) -> Option<&str> {
        self.titles.get(&id).map(String::as_str)
    }

    /// Gallery ids in input order.
    pub(crate) fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.order.iter().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Titles whose directory name was already taken by an earlier id, in input order.
    ///
    /// Titles are compared after sanitizing, so `Face/Off` and `Face_Off` collide.
    pub(crate) fn colliding_titles(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.order
            .iter()
            .filter_map(|id| self.titles.get(id))
            .filter(|title| !seen.insert(sanitize_filename(title)))
            .map(String::as_str)
            .collect()
    }

    /// Two ids sharing a directory would race on the same archive.
    fn warn_on_shared_titles(&self) {
        for title in self.colliding_titles() {
            warn!(
                "Title \"{}\" maps to a directory used by another gallery, downloads will collide",
                title
            );
        }
    }
}
