use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::domain::ids::{ProjectId, TeamId};
use crate::domain::project_consolidation::ProjectConsolidation;
use crate::domain::replenishing_consolidation::ReplenishingConsolidation;
use crate::domain::team_consolidation::TeamConsolidation;
use crate::services::consolidation_store::{
    ConsolidationStore, ConsolidationTables, StoreError, UpsertOutcome,
};

#[derive(Serialize, Deserialize, Default)]
struct StoreDocument {
    #[serde(default)]
    project_consolidations: Vec<ProjectConsolidation>,
    #[serde(default)]
    team_consolidations: Vec<TeamConsolidation>,
    #[serde(default)]
    replenishing_consolidations: Vec<ReplenishingConsolidation>,
}

/// A snapshot store backed by one YAML file. Every upsert takes an exclusive
/// lock on `<file>.lock`, then rewrites the file through a uniquely named
/// temporary sibling and a rename. If the file changed on disk since it was
/// last read, the upsert fails with [`StoreError::Conflict`] after reloading,
/// so a retry applies on top of the other writer's rows.
#[derive(Debug)]
pub struct YamlConsolidationStore {
    path: PathBuf,
    tables: ConsolidationTables,
    last_seen: Option<String>,
}

impl YamlConsolidationStore {
    /// Opens the store at `path`; a missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let last_seen = read_if_exists(&path)?;
        let tables = match &last_seen {
            Some(contents) => parse_tables(&path, contents)?,
            None => ConsolidationTables::default(),
        };
        debug!(
            path = %path.display(),
            projects = tables.projects.len(),
            teams = tables.teams.len(),
            "opened snapshot store"
        );
        Ok(Self {
            path,
            tables,
            last_seen,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write<F>(&mut self, key: String, apply: F) -> Result<UpsertOutcome, StoreError>
    where
        F: FnOnce(&mut ConsolidationTables) -> UpsertOutcome,
    {
        let _lock = StoreLock::acquire(&self.path)?;
        let on_disk = read_if_exists(&self.path)?;
        if on_disk != self.last_seen {
            self.tables = match &on_disk {
                Some(contents) => parse_tables(&self.path, contents)?,
                None => ConsolidationTables::default(),
            };
            self.last_seen = on_disk;
            return Err(StoreError::Conflict { key });
        }

        let mut tables = self.tables.clone();
        let outcome = apply(&mut tables);
        let contents = render_tables(&self.path, &tables)?;
        write_atomically(&self.path, &contents)?;
        self.tables = tables;
        self.last_seen = Some(contents);
        Ok(outcome)
    }
}

impl ConsolidationStore for YamlConsolidationStore {
    fn upsert_project(&mut self, row: ProjectConsolidation) -> Result<UpsertOutcome, StoreError> {
        let key = key_label(row.project_id, row.consolidation_date);
        self.write(key, |tables| tables.upsert_project(row))
    }

    fn upsert_team(&mut self, row: TeamConsolidation) -> Result<UpsertOutcome, StoreError> {
        let key = key_label(row.team_id, row.consolidation_date);
        self.write(key, |tables| tables.upsert_team(row))
    }

    fn upsert_replenishing(
        &mut self,
        row: ReplenishingConsolidation,
    ) -> Result<UpsertOutcome, StoreError> {
        let key = key_label(row.project_id, row.consolidation_date);
        self.write(key, |tables| tables.upsert_replenishing(row))
    }

    fn project_consolidations(&self, id: ProjectId) -> Vec<ProjectConsolidation> {
        self.tables.project_consolidations(id)
    }

    fn team_consolidations(&self, id: TeamId) -> Vec<TeamConsolidation> {
        self.tables.team_consolidations(id)
    }

    fn replenishing_consolidations(&self, team: TeamId) -> Vec<ReplenishingConsolidation> {
        self.tables.replenishing_consolidations(team)
    }
}

/// Exclusive advisory lock held from the conflict check through the rename.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(store_path: &Path) -> Result<Self, StoreError> {
        let mut lock_name = store_path.as_os_str().to_owned();
        lock_name.push(".lock");
        let lock_path = PathBuf::from(lock_name);
        let io_error = |source| StoreError::Io {
            path: lock_path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_error)?;
        FileExt::lock_exclusive(&file).map_err(io_error)?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn key_label(id: impl Display, date: impl Display) -> String {
    format!("({id}, {date})")
}

fn read_if_exists(path: &Path) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_tables(path: &Path, contents: &str) -> Result<ConsolidationTables, StoreError> {
    if contents.trim().is_empty() {
        return Ok(ConsolidationTables::default());
    }
    let document: StoreDocument =
        serde_yaml::from_str(contents).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(ConsolidationTables {
        projects: unique_rows("project consolidation", document.project_consolidations, |row| {
            row.key()
        })?,
        teams: unique_rows("team consolidation", document.team_consolidations, |row| row.key())?,
        replenishing: unique_rows(
            "replenishing consolidation",
            document.replenishing_consolidations,
            |row| row.key(),
        )?,
    })
}

fn unique_rows<K, R, F>(
    kind: &'static str,
    rows: Vec<R>,
    key_of: F,
) -> Result<BTreeMap<K, R>, StoreError>
where
    K: Ord + Copy + std::fmt::Debug,
    F: Fn(&R) -> K,
{
    let mut table = BTreeMap::new();
    for row in rows {
        let key = key_of(&row);
        if table.insert(key, row).is_some() {
            return Err(StoreError::DuplicateKey {
                kind,
                key: format!("{key:?}"),
            });
        }
    }
    Ok(table)
}

fn render_tables(path: &Path, tables: &ConsolidationTables) -> Result<String, StoreError> {
    let document = StoreDocument {
        project_consolidations: tables.projects.values().cloned().collect(),
        team_consolidations: tables.teams.values().cloned().collect(),
        replenishing_consolidations: tables.replenishing.values().cloned().collect(),
    };
    serde_yaml::to_string(&document).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomically(path: &Path, contents: &str) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir).map_err(io_error)?;
    temp.write_all(contents.as_bytes()).map_err(io_error)?;
    temp.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}
