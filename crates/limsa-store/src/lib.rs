//! JSON-file storage for Limsa models
//!
//! [`JsonFileStore`] keeps the whole table set in memory and rewrites the
//! file after every successful write, so each create, update and delete is
//! committed on its own. A failed write surfaces as
//! [`StoreError`], which the builder reports as `SaveFailed`.

use std::path::{Path, PathBuf};

use limsa_core::{
    Chain, ChainId, EntityKey, EntityKind, Interaction, MemoryStore, ModelStore, NewInteraction,
    NewRawInput, NewTransition, RawInput, Reference, State, StoreResult, Tables, TransitionId,
    TransitionProbability,
};
use tracing::{debug, info};

/// File-backed store
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open or create a file store; the file itself is created on the first write
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let tables = if path.is_file() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Tables>(&contents)?
        } else {
            Tables::default()
        };

        info!(
            path = %path.display(),
            chains = tables.entities().chains.len(),
            "File store opened"
        );

        Ok(Self {
            path,
            inner: MemoryStore::from_tables(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tables(&self) -> &Tables {
        self.inner.tables()
    }

    /// Persist the table set to disk
    pub fn flush(&self) -> StoreResult<()> {
        let contents = serde_json::to_string_pretty(self.inner.tables())?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, contents)?;

        debug!(path = %self.path.display(), "File store flushed");
        Ok(())
    }

    fn committed<T>(&self, value: T) -> StoreResult<T> {
        self.flush()?;
        Ok(value)
    }
}

impl ModelStore for JsonFileStore {
    fn name(&self) -> &str {
        "json-file"
    }

    fn create_reference(&mut self, name: &str, bibtex: Option<&str>) -> StoreResult<Reference> {
        let reference = self.inner.create_reference(name, bibtex)?;
        self.committed(reference)
    }

    fn create_raw_input(&mut self, input: NewRawInput) -> StoreResult<RawInput> {
        let input = self.inner.create_raw_input(input)?;
        self.committed(input)
    }

    fn create_chain(&mut self, name: &str) -> StoreResult<Chain> {
        let chain = self.inner.create_chain(name)?;
        self.committed(chain)
    }

    fn create_state(&mut self, chain: ChainId, name: &str) -> StoreResult<State> {
        let state = self.inner.create_state(chain, name)?;
        self.committed(state)
    }

    fn create_transition(
        &mut self,
        transition: NewTransition,
    ) -> StoreResult<TransitionProbability> {
        let tp = self.inner.create_transition(transition)?;
        self.committed(tp)
    }

    fn create_interaction(&mut self, interaction: NewInteraction) -> StoreResult<Interaction> {
        let interaction = self.inner.create_interaction(interaction)?;
        self.committed(interaction)
    }

    fn update_chain(&mut self, chain: &Chain) -> StoreResult<()> {
        self.inner.update_chain(chain)?;
        self.flush()
    }

    fn set_transition_chain(&mut self, id: TransitionId, chain: ChainId) -> StoreResult<()> {
        self.inner.set_transition_chain(id, chain)?;
        self.flush()
    }

    fn delete(&mut self, key: EntityKey) -> StoreResult<bool> {
        let removed = self.inner.delete(key)?;
        self.committed(removed)
    }

    fn delete_all(&mut self, kind: EntityKind) -> StoreResult<usize> {
        let removed = self.inner.delete_all(kind)?;
        debug!(kind = %kind, removed, "Table cleared");
        self.committed(removed)
    }

    fn references(&self) -> StoreResult<Vec<Reference>> {
        self.inner.references()
    }

    fn raw_inputs(&self) -> StoreResult<Vec<RawInput>> {
        self.inner.raw_inputs()
    }

    fn chains(&self) -> StoreResult<Vec<Chain>> {
        self.inner.chains()
    }

    fn states(&self) -> StoreResult<Vec<State>> {
        self.inner.states()
    }

    fn transitions(&self) -> StoreResult<Vec<TransitionProbability>> {
        self.inner.transitions()
    }

    fn interactions(&self) -> StoreResult<Vec<Interaction>> {
        self.inner.interactions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limsa_core::{InputBounds, StoreError, TransitionRate};
    use tempfile::tempdir;

    #[test]
    fn test_each_write_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("limsa.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        assert!(!path.exists());
        let chain = store.create_chain("TB disease").unwrap();
        assert!(path.exists());
        let uninfected = store.create_state(chain.id, "Uninfected").unwrap();
        let fast = store.create_state(chain.id, "Fast latent").unwrap();
        store
            .create_transition(NewTransition {
                from_state: uninfected.id,
                to_state: fast.id,
                chain: chain.id,
                rate: TransitionRate::Dynamic,
            })
            .unwrap();
        store
            .create_raw_input(NewRawInput::new(
                "Proportion of individuals developing fast latent TB",
                "prop_fast",
                InputBounds::new(0.5, 0.25, 0.75),
            ))
            .unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.tables(), store.tables());
        assert_eq!(
            reopened.state_by_name(chain.id, "Fast latent").unwrap(),
            Some(fast)
        );
    }

    #[test]
    fn test_numbering_continues_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("limsa.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.create_chain("TB disease").unwrap();
        drop(store);

        let mut store = JsonFileStore::open(&path).unwrap();
        let next = store.create_chain("TB resistance").unwrap();
        assert_eq!(next.id, ChainId(2));

        assert_eq!(store.delete_all(EntityKind::Chain).unwrap(), 2);
        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(reopened.chains().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("limsa.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_unwritable_path_fails_the_write() {
        let dir = tempdir().unwrap();
        // a directory where the file should be
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();

        let mut store = JsonFileStore::open(&path).unwrap();
        assert!(matches!(
            store.create_chain("TB disease"),
            Err(StoreError::Io(_))
        ));
    }
}
