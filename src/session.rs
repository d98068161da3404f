//! One interactive studio session.
//!
//! A session owns the history store handle and the display handles it has
//! minted. Handles are kept in two registries, one for the visible history
//! list and one for the record currently shown as the result, so that
//! replacing either view releases exactly the handles that view held.
//! Closing or dropping the session releases everything that is left.

use crate::config::StudioConfig;
use crate::generation::{Generator, ImageModel, StudioError};
use crate::history::{HistoryError, HistoryRecord, HistoryStore};
use crate::models::{GenerationSettings, ImageBlob};
use crate::object_url::ObjectUrlRegistry;
use log::debug;

/// Live state of one studio session.
#[derive(Debug)]
pub struct StudioSession {
    store: HistoryStore,

    /// Handles for the records in `history`.
    history_urls: ObjectUrlRegistry,

    /// Handles for `current`.
    result_urls: ObjectUrlRegistry,

    history: Vec<HistoryRecord>,
    current: Option<HistoryRecord>,
}

impl StudioSession {
    /// Opens the configured store and starts a session on it.
    pub async fn open(config: &StudioConfig) -> Result<Self, HistoryError> {
        let store = HistoryStore::open_with_config(config).await?;
        Ok(Self::new(store, &config.object_url_origin))
    }

    /// Starts a session on an already opened store.
    pub fn new(store: HistoryStore, origin: &str) -> Self {
        Self {
            store,
            history_urls: ObjectUrlRegistry::with_origin(origin),
            result_urls: ObjectUrlRegistry::with_origin(origin),
            history: Vec::new(),
            current: None,
        }
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Records in the history list, newest first.
    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    /// The record currently shown as the result, if any.
    pub fn current(&self) -> Option<&HistoryRecord> {
        self.current.as_ref()
    }

    /// Reloads the history list.
    ///
    /// Handles minted for the previous list are released before the new
    /// list is read.
    pub async fn refresh_history(&mut self) -> Result<&[HistoryRecord], HistoryError> {
        let released = self.history_urls.revoke_all();
        self.history.clear();
        debug!("Refreshing history, released {} handle(s)", released);

        self.history = self.store.get_all(&mut self.history_urls).await?;
        Ok(&self.history)
    }

    /// Loads a stored record as the current result.
    pub async fn show_record(&mut self, id: &str) -> Result<&HistoryRecord, HistoryError> {
        self.release_current();
        let record = self.store.get(id, &mut self.result_urls).await?;
        Ok(self.current.insert(record))
    }

    /// Runs a generation and shows its record as the current result.
    pub async fn generate<M: ImageModel>(
        &mut self,
        generator: &Generator<M>,
        source: ImageBlob,
        settings: GenerationSettings,
    ) -> Result<&HistoryRecord, StudioError> {
        self.release_current();
        let record = generator
            .run(&self.store, &mut self.result_urls, source, settings)
            .await?;
        Ok(self.current.insert(record))
    }

    /// Adds another batch of variants to the current result.
    ///
    /// # Returns
    ///
    /// The number of variants added.
    pub async fn regenerate<M: ImageModel>(
        &mut self,
        generator: &Generator<M>,
        settings: GenerationSettings,
    ) -> Result<usize, StudioError> {
        let record = self.current.as_mut().ok_or_else(|| {
            StudioError::History(HistoryError::NotFound("no current record".to_string()))
        })?;
        generator
            .regenerate(&self.store, &mut self.result_urls, record, settings)
            .await
    }

    /// Deletes a record and drops it from the visible views.
    pub async fn delete_record(&mut self, id: &str) -> Result<(), HistoryError> {
        self.store.delete(id).await?;

        if let Some(index) = self.history.iter().position(|r| r.id == id) {
            let mut removed = self.history.remove(index);
            removed.release_object_urls(&mut self.history_urls);
        }
        if self.current.as_ref().map(|r| r.id == id).unwrap_or(false) {
            self.release_current();
        }
        Ok(())
    }

    /// Removes every stored record and empties both views.
    pub async fn clear_history(&mut self) -> Result<(), HistoryError> {
        self.store.clear().await?;
        self.history_urls.revoke_all();
        self.history.clear();
        self.release_current();
        Ok(())
    }

    /// Resolves a display handle minted by this session.
    pub fn resolve(&self, handle: &str) -> Option<&ImageBlob> {
        self.result_urls
            .resolve(handle)
            .or_else(|| self.history_urls.resolve(handle))
    }

    /// Number of display handles currently live.
    pub fn live_handle_count(&self) -> usize {
        self.history_urls.live_count() + self.result_urls.live_count()
    }

    /// Ends the session, releasing every live handle.
    ///
    /// # Returns
    ///
    /// The number of handles released.
    pub fn close(mut self) -> usize {
        let released = self.history_urls.revoke_all() + self.result_urls.revoke_all();
        debug!("Closed studio session, released {} handle(s)", released);
        released
    }

    fn release_current(&mut self) {
        self.current = None;
        let released = self.result_urls.revoke_all();
        if released > 0 {
            debug!("Released {} result handle(s)", released);
        }
    }
}
