//! Design-side field storage boundary.
//!
//! The design tool owns per-component field storage; the engine only
//! reads and writes managed fields through the [`FieldStore`] trait,
//! and a write must land atomically per component. Two implementations
//! ship here: an in-memory store for tests and a JSON-file store the
//! CLI uses to sync exported design fields.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Named string fields of one design component.
pub type ComponentFields = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum FieldStoreError {
    #[error("unknown component: {0}")]
    UnknownComponent(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid field data: {0}")]
    Format(String),
}

/// Per-component field storage as seen from the engine.
///
/// `write_fields` replaces the component's field set as a whole: either
/// every managed field updates or none does.
#[async_trait]
pub trait FieldStore: Send + Sync {
    async fn read_fields(&self, component_id: &str) -> Result<ComponentFields, FieldStoreError>;

    async fn write_fields(
        &self,
        component_id: &str,
        fields: &ComponentFields,
    ) -> Result<(), FieldStoreError>;

    /// All component identifiers this store knows about.
    async fn component_ids(&self) -> Result<Vec<String>, FieldStoreError>;
}

/// In-memory field store, used by tests and embedders that already hold
/// the design's fields.
#[derive(Default)]
pub struct InMemoryFieldStore {
    components: RwLock<BTreeMap<String, ComponentFields>>,
}

impl InMemoryFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_components<I>(components: I) -> Self
    where
        I: IntoIterator<Item = (String, ComponentFields)>,
    {
        Self {
            components: RwLock::new(components.into_iter().collect()),
        }
    }

    pub async fn insert(&self, component_id: &str, fields: ComponentFields) {
        self.components
            .write()
            .await
            .insert(component_id.to_string(), fields);
    }

    /// Current fields of one component, for assertions.
    pub async fn fields_of(&self, component_id: &str) -> Option<ComponentFields> {
        self.components.read().await.get(component_id).cloned()
    }
}

#[async_trait]
impl FieldStore for InMemoryFieldStore {
    async fn read_fields(&self, component_id: &str) -> Result<ComponentFields, FieldStoreError> {
        self.components
            .read()
            .await
            .get(component_id)
            .cloned()
            .ok_or_else(|| FieldStoreError::UnknownComponent(component_id.to_string()))
    }

    async fn write_fields(
        &self,
        component_id: &str,
        fields: &ComponentFields,
    ) -> Result<(), FieldStoreError> {
        let mut components = self.components.write().await;
        if !components.contains_key(component_id) {
            return Err(FieldStoreError::UnknownComponent(component_id.to_string()));
        }
        components.insert(component_id.to_string(), fields.clone());
        Ok(())
    }

    async fn component_ids(&self) -> Result<Vec<String>, FieldStoreError> {
        Ok(self.components.read().await.keys().cloned().collect())
    }
}

/// Field store backed by a JSON file mapping component reference to its
/// fields, e.g. `{"R1": {"MPN": "R-1206-10K"}}`. Writes rewrite the
/// file through a temp-file-and-rename so a crash never leaves a
/// half-written design export behind.
pub struct JsonFieldStore {
    path: PathBuf,
    components: RwLock<BTreeMap<String, ComponentFields>>,
}

impl JsonFieldStore {
    pub fn load(path: &Path) -> Result<Self, FieldStoreError> {
        let data = std::fs::read_to_string(path)?;
        let components: BTreeMap<String, ComponentFields> =
            serde_json::from_str(&data).map_err(|e| FieldStoreError::Format(e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            components: RwLock::new(components),
        })
    }

    fn persist(&self, components: &BTreeMap<String, ComponentFields>) -> Result<(), FieldStoreError> {
        let data = serde_json::to_string_pretty(components)
            .map_err(|e| FieldStoreError::Format(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl FieldStore for JsonFieldStore {
    async fn read_fields(&self, component_id: &str) -> Result<ComponentFields, FieldStoreError> {
        self.components
            .read()
            .await
            .get(component_id)
            .cloned()
            .ok_or_else(|| FieldStoreError::UnknownComponent(component_id.to_string()))
    }

    async fn write_fields(
        &self,
        component_id: &str,
        fields: &ComponentFields,
    ) -> Result<(), FieldStoreError> {
        let mut components = self.components.write().await;
        if !components.contains_key(component_id) {
            return Err(FieldStoreError::UnknownComponent(component_id.to_string()));
        }
        components.insert(component_id.to_string(), fields.clone());
        self.persist(&components)
    }

    async fn component_ids(&self) -> Result<Vec<String>, FieldStoreError> {
        Ok(self.components.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FIELD_MPN;
    use tempfile::tempdir;

    fn fields(mpn: &str) -> ComponentFields {
        let mut f = ComponentFields::new();
        f.insert(FIELD_MPN.to_string(), mpn.to_string());
        f
    }

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let store = InMemoryFieldStore::new();
        store.insert("R1", fields("R-1206-10K")).await;

        let read = store.read_fields("R1").await.unwrap();
        assert_eq!(read.get(FIELD_MPN).map(String::as_str), Some("R-1206-10K"));

        store.write_fields("R1", &fields("R-0805-1K")).await.unwrap();
        let read = store.read_fields("R1").await.unwrap();
        assert_eq!(read.get(FIELD_MPN).map(String::as_str), Some("R-0805-1K"));
    }

    #[tokio::test]
    async fn in_memory_rejects_unknown_component() {
        let store = InMemoryFieldStore::new();
        assert!(matches!(
            store.read_fields("R9").await,
            Err(FieldStoreError::UnknownComponent(_))
        ));
        assert!(matches!(
            store.write_fields("R9", &fields("x")).await,
            Err(FieldStoreError::UnknownComponent(_))
        ));
    }

    #[tokio::test]
    async fn json_store_persists_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fields.json");
        std::fs::write(&path, r#"{"R1": {"MPN": "R-1206-10K"}, "C1": {}}"#).unwrap();

        let store = JsonFieldStore::load(&path).unwrap();
        let mut ids = store.component_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["C1", "R1"]);

        store.write_fields("R1", &fields("R-0805-1K")).await.unwrap();
        drop(store);

        let reloaded = JsonFieldStore::load(&path).unwrap();
        let read = reloaded.read_fields("R1").await.unwrap();
        assert_eq!(read.get(FIELD_MPN).map(String::as_str), Some("R-0805-1K"));
    }

    #[tokio::test]
    async fn json_store_rejects_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fields.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFieldStore::load(&path),
            Err(FieldStoreError::Format(_))
        ));
    }
}
