//! Registry of live `GamePlugin`s, keyed by id and namespace (spec §4.D).

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::error::PluginError;
use crate::plugin::{GamePlugin, HubHandle};

pub struct PluginStats {
    pub id: String,
    pub namespace: String,
    pub event_count: usize,
}

/// Owns every registered plugin for the lifetime of the server. Registration
/// is a one-shot setup step (during `hearth` binary startup); lookups happen
/// on every inbound event, so `by_namespace` and `by_id` are plain DashMaps
/// rather than anything requiring a write lock per read.
#[derive(Default)]
pub struct PluginRegistry {
    by_id: DashMap<String, Arc<dyn GamePlugin>>,
    by_namespace: DashMap<String, Arc<dyn GamePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin and invokes its `on_initialize` hook. Fails if
    /// either the plugin's id or its namespace is already taken — both must
    /// be unique across the registry (spec §4.D).
    pub async fn register(
        &self,
        plugin: Arc<dyn GamePlugin>,
        hub: Arc<dyn HubHandle>,
    ) -> Result<(), PluginError> {
        let id = plugin.id().to_string();
        let namespace = plugin.namespace().to_string();

        if self.by_id.contains_key(&id) {
            return Err(PluginError::DuplicateRegistration(format!("id {id}")));
        }
        if self.by_namespace.contains_key(&namespace) {
            return Err(PluginError::DuplicateRegistration(format!(
                "namespace {namespace}"
            )));
        }

        plugin.on_initialize(hub).await?;

        info!(plugin = %id, namespace = %namespace, "plugin registered");
        self.by_id.insert(id, plugin.clone());
        self.by_namespace.insert(namespace, plugin);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn GamePlugin>> {
        self.by_id.get(id).map(|entry| entry.clone())
    }

    pub fn get_by_namespace(&self, namespace: &str) -> Option<Arc<dyn GamePlugin>> {
        self.by_namespace.get(namespace).map(|entry| entry.clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.by_id.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn stats(&self) -> Vec<PluginStats> {
        self.by_id
            .iter()
            .map(|entry| PluginStats {
                id: entry.key().clone(),
                namespace: entry.value().namespace().to_string(),
                event_count: entry.value().events().len(),
            })
            .collect()
    }

    /// Builds the full `event -> plugin` dispatch map by asking each
    /// registered plugin what events it accepts. Recomputed lazily by
    /// `hearth_server::connection` rather than cached here, since plugins
    /// never change their event set after registration.
    pub fn dispatch_table(&self) -> HashMap<String, Arc<dyn GamePlugin>> {
        let mut table = HashMap::new();
        for entry in self.by_id.iter() {
            let plugin = entry.value().clone();
            for event in plugin.events() {
                table.insert((*event).to_string(), plugin.clone());
            }
        }
        table
    }

    /// Invokes `on_cleanup` on every registered plugin. Best-effort: a
    /// failing plugin does not stop the others from cleaning up.
    pub async fn destroy(&self) {
        for entry in self.by_id.iter() {
            if let Err(err) = entry.value().on_cleanup().await {
                tracing::warn!(plugin = entry.key(), error = %err, "plugin cleanup failed");
            }
        }
        self.by_id.clear();
        self.by_namespace.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginEventContext;
    use async_trait::async_trait;
    use hearth_core::{ConnectionId, Room};

    struct NoopHub;

    #[async_trait]
    impl HubHandle for NoopHub {
        async fn send_to_connection(&self, _connection_id: ConnectionId, _event: &str, _payload: serde_json::Value) {}
        async fn send_to_room(&self, _room_code: &str, _event: &str, _payload: serde_json::Value) {}
        async fn send_to_room_immediate(&self, _room_code: &str, _event: &str, _payload: serde_json::Value) {}
    }

    struct StubPlugin {
        id: &'static str,
        namespace: &'static str,
    }

    #[async_trait]
    impl GamePlugin for StubPlugin {
        fn id(&self) -> &str {
            self.id
        }
        fn namespace(&self) -> &str {
            self.namespace
        }
        fn events(&self) -> &[&'static str] {
            &["stub:ping"]
        }
        async fn handle_event(
            &self,
            _event: &str,
            _payload: serde_json::Value,
            _ctx: PluginEventContext,
        ) -> Result<(), PluginError> {
            Ok(())
        }
        fn serialize_room(&self, _room: &Room, _perspective_connection_id: ConnectionId) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    fn hub() -> Arc<dyn HubHandle> {
        Arc::new(NoopHub)
    }

    #[tokio::test]
    async fn registers_and_looks_up_by_id_and_namespace() {
        let registry = PluginRegistry::new();
        let plugin = Arc::new(StubPlugin { id: "stub", namespace: "stub" });
        registry.register(plugin, hub()).await.unwrap();

        assert!(registry.get("stub").is_some());
        assert!(registry.get_by_namespace("stub").is_some());
        assert_eq!(registry.ids(), vec!["stub".to_string()]);
    }

    #[tokio::test]
    async fn rejects_duplicate_id() {
        let registry = PluginRegistry::new();
        registry
            .register(Arc::new(StubPlugin { id: "stub", namespace: "a" }), hub())
            .await
            .unwrap();

        let err = registry
            .register(Arc::new(StubPlugin { id: "stub", namespace: "b" }), hub())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::DuplicateRegistration(_)));
    }

    #[tokio::test]
    async fn rejects_duplicate_namespace() {
        let registry = PluginRegistry::new();
        registry
            .register(Arc::new(StubPlugin { id: "a", namespace: "shared" }), hub())
            .await
            .unwrap();

        let err = registry
            .register(Arc::new(StubPlugin { id: "b", namespace: "shared" }), hub())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::DuplicateRegistration(_)));
    }

    #[tokio::test]
    async fn dispatch_table_maps_every_declared_event() {
        let registry = PluginRegistry::new();
        registry
            .register(Arc::new(StubPlugin { id: "stub", namespace: "stub" }), hub())
            .await
            .unwrap();

        let table = registry.dispatch_table();
        assert!(table.contains_key("stub:ping"));
    }
}
