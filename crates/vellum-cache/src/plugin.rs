//! Plugin contract and registry.
//!
//! A plugin owns auxiliary tables derived from the record stream. The cache hands
//! each call its own SQLite transaction and commits only if the call succeeds.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{CacheError, CacheResult};
use crate::plugins::comments::{CommentsPlugin, COMMENTS_PLUGIN_ID};
use crate::plugins::votes::{VotesPlugin, VOTES_PLUGIN_ID};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSetting {
    pub key: String,
    pub value: String,
}

/// Identity and ordered settings of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub settings: Vec<PluginSetting>,
}

impl Plugin {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            settings: Vec::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push(PluginSetting {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// First value for `key`.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.value.as_str())
    }
}

/// A command routed to a plugin. `reply_payload` carries the write path's
/// confirmation for commands that must be applied together with it; it is empty
/// for read-only commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCommand {
    #[serde(rename = "pluginID")]
    pub id: String,
    pub command: String,
    #[serde(rename = "commandPayload")]
    pub command_payload: String,
    #[serde(rename = "replyPayload", default)]
    pub reply_payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCommandReply {
    #[serde(rename = "pluginID")]
    pub id: String,
    pub command: String,
    pub payload: String,
}

/// Behaviour every cache plugin implements.
pub trait PluginDriver: Send + Sync {
    /// Creates the plugin's tables. Must be idempotent.
    fn setup(&self, tx: &Transaction<'_>) -> CacheResult<()>;

    /// Wipes and repopulates the plugin's tables from a plugin-defined payload.
    fn build(&self, tx: &Transaction<'_>, payload: &str) -> CacheResult<()>;

    /// Runs one command. Unknown commands return `CacheError::InvalidPluginCmd`.
    fn exec(
        &self,
        tx: &Transaction<'_>,
        command: &str,
        command_payload: &str,
        reply_payload: &str,
    ) -> CacheResult<String>;
}

/// Built-in driver for a plugin identity, configured from its settings.
pub fn builtin_driver(plugin: &Plugin) -> CacheResult<Arc<dyn PluginDriver>> {
    match plugin.id.as_str() {
        COMMENTS_PLUGIN_ID => Ok(Arc::new(CommentsPlugin::from_plugin(plugin)?)),
        VOTES_PLUGIN_ID => Ok(Arc::new(VotesPlugin)),
        _ => Err(CacheError::InvalidPlugin),
    }
}

#[derive(Clone)]
pub struct RegisteredPlugin {
    pub plugin: Plugin,
    pub driver: Arc<dyn PluginDriver>,
}

/// Registered plugins by id. Each id registers at most once.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: DashMap<String, RegisteredPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `DuplicatePlugin` and keeps the existing entry if the id is taken.
    pub fn register(&self, plugin: Plugin, driver: Arc<dyn PluginDriver>) -> CacheResult<()> {
        match self.plugins.entry(plugin.id.clone()) {
            Entry::Occupied(_) => Err(CacheError::DuplicatePlugin),
            Entry::Vacant(slot) => {
                tracing::info!(
                    target: "vellum::plugin",
                    plugin_id = %plugin.id,
                    version = %plugin.version,
                    "plugin registered"
                );
                slot.insert(RegisteredPlugin { plugin, driver });
                Ok(())
            }
        }
    }

    /// Cloned out so no map shard stays locked while the driver runs.
    pub fn get(&self, id: &str) -> CacheResult<RegisteredPlugin> {
        self.plugins
            .get(id)
            .map(|r| r.value().clone())
            .ok_or(CacheError::InvalidPlugin)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.plugins.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl PluginDriver for Nop {
        fn setup(&self, _tx: &Transaction<'_>) -> CacheResult<()> {
            Ok(())
        }
        fn build(&self, _tx: &Transaction<'_>, _payload: &str) -> CacheResult<()> {
            Ok(())
        }
        fn exec(&self, _tx: &Transaction<'_>, command: &str, _: &str, _: &str) -> CacheResult<String> {
            match command {
                "ping" => Ok("pong".into()),
                _ => Err(CacheError::InvalidPluginCmd),
            }
        }
    }

    #[test]
    fn duplicate_registration_keeps_original() {
        let registry = PluginRegistry::new();
        registry.register(Plugin::new("ping", "1"), Arc::new(Nop)).unwrap();
        let err = registry
            .register(Plugin::new("ping", "2"), Arc::new(Nop))
            .unwrap_err();
        assert!(matches!(err, CacheError::DuplicatePlugin));
        assert_eq!(registry.get("ping").unwrap().plugin.version, "1");
        assert!(matches!(registry.get("nope"), Err(CacheError::InvalidPlugin)));
    }

    #[test]
    fn command_wire_names() {
        let cmd: PluginCommand = serde_json::from_str(
            r#"{"pluginID":"comments","command":"getcomments","commandPayload":"{}"}"#,
        )
        .unwrap();
        assert_eq!(cmd.id, "comments");
        assert_eq!(cmd.reply_payload, "");

        let settings = Plugin::new("comments", "1").with_setting("maxcommentlength", "8000");
        assert_eq!(settings.setting("maxcommentlength"), Some("8000"));
        assert!(matches!(
            builtin_driver(&Plugin::new("unknown", "1")),
            Err(CacheError::InvalidPlugin)
        ));
        assert!(builtin_driver(&Plugin::new("votes", "1")).is_ok());
    }
}
