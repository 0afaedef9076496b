//! SQLite-backed settings store.

use super::{SettingsError, SettingsResult, SettingsStore};
use crate::db::{open_db, open_db_in_memory, DbResult};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub struct SqliteSettingsStore {
    conn: Connection,
}

impl SqliteSettingsStore {
    /// Opens (or creates) the store at `path` with migrations applied.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn load_enabled(&self) -> SettingsResult<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT extension_id FROM enabled_extensions ORDER BY extension_id;")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut enabled = BTreeSet::new();
        for row in rows {
            enabled.insert(row?);
        }
        Ok(enabled)
    }

    fn load_settings(&self) -> SettingsResult<BTreeMap<String, Value>> {
        let mut stmt = self.conn.prepare(
            "SELECT extension_id, settings_json FROM extension_settings ORDER BY extension_id;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut settings = BTreeMap::new();
        for row in rows {
            let (extension_id, raw) = row?;
            let value = serde_json::from_str::<Value>(&raw).map_err(|err| {
                SettingsError::InvalidJson {
                    extension_id: extension_id.clone(),
                    message: err.to_string(),
                }
            })?;
            settings.insert(extension_id, value);
        }
        Ok(settings)
    }

    fn save_enabled(&mut self, enabled: &BTreeSet<String>) -> SettingsResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM enabled_extensions;", [])?;
        for extension_id in enabled {
            tx.execute(
                "INSERT INTO enabled_extensions (extension_id) VALUES (?1);",
                params![extension_id],
            )?;
        }
        tx.commit()?;
        log::debug!(
            "event=settings_save module=settings status=ok table=enabled_extensions rows={}",
            enabled.len()
        );
        Ok(())
    }

    fn save_settings(&mut self, settings: &BTreeMap<String, Value>) -> SettingsResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM extension_settings;", [])?;
        for (extension_id, value) in settings {
            tx.execute(
                "INSERT INTO extension_settings (extension_id, settings_json) VALUES (?1, ?2);",
                params![extension_id, value.to_string()],
            )?;
        }
        tx.commit()?;
        log::debug!(
            "event=settings_save module=settings status=ok table=extension_settings rows={}",
            settings.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteSettingsStore;
    use crate::settings::{SettingsError, SettingsStore};
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn round_trips_enabled_and_settings() {
        let mut store = SqliteSettingsStore::open_in_memory().expect("open store");
        let enabled = BTreeSet::from(["a".to_string(), "b".to_string()]);
        store.save_enabled(&enabled).expect("save enabled");
        store
            .save_settings(&BTreeMap::from([("a".to_string(), json!({"delimiter": ","}))]))
            .expect("save settings");

        assert_eq!(store.load_enabled().expect("load enabled"), enabled);
        let settings = store.load_settings().expect("load settings");
        assert_eq!(settings["a"]["delimiter"], ",");

        store
            .save_enabled(&BTreeSet::from(["b".to_string()]))
            .expect("replace enabled");
        assert_eq!(
            store.load_enabled().expect("load enabled"),
            BTreeSet::from(["b".to_string()])
        );
    }

    #[test]
    fn corrupt_blob_is_reported_with_its_id() {
        let store = SqliteSettingsStore::open_in_memory().expect("open store");
        store
            .connection()
            .execute(
                "INSERT INTO extension_settings (extension_id, settings_json) VALUES ('x', '{');",
                [],
            )
            .expect("insert corrupt row");
        let err = store.load_settings().expect_err("corrupt json");
        assert!(matches!(
            err,
            SettingsError::InvalidJson { ref extension_id, .. } if extension_id == "x"
        ));
    }
}
