// SPDX-License-Identifier: MIT

//! Upgrades an older-versioned raw snapshot `Value` to `CURRENT_STATE_VERSION`
//! before it is deserialized into `MaterializedState`, field by field, one
//! `Migration` per version step.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than the highest supported version {1}")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
}

pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, value: &mut Value) -> Result<(), MigrationError>;
}

pub struct MigrationRegistry {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    pub fn register(mut self, migration: Box<dyn Migration>) -> Self {
        self.migrations.push(migration);
        self
    }

    /// Walk single-version-step migrations from the value's own
    /// `"version"` field up to `target_version`, applying each in order.
    pub fn migrate_to(&self, mut value: Value, target_version: u32) -> Result<Value, MigrationError> {
        let mut current = value
            .get("version")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(0);

        if current > target_version {
            return Err(MigrationError::TooNew(current, target_version));
        }

        while current < target_version {
            let step = self
                .migrations
                .iter()
                .find(|m| m.source_version() == current)
                .ok_or(MigrationError::NoPath(current, target_version))?;
            step.migrate(&mut value)?;
            current = step.target_version();
            if let Some(obj) = value.as_object_mut() {
                obj.insert("version".to_string(), Value::from(current));
            }
        }
        Ok(value)
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct V0ToV1;
    impl Migration for V0ToV1 {
        fn source_version(&self) -> u32 {
            0
        }
        fn target_version(&self) -> u32 {
            1
        }
        fn migrate(&self, value: &mut Value) -> Result<(), MigrationError> {
            if let Some(obj) = value.as_object_mut() {
                obj.entry("teams").or_insert_with(|| json!({}));
            }
            Ok(())
        }
    }

    #[test]
    fn migrates_through_single_step() {
        let registry = MigrationRegistry::new().register(Box::new(V0ToV1));
        let value = json!({"version": 0, "workflows": {}});
        let migrated = registry.migrate_to(value, 1).unwrap();
        assert_eq!(migrated["version"], 1);
        assert_eq!(migrated["teams"], json!({}));
    }

    #[test]
    fn no_path_errors_when_gap_exists() {
        let registry = MigrationRegistry::new();
        let value = json!({"version": 0});
        let err = registry.migrate_to(value, 2).unwrap_err();
        assert_eq!(err, MigrationError::NoPath(0, 2));
    }

    #[test]
    fn too_new_errors_when_snapshot_exceeds_target() {
        let registry = MigrationRegistry::new();
        let value = json!({"version": 5});
        let err = registry.migrate_to(value, 1).unwrap_err();
        assert_eq!(err, MigrationError::TooNew(5, 1));
    }

    #[test]
    fn already_current_is_a_no_op() {
        let registry = MigrationRegistry::new();
        let value = json!({"version": 1, "x": true});
        let migrated = registry.migrate_to(value.clone(), 1).unwrap();
        assert_eq!(migrated, value);
    }
}
