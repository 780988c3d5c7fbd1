//! Alarm persistence.
//!
//! [`JsonAlarmStore`] keeps the alarm list as a JSON array on disk and
//! re-reads it on every snapshot, so edits made by another process (the
//! CLI, say) are picked up by a running scheduler on its next tick.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::{
    alarm::{Alarm, AlarmId},
    error::StoreError,
};

pub trait AlarmStore {
    /// Every readable alarm, in stored order.
    fn snapshot(&self) -> Result<Vec<Alarm>, StoreError>;

    fn list_enabled_alarms(&self) -> Result<Vec<Alarm>, StoreError> {
        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|alarm| alarm.enabled)
            .collect())
    }

    /// Appends `alarm` and returns it as stored.
    fn insert(&mut self, alarm: Alarm) -> Result<Alarm, StoreError>;

    /// Replaces the alarm with the same id.
    fn update(&mut self, alarm: Alarm) -> Result<Alarm, StoreError>;

    fn remove(&mut self, id: &AlarmId) -> Result<Alarm, StoreError>;

    fn set_enabled(&mut self, id: &AlarmId, enabled: bool) -> Result<Alarm, StoreError>;

    fn toggle(&mut self, id: &AlarmId) -> Result<Alarm, StoreError> {
        let current = self
            .snapshot()?
            .into_iter()
            .find(|alarm| &alarm.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.set_enabled(id, !current.enabled)
    }
}

/// A stored element. Records that fail to decode are carried along
/// untouched so that rewriting the file never loses them.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Entry {
    Alarm(Alarm),
    Malformed(Value),
}

impl Entry {
    const fn alarm(&self) -> Option<&Alarm> {
        match self {
            Self::Alarm(alarm) => Some(alarm),
            Self::Malformed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonAlarmStore {
    path: PathBuf,
}

impl JsonAlarmStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Vec<Entry>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let values: Vec<Value> =
            serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(values
            .into_iter()
            .enumerate()
            .map(|(index, value)| match serde_json::from_value::<Alarm>(value.clone()) {
                Ok(alarm) => Entry::Alarm(alarm),
                Err(e) => {
                    warn!(
                        "skipping malformed alarm #{index} in {}: {e}",
                        self.path.display()
                    );
                    Entry::Malformed(value)
                }
            })
            .collect())
    }

    fn write_entries(&self, entries: &[Entry]) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(entries).map_err(StoreError::Serialize)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        // readers must never see a half written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_error)?;
        fs::rename(&tmp, &self.path).map_err(io_error)
    }

    /// Runs `edit` on the alarm with `id` and persists the result.
    fn modify(
        &self,
        id: &AlarmId,
        edit: impl FnOnce(&mut Vec<Entry>, usize) -> Alarm,
    ) -> Result<Alarm, StoreError> {
        let mut entries = self.read_entries()?;
        let index = entries
            .iter()
            .position(|entry| entry.alarm().is_some_and(|alarm| &alarm.id == id))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let alarm = edit(&mut entries, index);
        self.write_entries(&entries)?;
        Ok(alarm)
    }
}

impl AlarmStore for JsonAlarmStore {
    fn snapshot(&self) -> Result<Vec<Alarm>, StoreError> {
        Ok(self
            .read_entries()?
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Alarm(alarm) => Some(alarm),
                Entry::Malformed(_) => None,
            })
            .collect())
    }

    fn insert(&mut self, alarm: Alarm) -> Result<Alarm, StoreError> {
        let mut entries = self.read_entries()?;
        entries.push(Entry::Alarm(alarm.clone()));
        self.write_entries(&entries)?;
        Ok(alarm)
    }

    fn update(&mut self, alarm: Alarm) -> Result<Alarm, StoreError> {
        let id = alarm.id.clone();
        self.modify(&id, |entries, index| {
            entries[index] = Entry::Alarm(alarm.clone());
            alarm
        })
    }

    fn remove(&mut self, id: &AlarmId) -> Result<Alarm, StoreError> {
        self.modify(id, |entries, index| match entries.remove(index) {
            Entry::Alarm(alarm) => alarm,
            Entry::Malformed(_) => unreachable!("modify only selects decoded alarms"),
        })
    }

    fn set_enabled(&mut self, id: &AlarmId, enabled: bool) -> Result<Alarm, StoreError> {
        self.modify(id, |entries, index| {
            let Entry::Alarm(alarm) = &mut entries[index] else {
                unreachable!("modify only selects decoded alarms")
            };
            alarm.enabled = enabled;
            alarm.clone()
        })
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    alarms: Vec<Alarm>,
    unavailable: bool,
}

/// In-memory store. Clones share the same alarms.
#[derive(Debug, Clone, Default)]
pub struct MemoryAlarmStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAlarmStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_alarms(alarms: Vec<Alarm>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                alarms,
                unavailable: false,
            })),
        }
    }

    /// While unavailable every operation fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut Vec<Alarm>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        f(&mut state.alarms)
    }

    fn position(alarms: &[Alarm], id: &AlarmId) -> Result<usize, StoreError> {
        alarms
            .iter()
            .position(|alarm| &alarm.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl AlarmStore for MemoryAlarmStore {
    fn snapshot(&self) -> Result<Vec<Alarm>, StoreError> {
        self.with_state(|alarms| Ok(alarms.clone()))
    }

    fn insert(&mut self, alarm: Alarm) -> Result<Alarm, StoreError> {
        self.with_state(|alarms| {
            alarms.push(alarm.clone());
            Ok(alarm)
        })
    }

    fn update(&mut self, alarm: Alarm) -> Result<Alarm, StoreError> {
        self.with_state(|alarms| {
            let index = Self::position(alarms, &alarm.id)?;
            alarms[index] = alarm.clone();
            Ok(alarm)
        })
    }

    fn remove(&mut self, id: &AlarmId) -> Result<Alarm, StoreError> {
        self.with_state(|alarms| {
            let index = Self::position(alarms, id)?;
            Ok(alarms.remove(index))
        })
    }

    fn set_enabled(&mut self, id: &AlarmId, enabled: bool) -> Result<Alarm, StoreError> {
        self.with_state(|alarms| {
            let index = Self::position(alarms, id)?;
            alarms[index].enabled = enabled;
            Ok(alarms[index].clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmBuilder, AlarmTime};

    fn alarm(time: &str) -> Alarm {
        AlarmBuilder::new(time.parse::<AlarmTime>().unwrap()).build()
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonAlarmStore::new(dir.path().join("alarms.json"));
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn mutations_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("alarms.json");
        let mut store = JsonAlarmStore::new(&path);
        let seven = store.insert(alarm("07:00")).unwrap();
        let eight = store.insert(alarm("08:00")).unwrap();

        let toggled = store.toggle(&seven.id).unwrap();
        assert!(!toggled.enabled);

        let reopened = JsonAlarmStore::new(&path);
        let alarms = reopened.snapshot().unwrap();
        assert_eq!(alarms.len(), 2);
        assert!(!alarms[0].enabled);
        assert_eq!(reopened.list_enabled_alarms().unwrap(), vec![eight.clone()]);

        let mut relabelled = eight.clone();
        relabelled.label = "Standup".to_string();
        store.update(relabelled).unwrap();
        assert_eq!(store.snapshot().unwrap()[1].label, "Standup");

        store.remove(&seven.id).unwrap();
        assert_eq!(store.snapshot().unwrap().len(), 1);
        assert!(matches!(
            store.remove(&seven.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_records_are_skipped_but_kept_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.json");
        fs::write(
            &path,
            r#"[
                {"id": "good", "time": "07:00"},
                {"id": "bad", "time": "25:99"}
            ]"#,
        )
        .unwrap();
        let mut store = JsonAlarmStore::new(&path);
        let alarms = store.snapshot().unwrap();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].id.as_str(), "good");

        store.toggle(&AlarmId::from("good")).unwrap();
        let raw: Vec<Value> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[1]["time"], "25:99");
    }

    #[test]
    fn unparsable_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonAlarmStore::new(&path);
        assert!(matches!(store.snapshot(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn memory_store_can_be_switched_off() {
        let store = MemoryAlarmStore::with_alarms(vec![alarm("07:00")]);
        let handle = store.clone();
        handle.set_unavailable(true);
        assert!(matches!(
            store.snapshot(),
            Err(StoreError::Unavailable(_))
        ));
        handle.set_unavailable(false);
        assert_eq!(store.snapshot().unwrap().len(), 1);
    }
}
