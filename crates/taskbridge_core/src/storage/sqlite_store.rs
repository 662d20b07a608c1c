use crate::error::AppError;
use crate::model::timestamp::{format_timestamp, from_epoch_seconds};
use crate::model::{RawAnnotation, RawNumber, RawTask};
use crate::repository::RecordSource;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DATABASE_FILE_NAME: &str = "taskchampion.sqlite3";

const SELECT_TASKS: &str = "SELECT uuid, data FROM tasks";
const SELECT_TASK: &str = "SELECT uuid, data FROM tasks WHERE uuid = ?1";
const SELECT_WORKING_SET: &str = "SELECT id, uuid FROM working_set WHERE uuid IS NOT NULL";
const SELECT_WORKING_SET_ENTRY: &str = "SELECT uuid FROM working_set WHERE id = ?1";

const ANNOTATION_PREFIX: &str = "annotation_";
const TAG_PREFIX: &str = "tag_";
const DEPENDENCY_PREFIX: &str = "dep_";

/// Read-only view over the tool's local task database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(DATABASE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, AppError> {
        if !self.path.exists() {
            return Err(AppError::storage(format!(
                "{}: database not found",
                self.path.display()
            )));
        }
        debug!(path = %self.path.display(), "opening task database");
        Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|err| storage_error(&self.path, err))
    }

    fn working_set(&self, conn: &Connection) -> Result<HashMap<String, u32>, AppError> {
        let mut stmt = conn
            .prepare(SELECT_WORKING_SET)
            .map_err(|err| storage_error(&self.path, err))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))
            .map_err(|err| storage_error(&self.path, err))?;

        let mut ids = HashMap::new();
        for row in rows {
            let (id, uuid) = row.map_err(|err| storage_error(&self.path, err))?;
            if id > 0 {
                ids.insert(uuid, id);
            }
        }
        Ok(ids)
    }

    fn load_uuid(
        &self,
        conn: &Connection,
        uuid: &str,
    ) -> Result<Option<(String, String)>, AppError> {
        conn.query_row(SELECT_TASK, params![uuid], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .optional()
        .map_err(|err| storage_error(&self.path, err))
    }

    fn uuid_for_id(&self, conn: &Connection, id: u32) -> Result<Option<String>, AppError> {
        conn.query_row(SELECT_WORKING_SET_ENTRY, params![id], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()
        .map(Option::flatten)
        .map_err(|err| storage_error(&self.path, err))
    }

    fn record(
        &self,
        uuid: String,
        data: &str,
        working_set: &HashMap<String, u32>,
    ) -> Result<RawTask, AppError> {
        let properties: BTreeMap<String, String> = serde_json::from_str(data).map_err(|err| {
            AppError::invalid_data(format!("task {uuid} in {}: {err}", self.path.display()))
        })?;
        let id = working_set.get(&uuid).copied();
        Ok(raw_from_properties(uuid, id, properties))
    }
}

impl RecordSource for SqliteStore {
    fn export_all(&self) -> Result<Vec<RawTask>, AppError> {
        let conn = self.open()?;
        let working_set = self.working_set(&conn)?;

        let mut stmt = conn
            .prepare(SELECT_TASKS)
            .map_err(|err| storage_error(&self.path, err))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|err| storage_error(&self.path, err))?;

        let mut records = Vec::new();
        for row in rows {
            let (uuid, data) = row.map_err(|err| storage_error(&self.path, err))?;
            records.push(self.record(uuid, &data, &working_set)?);
        }
        debug!(count = records.len(), "read tasks from database");
        Ok(records)
    }

    fn export_one(&self, id_or_uuid: &str) -> Result<Vec<RawTask>, AppError> {
        let target = id_or_uuid.trim();
        if target.is_empty() {
            return Err(AppError::invalid_input("task identifier is required"));
        }

        let conn = self.open()?;
        let uuid = match target.parse::<u32>() {
            Ok(id) => match self.uuid_for_id(&conn, id)? {
                Some(uuid) => uuid,
                None => return Ok(Vec::new()),
            },
            Err(_) => target.to_string(),
        };

        let Some((uuid, data)) = self.load_uuid(&conn, &uuid)? else {
            return Ok(Vec::new());
        };
        let working_set = self.working_set(&conn)?;
        Ok(vec![self.record(uuid, &data, &working_set)?])
    }
}

fn storage_error(path: &Path, err: rusqlite::Error) -> AppError {
    AppError::storage(format!("{}: {}", path.display(), err))
}

/// Maps the database's flat string properties onto export field names.
fn raw_from_properties(
    uuid: String,
    id: Option<u32>,
    properties: BTreeMap<String, String>,
) -> RawTask {
    let mut raw = RawTask {
        id: id.map(|id| RawNumber::Integer(u64::from(id))),
        uuid: Some(uuid),
        ..RawTask::default()
    };
    let mut annotations = Vec::new();
    let mut tags = Vec::new();
    let mut depends = Vec::new();

    for (key, value) in properties {
        if let Some(epoch) = key.strip_prefix(ANNOTATION_PREFIX) {
            annotations.push((
                epoch.parse::<i64>().unwrap_or(i64::MAX),
                RawAnnotation {
                    description: Some(value),
                    entry: Some(epoch_to_export(epoch)),
                },
            ));
            continue;
        }
        if let Some(tag) = key.strip_prefix(TAG_PREFIX) {
            tags.push(Value::String(tag.to_string()));
            continue;
        }
        if let Some(dependency) = key.strip_prefix(DEPENDENCY_PREFIX) {
            depends.push(Value::String(dependency.to_string()));
            continue;
        }

        match key.as_str() {
            "description" => raw.description = Some(value),
            "status" => raw.status = Some(value),
            "project" => raw.project = Some(value),
            "priority" => raw.priority = Some(value),
            "entry" => raw.entry = Some(epoch_to_export(&value)),
            "modified" => raw.modified = Some(epoch_to_export(&value)),
            "start" => raw.start = Some(epoch_to_export(&value)),
            "end" => raw.end = Some(epoch_to_export(&value)),
            "due" => raw.due = Some(epoch_to_export(&value)),
            "wait" => raw.wait = Some(epoch_to_export(&value)),
            "recur" => raw.recur = Some(value),
            "rtype" => raw.rtype = Some(value),
            "mask" => raw.mask = Some(value),
            "imask" => raw.imask = Some(RawNumber::Text(value)),
            "parent" => raw.parent = Some(value),
            _ => {
                raw.extra.insert(key, Value::String(value));
            }
        }
    }

    if !annotations.is_empty() {
        annotations.sort_by_key(|(epoch, _)| *epoch);
        raw.annotations = Some(annotations.into_iter().map(|(_, note)| note).collect());
    }
    if !tags.is_empty() {
        raw.extra.insert("tags".to_string(), Value::Array(tags));
    }
    if !depends.is_empty() {
        raw.extra.insert("depends".to_string(), Value::Array(depends));
    }
    raw
}

/// Epoch seconds become the export's compact form; anything else passes through.
fn epoch_to_export(value: &str) -> String {
    match from_epoch_seconds(value) {
        Some(timestamp) => format_timestamp(timestamp),
        None => value.to_string(),
    }
}
