//! SQLite-backed object store.
//!
//! Every node is one row of the `nodes` table: its id, kind tag, parent id
//! and the JSON-encoded persisted fields. Activation state is tracked in
//! memory per `Database` handle (shared by its clones).

mod schema;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{ListStorage, NodeId, OrderedPropertyMap, PropertyMap, VecStorage};
use crate::persist::{CollectionFactory, NodeRecord, ObjectPersistor, TypeSchema};

/// Collections for stored nodes. Property bags keep their keys ordered so
/// they serialize deterministically.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoredCollections;

impl CollectionFactory for StoredCollections {
    fn create_list(&self, _owner: NodeId) -> Box<dyn ListStorage> {
        Box::new(VecStorage::new())
    }

    fn create_map(&self, _owner: NodeId) -> Box<dyn PropertyMap> {
        Box::new(OrderedPropertyMap::default())
    }
}

/// Handle to an open store transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    token: String,
    started_at: DateTime<Utc>,
}

impl Transaction {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RootFolderSummary {
    pub id: NodeId,
    pub source: String,
    pub stored_at: DateTime<Utc>,
}

/// An activation change made inside the open transaction.
#[derive(Debug, Clone, Copy)]
enum ActivationChange {
    Gained(NodeId),
    Lost(NodeId),
}

#[derive(Debug, Default)]
struct StoreState {
    activated: HashSet<NodeId>,
    processed: HashSet<&'static str>,
    transaction: Option<Transaction>,
    journal: Vec<ActivationChange>,
}

impl StoreState {
    fn record(&mut self, change: ActivationChange) {
        if self.transaction.is_some() {
            self.journal.push(change);
        }
    }
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
    state: Arc<Mutex<StoreState>>,
    path: Option<PathBuf>,
    collections: StoredCollections,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        tracing::info!("Opened store at {}", path.display());
        Ok(Self::from_connection(conn, Some(path)))
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "infohub")
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("infohub.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn, None))
    }

    /// Creates a new, migrated store file.
    ///
    /// Fails when the file exists, unless `overwrite` is set, in which case
    /// the existing store is destroyed first.
    pub fn create(path: PathBuf, overwrite: bool) -> Result<Self> {
        if path.exists() {
            if !overwrite {
                bail!("Store {} already exists", path.display());
            }
            Self::destroy(&path)?;
        }
        let db = Self::open(path)?;
        db.migrate()?;
        Ok(db)
    }

    /// Deletes a store file and its journal files. Returns false when there
    /// was nothing to delete.
    pub fn destroy(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove store {}", path.display()))?;
        for suffix in ["-wal", "-shm"] {
            let mut journal = path.as_os_str().to_owned();
            journal.push(suffix);
            let journal = PathBuf::from(journal);
            if journal.exists() {
                std::fs::remove_file(&journal)?;
            }
        }
        tracing::info!("Destroyed store at {}", path.display());
        Ok(true)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            state: Arc::new(Mutex::new(StoreState::default())),
            path,
            collections: StoredCollections,
        }
    }

    /// File backing this store; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Transactions
    // ============================================================

    pub fn begin_transaction(&self) -> Result<Transaction> {
        let mut state = self.state.lock().expect("database lock poisoned");
        if let Some(open) = &state.transaction {
            bail!("Transaction {} is already in progress", open.token);
        }
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute_batch("BEGIN TRANSACTION")?;

        let transaction = Transaction {
            token: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        };
        state.transaction = Some(transaction.clone());
        state.journal.clear();
        tracing::info!("Began transaction {}", transaction.token);
        Ok(transaction)
    }

    pub fn commit_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.finish_transaction(transaction, "COMMIT")?;
        tracing::info!("Committed transaction {}", transaction.token);
        Ok(())
    }

    /// Rolls back the store and undoes the activation changes made inside
    /// the transaction, latest first.
    pub fn rollback_transaction(&self, transaction: &Transaction) -> Result<()> {
        let journal = self.finish_transaction(transaction, "ROLLBACK")?;
        let mut state = self.state.lock().expect("database lock poisoned");
        for change in journal.into_iter().rev() {
            match change {
                ActivationChange::Gained(id) => state.activated.remove(&id),
                ActivationChange::Lost(id) => state.activated.insert(id),
            };
        }
        tracing::info!("Rolled back transaction {}", transaction.token);
        Ok(())
    }

    fn finish_transaction(
        &self,
        transaction: &Transaction,
        statement: &str,
    ) -> Result<Vec<ActivationChange>> {
        let mut state = self.state.lock().expect("database lock poisoned");
        match &state.transaction {
            Some(open) if open == transaction => {}
            Some(open) => bail!(
                "Transaction {} is not the open transaction {}",
                transaction.token,
                open.token
            ),
            None => bail!("No transaction in progress"),
        }
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute_batch(statement)?;
        state.transaction = None;
        Ok(std::mem::take(&mut state.journal))
    }

    pub fn in_transaction(&self) -> bool {
        self.state
            .lock()
            .expect("database lock poisoned")
            .transaction
            .is_some()
    }

    // ============================================================
    // Queries
    // ============================================================

    /// Every stored root folder, by source.
    pub fn root_folders(&self) -> Result<Vec<RootFolderSummary>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, json_extract(fields, '$.source'), stored_at
             FROM nodes WHERE kind = 'root_folder'
             ORDER BY json_extract(fields, '$.source'), stored_at",
        )?;

        let roots = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        roots
            .into_iter()
            .map(|(id, source, stored_at)| {
                Ok(RootFolderSummary {
                    id: parse_id(&id)?,
                    source: source.unwrap_or_default(),
                    stored_at: parse_datetime(stored_at),
                })
            })
            .collect()
    }

    pub fn root_folder_by_source(&self, source: &str) -> Result<Option<NodeId>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = conn
            .query_row(
                "SELECT id FROM nodes
                 WHERE kind = 'root_folder' AND json_extract(fields, '$.source') = ?
                 ORDER BY stored_at LIMIT 1",
                [source],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        id.as_deref().map(parse_id).transpose()
    }

    /// Looks up a stored filesystem node by its path under `root`.
    pub fn file_system_object_by_path(&self, root: NodeId, path: &str) -> Result<Option<NodeId>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = conn
            .query_row(
                "SELECT id FROM nodes
                 WHERE json_extract(fields, '$.root') = ? AND json_extract(fields, '$.path') = ?
                 LIMIT 1",
                (root.to_string(), path),
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        id.as_deref().map(parse_id).transpose()
    }

    pub fn node_count(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn upsert(&self, record: &NodeRecord) -> Result<()> {
        let fields = serde_json::to_string(&record.fields)?;
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO nodes (id, kind, parent_id, fields, stored_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    kind = excluded.kind,
                    parent_id = excluded.parent_id,
                    fields = excluded.fields,
                    stored_at = excluded.stored_at",
                (
                    record.id.to_string(),
                    &record.kind,
                    record.parent.map(|p| p.to_string()),
                    fields,
                    Utc::now().to_rfc3339(),
                ),
            )
            .with_context(|| format!("Failed to store node {}", record.id))?;
        }
        self.mark_activated(record.id);
        Ok(())
    }

    fn mark_activated(&self, id: NodeId) {
        let mut state = self.state.lock().expect("database lock poisoned");
        if state.activated.insert(id) {
            state.record(ActivationChange::Gained(id));
        }
    }

    fn load(&self, id: NodeId) -> Result<NodeRecord> {
        self.fetch(id)?
            .ok_or_else(|| anyhow!("Node {} is not stored", id))
    }
}

impl ObjectPersistor for Database {
    fn collection_factory(&self) -> &dyn CollectionFactory {
        &self.collections
    }

    fn process_schema(&self, schema: &TypeSchema) -> Result<()> {
        if self
            .state
            .lock()
            .expect("database lock poisoned")
            .processed
            .contains(schema.kind)
        {
            return Ok(());
        }
        let created = {
            let conn = self.conn.lock().expect("database lock poisoned");
            schema::create_field_indexes(&conn, schema)?
        };
        self.state
            .lock()
            .expect("database lock poisoned")
            .processed
            .insert(schema.kind);
        tracing::debug!(kind = schema.kind, indexes = created, "Processed type schema");
        Ok(())
    }

    fn is_activated(&self, id: NodeId) -> bool {
        self.state
            .lock()
            .expect("database lock poisoned")
            .activated
            .contains(&id)
    }

    fn is_stored(&self, id: NodeId) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let found = conn
            .query_row("SELECT 1 FROM nodes WHERE id = ?", [id.to_string()], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn fetch(&self, id: NodeId) -> Result<Option<NodeRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let row = conn
            .query_row(
                "SELECT kind, parent_id, fields FROM nodes WHERE id = ?",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((kind, parent, fields)) = row else {
            return Ok(None);
        };
        let fields: BTreeMap<String, Value> = serde_json::from_str(&fields)
            .with_context(|| format!("Malformed fields of node {}", id))?;
        Ok(Some(NodeRecord {
            id,
            kind,
            parent: parent.as_deref().map(parse_id).transpose()?,
            fields,
        }))
    }

    fn activate(&self, id: NodeId) -> Result<NodeRecord> {
        let record = self.load(id)?;
        self.mark_activated(id);
        Ok(record)
    }

    fn deactivate(&self, id: NodeId) -> Result<()> {
        let mut state = self.state.lock().expect("database lock poisoned");
        if state.activated.remove(&id) {
            state.record(ActivationChange::Lost(id));
        }
        Ok(())
    }

    fn add(&self, record: &NodeRecord) -> Result<()> {
        self.upsert(record)
    }

    fn update(&self, record: &NodeRecord) -> Result<()> {
        self.upsert(record)
    }

    fn delete(&self, id: NodeId) -> Result<()> {
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute("DELETE FROM nodes WHERE id = ?", [id.to_string()])?;
        }
        self.deactivate(id)
    }

    fn refresh(&self, id: NodeId) -> Result<NodeRecord> {
        self.load(id)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            state: self.state.clone(),
            path: self.path.clone(),
            collections: self.collections,
        }
    }
}

fn parse_id(s: &str) -> Result<NodeId> {
    NodeId::from_str(s).with_context(|| format!("Malformed node id '{}'", s))
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
