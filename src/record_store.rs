use std::path::Path;

use lmdb::{Cursor, Database, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags};
use log::{debug, info, warn};

use crate::app_response::AppResponse;
use crate::config::PhoneBookConfig;
use crate::record::{Record, RecordFields};

const RECORDS_DB: &str = "names";
const META_DB: &str = "meta";
const NEXT_ID_KEY: &[u8] = b"next_id";

/// Largest id the key generator hands out or accepts (2^53, the integer
/// ceiling of IndexedDB key generators).
pub const MAX_RECORD_ID: u64 = 1 << 53;

/// Durable CRUD over the record collection.
///
/// Records are keyed by their id encoded big-endian, so a cursor walk yields
/// them in ascending id order. The key generator lives in a separate `meta`
/// database and only ever moves forward, so ids of deleted records are never
/// handed out again.
pub struct RecordStore {
    env: Environment,
    records: Database,
    meta: Database,
    path: String,
}

impl RecordStore {
    /// Opens (or creates) the store described by `config`.
    pub fn open(config: &PhoneBookConfig) -> Result<Self, AppResponse> {
        let map_size = config.map_size_bytes()?;
        let lmdb_dir = config.lmdb_dir();
        let path = Path::new(&lmdb_dir);

        if !path.exists() {
            info!("Creating record store at: {lmdb_dir}");
            std::fs::create_dir_all(path)?;
        }

        let env = Environment::new()
            .set_max_dbs(2)
            .set_map_size(map_size)
            .open(path)
            .map_err(|e| {
                warn!("Failed to open LMDB environment at {lmdb_dir}: {e}");
                AppResponse::from(e)
            })?;

        let records = env.create_db(Some(RECORDS_DB), DatabaseFlags::empty())?;
        let meta = env.create_db(Some(META_DB), DatabaseFlags::empty())?;

        info!("Record store ready at: {lmdb_dir}");
        Ok(Self {
            env,
            records,
            meta,
            path: lmdb_dir,
        })
    }

    /// Shorthand for [`RecordStore::open`] with default settings.
    pub fn init(name: impl Into<String>) -> Result<Self, AppResponse> {
        Self::open(&PhoneBookConfig::with_database_name(name))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Persists a new record under a freshly assigned id.
    pub fn create(&self, fields: RecordFields) -> Result<Record, AppResponse> {
        let fields = fields.validated()?;
        let mut record = Record::from_fields(fields);

        let mut txn = self.env.begin_rw_txn()?;
        let id = allocate_id(self.next_id(&txn)?)?;
        record.id = Some(id);
        self.write_record(&mut txn, id, &record)?;
        self.set_next_id(&mut txn, id + 1)?;
        txn.commit()?;

        debug!("Created record {id}");
        Ok(record)
    }

    pub fn get_by_id(&self, id: u64) -> Result<Option<Record>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let record = match txn.get(self.records, &id.to_be_bytes()) {
            Ok(bytes) => Some(serde_json::from_slice::<Record>(bytes)?),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(record)
    }

    /// Every stored record, ascending by id.
    pub fn read_all(&self) -> Result<Vec<Record>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let mut records = Vec::new();
        {
            let mut cursor = txn.open_ro_cursor(self.records)?;
            for (key, value) in cursor.iter() {
                match serde_json::from_slice::<Record>(value) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Skipping unreadable record under key {key:?}: {e}"),
                }
            }
        }
        txn.commit()?;
        Ok(records)
    }

    /// Replaces all mutable fields of record `id`. Returns `Ok(None)` and
    /// writes nothing when no such record exists.
    pub fn update(&self, id: u64, fields: RecordFields) -> Result<Option<Record>, AppResponse> {
        let fields = fields.validated()?;

        let mut txn = self.env.begin_rw_txn()?;
        let existing = match txn.get(self.records, &id.to_be_bytes()) {
            Ok(bytes) => Some(serde_json::from_slice::<Record>(bytes)?),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        let Some(mut record) = existing else {
            txn.abort();
            debug!("Update skipped, no record {id}");
            return Ok(None);
        };

        record.apply(fields);
        record.id = Some(id);
        self.write_record(&mut txn, id, &record)?;
        txn.commit()?;

        debug!("Updated record {id}");
        Ok(Some(record))
    }

    /// Removes record `id`. `Ok(false)` when it did not exist.
    pub fn delete(&self, id: u64) -> Result<bool, AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.del(self.records, &id.to_be_bytes(), None) {
            Ok(()) => {
                txn.commit()?;
                debug!("Deleted record {id}");
                Ok(true)
            }
            Err(lmdb::Error::NotFound) => {
                txn.abort();
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes a batch in one transaction. Records carrying an id are stored
    /// under it (overwriting whatever was there); the others get fresh ids.
    /// Returns the stored records with their final ids.
    pub fn upsert_many(&self, records: Vec<Record>) -> Result<Vec<Record>, AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        let mut next_id = self.next_id(&txn)?;
        let mut stored = Vec::with_capacity(records.len());

        for mut record in records {
            let id = match record.id {
                Some(id) if id > MAX_RECORD_ID => {
                    return Err(AppResponse::ValidationError(format!(
                        "Record id {id} exceeds the maximum of {MAX_RECORD_ID}"
                    )));
                }
                Some(id) => id,
                None => allocate_id(next_id)?,
            };
            record.id = Some(id);
            self.write_record(&mut txn, id, &record)?;
            next_id = next_id.max(id + 1);
            stored.push(record);
        }

        self.set_next_id(&mut txn, next_id)?;
        txn.commit()?;

        info!("Upserted {} records", stored.len());
        Ok(stored)
    }

    /// Flushes pending writes to disk.
    pub fn sync(&self) -> Result<(), AppResponse> {
        self.env.sync(true)?;
        Ok(())
    }

    fn write_record(
        &self,
        txn: &mut RwTransaction<'_>,
        id: u64,
        record: &Record,
    ) -> Result<(), AppResponse> {
        let json = serde_json::to_vec(record)?;
        txn.put(self.records, &id.to_be_bytes(), &json, WriteFlags::empty())?;
        Ok(())
    }

    fn next_id<T: Transaction>(&self, txn: &T) -> Result<u64, AppResponse> {
        match txn.get(self.meta, &NEXT_ID_KEY) {
            Ok(bytes) => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| {
                    AppResponse::DatabaseError("Corrupted key generator".to_string())
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            Err(lmdb::Error::NotFound) => Ok(1),
            Err(e) => Err(e.into()),
        }
    }

    fn set_next_id(&self, txn: &mut RwTransaction<'_>, next_id: u64) -> Result<(), AppResponse> {
        txn.put(self.meta, &NEXT_ID_KEY, &next_id.to_be_bytes(), WriteFlags::empty())?;
        Ok(())
    }
}

// The generator may sit one past `MAX_RECORD_ID`, which means exhausted.
fn allocate_id(next_id: u64) -> Result<u64, AppResponse> {
    if next_id > MAX_RECORD_ID {
        warn!("Key generator exhausted at {next_id}");
        return Err(AppResponse::DatabaseError("Key generator exhausted".to_string()));
    }
    Ok(next_id)
}
