//! SQLite-backed document store.
//!
//! # Responsibility
//! - Implement `StoreClient` over a single SQLite connection.
//! - Assign per-index sequence numbers and enforce write preconditions.
//! - Execute store scripts and search queries in process.
//!
//! # Invariants
//! - Every request runs in one SQLite transaction; a request never observes
//!   a half-applied write of another request.
//! - Each successful write or delete assigns the next `seq_no` of its index.
//! - `primary_term` is fixed at 1 for every index.
//! - Reads against an unknown index answer `404 index_not_found_exception`.
//! - Writes are visible immediately, so every `Refresh` mode behaves the same.
//! - SQLite work runs on the tokio blocking pool; async callers never hold
//!   the connection lock on an executor thread.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::model::raw_doc::Document;
use crate::model::version::VersionPrecondition;
use crate::store::query_eval::{compare_hits, evaluate, filter_source, sort_values};
use crate::store::script::ScriptOp;
use crate::store::{
    BulkItemFailure, BulkOperation, BulkRequest, BulkResponseItem, BulkWriteResponse, DeleteRequest,
    GetRequest, GetResponse, MgetDoc, MgetDocRequest, MgetResponse, SearchHit, SearchRequest,
    SearchResponse, StoreClient, StoreError, StoreResponse, StoreResult, UpdateBody,
    UpdateByQueryRequest, UpdateByQueryResponse, UpdateRequest, UpdateResponse, WriteRequest,
    WriteResponse, WriteResult, DOCUMENT_MISSING_EXCEPTION, INDEX_NOT_FOUND_EXCEPTION, NOT_FOUND,
    VERSION_CONFLICT_EXCEPTION,
};
use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const PRIMARY_TERM: i64 = 1;

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Transport(format!("sqlite: {value}"))
    }
}

/// Document store persisted in SQLite.
///
/// Clones share the same connection.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone)]
struct StoredDoc {
    source: Document,
    seq_no: i64,
    primary_term: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Index,
    Create,
}

impl SqliteDocumentStore {
    /// Wraps a connection that already has the document store schema.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Transport("document store lock poisoned".to_string()))
    }

    async fn run_blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteDocumentStore) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|err| StoreError::Transport(format!("document store task failed: {err}")))?
    }

    fn get_sync(&self, request: GetRequest) -> StoreResult<StoreResponse<GetResponse>> {
        let conn = self.lock()?;
        require_index(&conn, &request.index)?;
        let stored = load_doc(&conn, &request.index, &request.id)?
            .ok_or_else(|| not_found(&request.id))?;

        Ok(StoreResponse::ok(GetResponse {
            id: request.id,
            index: request.index,
            seq_no: stored.seq_no,
            primary_term: stored.primary_term,
            source: stored.source,
        }))
    }

    fn write_sync(
        &self,
        mode: WriteMode,
        request: WriteRequest,
    ) -> StoreResult<StoreResponse<WriteResponse>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let response = write_one(
            &tx,
            mode,
            &request.index,
            &request.id,
            &request.source,
            request.precondition,
        )?;
        tx.commit()?;

        debug!(
            "event=store_write module=store status=ok index={} result={:?} refresh={}",
            request.index,
            response.result,
            request.refresh.as_str()
        );
        Ok(match response.result {
            WriteResult::Created => StoreResponse::created(response),
            _ => StoreResponse::ok(response),
        })
    }

    fn update_sync(&self, request: UpdateRequest) -> StoreResult<StoreResponse<UpdateResponse>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut response = update_one(
            &tx,
            &request.index,
            &request.id,
            &request.body,
            request.precondition,
        )?;
        tx.commit()?;

        if !request.return_source {
            response.source = None;
        }
        Ok(match response.result {
            WriteResult::Created => StoreResponse::created(response),
            _ => StoreResponse::ok(response),
        })
    }

    fn delete_sync(&self, request: DeleteRequest) -> StoreResult<StoreResponse<WriteResponse>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        require_index(&tx, &request.index)?;
        let stored =
            load_doc(&tx, &request.index, &request.id)?.ok_or_else(|| not_found(&request.id))?;
        check_precondition(&request.id, Some(&stored), request.precondition)?;

        let seq_no = delete_doc(&tx, &request.index, &request.id)?;
        tx.commit()?;

        Ok(StoreResponse::ok(WriteResponse {
            id: request.id,
            index: request.index,
            seq_no,
            primary_term: PRIMARY_TERM,
            result: WriteResult::Deleted,
        }))
    }

    fn mget_sync(&self, docs: Vec<MgetDocRequest>) -> StoreResult<StoreResponse<MgetResponse>> {
        let conn = self.lock()?;
        let mut found_docs = Vec::with_capacity(docs.len());
        for doc in docs {
            let stored = if index_exists(&conn, &doc.index)? {
                load_doc(&conn, &doc.index, &doc.id)?
            } else {
                None
            };
            found_docs.push(match stored {
                Some(stored) => MgetDoc {
                    found: true,
                    seq_no: Some(stored.seq_no),
                    primary_term: Some(stored.primary_term),
                    source: Some(filter_source(
                        &stored.source,
                        doc.source_includes.as_deref(),
                    )),
                    id: doc.id,
                    index: doc.index,
                },
                None => MgetDoc {
                    found: false,
                    seq_no: None,
                    primary_term: None,
                    source: None,
                    id: doc.id,
                    index: doc.index,
                },
            });
        }
        Ok(StoreResponse::ok(MgetResponse { docs: found_docs }))
    }

    fn bulk_sync(&self, request: BulkRequest) -> StoreResult<StoreResponse<BulkWriteResponse>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut items = Vec::with_capacity(request.operations.len());

        for operation in &request.operations {
            let meta = operation.meta();
            let outcome = match operation {
                BulkOperation::Index { source, .. } => write_one(
                    &tx,
                    WriteMode::Index,
                    &meta.index,
                    &meta.id,
                    source,
                    meta.precondition,
                )
                .map(|response| (response.result, response.seq_no, None)),
                BulkOperation::Create { source, .. } => write_one(
                    &tx,
                    WriteMode::Create,
                    &meta.index,
                    &meta.id,
                    source,
                    meta.precondition,
                )
                .map(|response| (response.result, response.seq_no, None)),
                BulkOperation::Update { doc, .. } => update_one(
                    &tx,
                    &meta.index,
                    &meta.id,
                    &UpdateBody::Doc(doc.clone()),
                    meta.precondition,
                )
                .map(|response| {
                    let source = response.source.map(|source| {
                        filter_source(&source, request.update_source_includes.as_deref())
                    });
                    (response.result, response.seq_no, source)
                }),
            };

            items.push(match outcome {
                Ok((result, seq_no, source)) => BulkResponseItem {
                    id: meta.id.clone(),
                    index: meta.index.clone(),
                    status: if result == WriteResult::Created { 201 } else { 200 },
                    seq_no: Some(seq_no),
                    primary_term: Some(PRIMARY_TERM),
                    error: None,
                    source,
                },
                Err(StoreError::Response {
                    status_code,
                    error_type,
                    reason,
                }) => BulkResponseItem {
                    id: meta.id.clone(),
                    index: meta.index.clone(),
                    status: status_code,
                    seq_no: None,
                    primary_term: None,
                    error: Some(BulkItemFailure {
                        error_type,
                        reason: Some(reason),
                    }),
                    source: None,
                },
                Err(err) => return Err(err),
            });
        }
        tx.commit()?;

        debug!(
            "event=store_bulk module=store status=ok items={} failed={} refresh={}",
            items.len(),
            items.iter().filter(|item| item.error.is_some()).count(),
            request.refresh.as_str()
        );
        Ok(StoreResponse::ok(BulkWriteResponse { items }))
    }

    fn search_sync(&self, request: SearchRequest) -> StoreResult<StoreResponse<SearchResponse>> {
        let conn = self.lock()?;
        let docs = load_matching(&conn, &request.indices, &request)?;

        let total = docs.len();
        let hits = docs
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .map(|(index, id, score, stored)| SearchHit {
                sort: sort_values(&request.query, &stored.source),
                source: filter_source(&stored.source, request.source_includes.as_deref()),
                id,
                index,
                score,
                seq_no: stored.seq_no,
                primary_term: stored.primary_term,
            })
            .collect();
        Ok(StoreResponse::ok(SearchResponse { total, hits }))
    }

    fn update_by_query_sync(
        &self,
        request: UpdateByQueryRequest,
    ) -> StoreResult<StoreResponse<UpdateByQueryResponse>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let search = SearchRequest {
            indices: request.indices.clone(),
            query: request.query.clone(),
            size: usize::MAX,
            from: 0,
            source_includes: None,
            preference: None,
        };
        let matching = load_matching(&tx, &request.indices, &search)?;

        let mut counts = UpdateByQueryResponse {
            total: matching.len() as u64,
            ..UpdateByQueryResponse::default()
        };
        for (index, id, _, stored) in matching {
            let mut source = stored.source;
            match request.script.apply(&mut source)? {
                ScriptOp::Updated => {
                    write_doc(&tx, &index, &id, &source)?;
                    counts.updated += 1;
                }
                ScriptOp::Delete => {
                    delete_doc(&tx, &index, &id)?;
                    counts.deleted += 1;
                }
                ScriptOp::Noop => counts.noops += 1,
            }
        }
        tx.commit()?;

        debug!(
            "event=store_update_by_query module=store status=ok total={} updated={} deleted={}",
            counts.total, counts.updated, counts.deleted
        );
        Ok(StoreResponse::ok(counts))
    }
}

#[async_trait]
impl StoreClient for SqliteDocumentStore {
    async fn get(&self, request: GetRequest) -> StoreResult<StoreResponse<GetResponse>> {
        self.run_blocking(move |store| store.get_sync(request)).await
    }

    async fn index(&self, request: WriteRequest) -> StoreResult<StoreResponse<WriteResponse>> {
        self.run_blocking(move |store| store.write_sync(WriteMode::Index, request))
            .await
    }

    async fn create(&self, request: WriteRequest) -> StoreResult<StoreResponse<WriteResponse>> {
        self.run_blocking(move |store| store.write_sync(WriteMode::Create, request))
            .await
    }

    async fn update(&self, request: UpdateRequest) -> StoreResult<StoreResponse<UpdateResponse>> {
        self.run_blocking(move |store| store.update_sync(request)).await
    }

    async fn delete(&self, request: DeleteRequest) -> StoreResult<StoreResponse<WriteResponse>> {
        self.run_blocking(move |store| store.delete_sync(request)).await
    }

    async fn mget(&self, docs: Vec<MgetDocRequest>) -> StoreResult<StoreResponse<MgetResponse>> {
        self.run_blocking(move |store| store.mget_sync(docs)).await
    }

    async fn bulk(&self, request: BulkRequest) -> StoreResult<StoreResponse<BulkWriteResponse>> {
        self.run_blocking(move |store| store.bulk_sync(request)).await
    }

    async fn search(&self, request: SearchRequest) -> StoreResult<StoreResponse<SearchResponse>> {
        self.run_blocking(move |store| store.search_sync(request)).await
    }

    async fn update_by_query(
        &self,
        request: UpdateByQueryRequest,
    ) -> StoreResult<StoreResponse<UpdateByQueryResponse>> {
        self.run_blocking(move |store| store.update_by_query_sync(request))
            .await
    }
}

fn write_one(
    conn: &Connection,
    mode: WriteMode,
    index: &str,
    id: &str,
    source: &Document,
    precondition: Option<VersionPrecondition>,
) -> StoreResult<WriteResponse> {
    let stored = load_doc(conn, index, id)?;
    if mode == WriteMode::Create && stored.is_some() {
        return Err(StoreError::response(
            409,
            VERSION_CONFLICT_EXCEPTION,
            format!("[{id}]: version conflict, document already exists"),
        ));
    }
    check_precondition(id, stored.as_ref(), precondition)?;

    let seq_no = write_doc(conn, index, id, source)?;
    Ok(WriteResponse {
        id: id.to_string(),
        index: index.to_string(),
        seq_no,
        primary_term: PRIMARY_TERM,
        result: if stored.is_some() {
            WriteResult::Updated
        } else {
            WriteResult::Created
        },
    })
}

fn update_one(
    conn: &Connection,
    index: &str,
    id: &str,
    body: &UpdateBody,
    precondition: Option<VersionPrecondition>,
) -> StoreResult<UpdateResponse> {
    let stored = load_doc(conn, index, id)?;
    let response = |result, seq_no, source| UpdateResponse {
        id: id.to_string(),
        index: index.to_string(),
        seq_no,
        primary_term: PRIMARY_TERM,
        result,
        source,
    };

    let Some(stored) = stored else {
        return match body {
            UpdateBody::Script {
                upsert: Some(upsert),
                ..
            } if precondition.is_none() => {
                let seq_no = write_doc(conn, index, id, upsert)?;
                Ok(response(WriteResult::Created, seq_no, Some(upsert.clone())))
            }
            _ => Err(StoreError::response(
                404,
                DOCUMENT_MISSING_EXCEPTION,
                format!("[{id}]: document missing"),
            )),
        };
    };
    check_precondition(id, Some(&stored), precondition)?;

    let mut source = stored.source.clone();
    let op = match body {
        UpdateBody::Doc(doc) => {
            deep_merge(&mut source, doc);
            if source == stored.source {
                ScriptOp::Noop
            } else {
                ScriptOp::Updated
            }
        }
        UpdateBody::Script { script, .. } => script.apply(&mut source)?,
    };

    match op {
        ScriptOp::Updated => {
            let seq_no = write_doc(conn, index, id, &source)?;
            Ok(response(WriteResult::Updated, seq_no, Some(source)))
        }
        ScriptOp::Noop => Ok(response(WriteResult::Noop, stored.seq_no, Some(source))),
        ScriptOp::Delete => {
            let seq_no = delete_doc(conn, index, id)?;
            Ok(response(WriteResult::Deleted, seq_no, None))
        }
    }
}

/// Loads every document of the existing `indices` matching the query,
/// ordered as search hits.
fn load_matching(
    conn: &Connection,
    indices: &[String],
    request: &SearchRequest,
) -> StoreResult<Vec<(String, String, f64, StoredDoc)>> {
    let mut existing = Vec::new();
    for index in indices {
        if !existing.contains(index) && index_exists(conn, index)? {
            existing.push(index.clone());
        }
    }
    if existing.is_empty() {
        return Err(StoreError::response(
            404,
            INDEX_NOT_FOUND_EXCEPTION,
            format!("no such index [{}]", indices.join(",")),
        ));
    }

    let mut matching = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT doc_id, source, seq_no, primary_term
         FROM store_documents
         WHERE index_name = ?1
         ORDER BY doc_id ASC;",
    )?;
    for index in existing {
        let rows = stmt.query_map(params![index], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        for row in rows {
            let (id, source, seq_no, primary_term) = row?;
            let stored = StoredDoc {
                source: decode_source(&source)?,
                seq_no,
                primary_term,
            };
            if let Some(score) = evaluate(&request.query, &stored.source) {
                matching.push((index.clone(), id, score, stored));
            }
        }
    }

    matching.sort_by(|left, right| {
        compare_hits(
            &request.query,
            (left.2, &left.3.source),
            (right.2, &right.3.source),
        )
    });
    Ok(matching)
}

fn check_precondition(
    id: &str,
    stored: Option<&StoredDoc>,
    precondition: Option<VersionPrecondition>,
) -> StoreResult<()> {
    let Some(precondition) = precondition else {
        return Ok(());
    };
    match stored {
        Some(stored)
            if stored.seq_no == precondition.if_seq_no
                && stored.primary_term == precondition.if_primary_term =>
        {
            Ok(())
        }
        Some(stored) => Err(StoreError::response(
            409,
            VERSION_CONFLICT_EXCEPTION,
            format!(
                "[{id}]: version conflict, required seqNo [{}], primary term [{}]. current document has seqNo [{}] and primary term [{}]",
                precondition.if_seq_no,
                precondition.if_primary_term,
                stored.seq_no,
                stored.primary_term
            ),
        )),
        None => Err(StoreError::response(
            409,
            VERSION_CONFLICT_EXCEPTION,
            format!(
                "[{id}]: version conflict, required seqNo [{}], primary term [{}]. but no document was found",
                precondition.if_seq_no, precondition.if_primary_term
            ),
        )),
    }
}

fn deep_merge(target: &mut Document, patch: &Document) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn not_found(id: &str) -> StoreError {
    StoreError::response(404, NOT_FOUND, format!("[{id}]: not found"))
}

fn index_exists(conn: &Connection, index: &str) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM store_indices WHERE name = ?1;",
            params![index],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn require_index(conn: &Connection, index: &str) -> StoreResult<()> {
    if index_exists(conn, index)? {
        Ok(())
    } else {
        Err(StoreError::response(
            404,
            INDEX_NOT_FOUND_EXCEPTION,
            format!("no such index [{index}]"),
        ))
    }
}

fn load_doc(conn: &Connection, index: &str, id: &str) -> StoreResult<Option<StoredDoc>> {
    let row = conn
        .query_row(
            "SELECT source, seq_no, primary_term
             FROM store_documents
             WHERE index_name = ?1 AND doc_id = ?2;",
            params![index, id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((source, seq_no, primary_term)) => Ok(Some(StoredDoc {
            source: decode_source(&source)?,
            seq_no,
            primary_term,
        })),
        None => Ok(None),
    }
}

/// Writes `source` and returns the assigned `seq_no`.
fn write_doc(conn: &Connection, index: &str, id: &str, source: &Document) -> StoreResult<i64> {
    let encoded = serde_json::to_string(source)
        .map_err(|err| StoreError::Transport(format!("cannot encode document: {err}")))?;
    let seq_no = next_seq_no(conn, index)?;
    conn.execute(
        "INSERT INTO store_documents (index_name, doc_id, source, seq_no, primary_term)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(index_name, doc_id) DO UPDATE SET
            source = excluded.source,
            seq_no = excluded.seq_no,
            primary_term = excluded.primary_term;",
        params![index, id, encoded, seq_no, PRIMARY_TERM],
    )?;
    Ok(seq_no)
}

/// Deletes a document and returns the `seq_no` assigned to the delete.
fn delete_doc(conn: &Connection, index: &str, id: &str) -> StoreResult<i64> {
    let seq_no = next_seq_no(conn, index)?;
    conn.execute(
        "DELETE FROM store_documents WHERE index_name = ?1 AND doc_id = ?2;",
        params![index, id],
    )?;
    Ok(seq_no)
}

fn next_seq_no(conn: &Connection, index: &str) -> StoreResult<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO store_indices (name, primary_term, next_seq_no) VALUES (?1, ?2, 0);",
        params![index, PRIMARY_TERM],
    )?;
    let seq_no: i64 = conn.query_row(
        "SELECT next_seq_no FROM store_indices WHERE name = ?1;",
        params![index],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE store_indices SET next_seq_no = next_seq_no + 1 WHERE name = ?1;",
        params![index],
    )?;
    Ok(seq_no)
}

fn decode_source(source: &str) -> StoreResult<Document> {
    serde_json::from_str(source)
        .map_err(|err| StoreError::Transport(format!("stored document is not a JSON object: {err}")))
}

#[cfg(test)]
mod tests {
    use super::SqliteDocumentStore;
    use crate::model::version::VersionPrecondition;
    use crate::store::{
        BulkMeta, BulkOperation, BulkRequest, BulkWriteResponse, GetRequest, Refresh, StoreClient,
        StoreResponse, StoreScript, UpdateBody, UpdateRequest, WriteRequest, WriteResult,
    };
    use serde_json::json;

    fn doc(value: serde_json::Value) -> crate::model::raw_doc::Document {
        value.as_object().cloned().unwrap()
    }

    fn write(id: &str, source: serde_json::Value) -> WriteRequest {
        WriteRequest {
            index: "idx".to_string(),
            id: id.to_string(),
            source: doc(source),
            precondition: None,
            refresh: Refresh::WaitFor,
        }
    }

    #[tokio::test]
    async fn sequence_numbers_increase_per_write() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let first = store.index(write("a", json!({ "type": "t" }))).await.unwrap();
        let second = store.index(write("a", json!({ "type": "t" }))).await.unwrap();
        assert_eq!(first.status_code, 201);
        assert_eq!(second.status_code, 200);
        assert_eq!(first.body.seq_no + 1, second.body.seq_no);
        assert_eq!(second.body.result, WriteResult::Updated);
    }

    #[tokio::test]
    async fn missing_index_and_document_are_404() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let get = GetRequest {
            index: "idx".to_string(),
            id: "a".to_string(),
        };
        let err = store.get(get.clone()).await.unwrap_err();
        assert_eq!(err.error_type(), Some("index_not_found_exception"));

        store.index(write("b", json!({ "type": "t" }))).await.unwrap();
        let err = store.get(get).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn stale_precondition_is_a_conflict() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let created = store.index(write("a", json!({ "type": "t" }))).await.unwrap();
        store.index(write("a", json!({ "type": "t" }))).await.unwrap();

        let mut stale = write("a", json!({ "type": "t" }));
        stale.precondition = Some(VersionPrecondition::new(
            created.body.seq_no,
            created.body.primary_term,
        ));
        let err = store.index(stale).await.unwrap_err();
        assert_eq!(err.status_code(), Some(409));

        let err = store.create(write("a", json!({ "type": "t" }))).await.unwrap_err();
        assert_eq!(err.status_code(), Some(409));
    }

    #[tokio::test]
    async fn update_merges_nested_objects() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store
            .index(write("a", json!({ "type": "t", "t": { "x": 1, "y": 2 } })))
            .await
            .unwrap();
        let updated = store
            .update(UpdateRequest {
                index: "idx".to_string(),
                id: "a".to_string(),
                body: UpdateBody::Doc(doc(json!({ "t": { "y": 3 } }))),
                precondition: None,
                refresh: Refresh::WaitFor,
                return_source: true,
            })
            .await
            .unwrap();
        assert_eq!(updated.body.source.unwrap()["t"], json!({ "x": 1, "y": 3 }));
    }

    #[tokio::test]
    async fn script_upsert_creates_then_increments() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let request = UpdateRequest {
            index: "idx".to_string(),
            id: "c".to_string(),
            body: UpdateBody::Script {
                script: StoreScript::IncrementCounter {
                    type_name: "t".to_string(),
                    counter_field: "n".to_string(),
                    count: 1,
                    time: "now".to_string(),
                },
                upsert: Some(doc(json!({ "type": "t", "t": { "n": 1 } }))),
            },
            precondition: None,
            refresh: Refresh::WaitFor,
            return_source: true,
        };
        let created = store.update(request.clone()).await.unwrap();
        assert_eq!(created.body.result, WriteResult::Created);
        let incremented = store.update(request).await.unwrap();
        assert_eq!(incremented.body.source.unwrap()["t"]["n"], json!(2));
    }

    #[tokio::test]
    async fn bulk_items_fail_independently_and_keep_order() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.index(write("taken", json!({ "type": "t" }))).await.unwrap();

        let meta = |id: &str| BulkMeta {
            index: "idx".to_string(),
            id: id.to_string(),
            precondition: None,
        };
        let response: StoreResponse<BulkWriteResponse> = store
            .bulk(BulkRequest {
                operations: vec![
                    BulkOperation::Create {
                        meta: meta("new"),
                        source: doc(json!({ "type": "t" })),
                    },
                    BulkOperation::Create {
                        meta: meta("taken"),
                        source: doc(json!({ "type": "t" })),
                    },
                    BulkOperation::Update {
                        meta: meta("missing"),
                        doc: doc(json!({ "t": {} })),
                    },
                ],
                refresh: Refresh::WaitFor,
                update_source_includes: None,
            })
            .await
            .unwrap();

        let statuses: Vec<u16> = response.body.items.iter().map(|item| item.status).collect();
        assert_eq!(statuses, vec![201, 409, 404]);
        assert_eq!(response.body.items[1].id, "taken");
        assert!(response.body.items[0].error.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writes_from_worker_threads_get_distinct_seq_nos() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .index(write(&format!("doc-{n}"), json!({ "type": "t" })))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut seq_nos = Vec::new();
        for task in tasks {
            seq_nos.push(task.await.unwrap().body.seq_no);
        }
        seq_nos.sort_unstable();
        seq_nos.dedup();
        assert_eq!(seq_nos.len(), 8);
    }
}
