#![allow(dead_code)]

use async_trait::async_trait;
use saved_objects_core::store::{
    BulkRequest, BulkWriteResponse, DeleteRequest, GetRequest, GetResponse, MgetDocRequest,
    MgetResponse, SearchRequest, SearchResponse, StoreResponse, StoreResult, UpdateByQueryRequest,
    UpdateRequest, UpdateResponse, WriteRequest, WriteResponse,
};
use saved_objects_core::{
    NamespaceType, RepositoryConfig, SavedObjectType, SavedObjectsRepository, SqliteDocumentStore,
    StoreClient, TypeRegistry, UpdateByQueryResponse, VersionStampMigrator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `dashboard`/`t`: single-namespace, `config`: agnostic,
/// `space-obj`: multi-namespace, `secret`: hidden, `archived`: own index.
pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    for declaration in [
        SavedObjectType::new("dashboard", NamespaceType::Single),
        SavedObjectType::new("t", NamespaceType::Single),
        SavedObjectType::new("config", NamespaceType::Agnostic),
        SavedObjectType::new("space-obj", NamespaceType::Multiple),
        SavedObjectType::new("secret", NamespaceType::Single).hidden(),
        SavedObjectType::new("archived", NamespaceType::Single).with_index("archive"),
    ] {
        registry.register(declaration).unwrap();
    }
    registry
}

pub fn repository() -> SavedObjectsRepository {
    repository_with(
        SqliteDocumentStore::open_in_memory().unwrap(),
        RepositoryConfig::default(),
    )
}

pub fn repository_with(
    store: SqliteDocumentStore,
    config: RepositoryConfig,
) -> SavedObjectsRepository {
    SavedObjectsRepository::create_repository(
        config,
        Arc::new(registry()),
        Arc::new(store),
        Arc::new(VersionStampMigrator::new()),
    )
    .unwrap()
}

/// Store calls observed by a `CountingStore`, per client method.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreCalls {
    pub get: usize,
    pub index: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub mget: usize,
    pub bulk: usize,
    pub search: usize,
    pub update_by_query: usize,
}

impl StoreCalls {
    pub fn total(&self) -> usize {
        self.get
            + self.index
            + self.create
            + self.update
            + self.delete
            + self.mget
            + self.bulk
            + self.search
            + self.update_by_query
    }
}

#[derive(Debug, Default)]
struct Counters {
    get: AtomicUsize,
    index: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
    mget: AtomicUsize,
    bulk: AtomicUsize,
    search: AtomicUsize,
    update_by_query: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// SQLite store that counts every call made through `StoreClient`.
#[derive(Debug)]
pub struct CountingStore {
    inner: SqliteDocumentStore,
    counters: Counters,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteDocumentStore::open_in_memory().unwrap(),
            counters: Counters::default(),
        }
    }

    /// Zeroes every counter, e.g. after seeding.
    pub fn reset(&self) {
        let c = &self.counters;
        for counter in [
            &c.get,
            &c.index,
            &c.create,
            &c.update,
            &c.delete,
            &c.mget,
            &c.bulk,
            &c.search,
            &c.update_by_query,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    pub fn calls(&self) -> StoreCalls {
        let c = &self.counters;
        StoreCalls {
            get: c.get.load(Ordering::SeqCst),
            index: c.index.load(Ordering::SeqCst),
            create: c.create.load(Ordering::SeqCst),
            update: c.update.load(Ordering::SeqCst),
            delete: c.delete.load(Ordering::SeqCst),
            mget: c.mget.load(Ordering::SeqCst),
            bulk: c.bulk.load(Ordering::SeqCst),
            search: c.search.load(Ordering::SeqCst),
            update_by_query: c.update_by_query.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl StoreClient for CountingStore {
    async fn get(&self, request: GetRequest) -> StoreResult<StoreResponse<GetResponse>> {
        bump(&self.counters.get);
        self.inner.get(request).await
    }

    async fn index(&self, request: WriteRequest) -> StoreResult<StoreResponse<WriteResponse>> {
        bump(&self.counters.index);
        self.inner.index(request).await
    }

    async fn create(&self, request: WriteRequest) -> StoreResult<StoreResponse<WriteResponse>> {
        bump(&self.counters.create);
        self.inner.create(request).await
    }

    async fn update(&self, request: UpdateRequest) -> StoreResult<StoreResponse<UpdateResponse>> {
        bump(&self.counters.update);
        self.inner.update(request).await
    }

    async fn delete(&self, request: DeleteRequest) -> StoreResult<StoreResponse<WriteResponse>> {
        bump(&self.counters.delete);
        self.inner.delete(request).await
    }

    async fn mget(&self, docs: Vec<MgetDocRequest>) -> StoreResult<StoreResponse<MgetResponse>> {
        bump(&self.counters.mget);
        self.inner.mget(docs).await
    }

    async fn bulk(&self, request: BulkRequest) -> StoreResult<StoreResponse<BulkWriteResponse>> {
        bump(&self.counters.bulk);
        self.inner.bulk(request).await
    }

    async fn search(&self, request: SearchRequest) -> StoreResult<StoreResponse<SearchResponse>> {
        bump(&self.counters.search);
        self.inner.search(request).await
    }

    async fn update_by_query(
        &self,
        request: UpdateByQueryRequest,
    ) -> StoreResult<StoreResponse<UpdateByQueryResponse>> {
        bump(&self.counters.update_by_query);
        self.inner.update_by_query(request).await
    }
}

/// Repository over a `CountingStore`; the store handle reads the counters.
pub fn counting_repository() -> (SavedObjectsRepository, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::new());
    let client: Arc<dyn StoreClient> = store.clone();
    let repo = SavedObjectsRepository::create_repository(
        RepositoryConfig::default(),
        Arc::new(registry()),
        client,
        Arc::new(VersionStampMigrator::new()),
    )
    .unwrap();
    (repo, store)
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
