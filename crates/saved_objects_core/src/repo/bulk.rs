//! Bulk operations over many saved objects.
//!
//! # Responsibility
//! - Validate each input item locally, pre-read multi-namespace items with one
//!   multi-get, write survivors with one bulk request, and reassemble results.
//!
//! # Invariants
//! - Output position `i` always answers input item `i`.
//! - Items rejected before the store carry their error; the rest carry the
//!   position of their pre-read doc and of their bulk write explicitly.
//! - One item's failure never aborts the batch; only a failed store request
//!   (mget, bulk) fails the whole call.

use crate::model::raw_doc::{
    Document, RawDoc, RawDocSource, SOURCE_NAMESPACES, SOURCE_ORIGIN_ID, SOURCE_TYPE,
};
use crate::model::saved_object::{SavedObject, SavedObjectDoc};
use crate::model::version::{decode_request_version, encode_hit_version, VersionPrecondition};
use crate::namespace::{
    exists_in_namespace, namespace_id_to_string, namespace_string_to_id, namespaces_of,
    normalize_namespace, ALL_NAMESPACES_STRING,
};
use crate::repo::error::{bulk_operation_error, BulkItemError, ErrorPayload, RepoError, RepoResult};
use crate::repo::options::{
    BaseOptions, BulkCreateObject, BulkCreateOptions, BulkGetObject, BulkResponse,
    BulkUpdateObject, BulkUpdateOptions, CheckConflictsObject, CheckConflictsResponse,
};
use crate::repo::repository::{
    current_time, expected_version, generate_id, update_document, SavedObjectsRepository,
};
use crate::search::included_fields;
use crate::store::{
    BulkMeta, BulkOperation, BulkRequest, BulkResponseItem, MgetDoc, MgetDocRequest, Refresh,
    StoreResultExt,
};
use log::debug;
use serde_json::Value;

type ItemResult<T> = Result<T, BulkItemError>;

/// Write method of one bulk-create item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMethod {
    /// Insert or replace.
    Index,
    /// Insert only; an existing document is a conflict.
    Create,
}

/// Bulk-create item that passed local validation.
struct CreateCandidate {
    method: WriteMethod,
    id: String,
    object: BulkCreateObject,
    pre_read_index: Option<usize>,
}

/// Bulk-get or check-conflicts item that passed local validation.
struct ReadCandidate {
    type_name: String,
    id: String,
    pre_read_index: usize,
}

/// Bulk-update item that passed local validation.
struct UpdateCandidate {
    object: BulkUpdateObject,
    namespace: Option<String>,
    namespace_string: String,
    document: Document,
    pre_read_index: Option<usize>,
}

/// Item planned into the bulk write.
struct PlannedWrite {
    write_index: usize,
    id: String,
    type_name: String,
    outcome: PlannedOutcome,
}

/// What a successful bulk item turns into.
enum PlannedOutcome {
    Created(RawDoc),
    Updated {
        object: BulkUpdateObject,
        namespaces: Option<Vec<String>>,
        time: String,
    },
}

impl SavedObjectsRepository {
    /// Creates many objects with one bulk write.
    pub async fn bulk_create(
        &self,
        objects: Vec<BulkCreateObject>,
        options: BulkCreateOptions,
    ) -> RepoResult<BulkResponse> {
        let namespace = normalize_namespace(options.namespace.as_deref())?;
        let time = current_time();

        let mut pre_read_count = 0;
        let candidates: Vec<ItemResult<CreateCandidate>> = objects
            .into_iter()
            .map(|object| {
                self.validate_create_item(&object)?;
                let explicit_id = object.id.clone().filter(|id| !id.is_empty());
                let method = if explicit_id.is_some() && options.overwrite {
                    WriteMethod::Index
                } else {
                    WriteMethod::Create
                };
                let requires_namespaces_check =
                    explicit_id.is_some() && self.registry.is_multi_namespace(&object.type_name);
                let pre_read_index = requires_namespaces_check.then(|| {
                    pre_read_count += 1;
                    pre_read_count - 1
                });
                Ok(CreateCandidate {
                    method,
                    id: explicit_id.unwrap_or_else(generate_id),
                    object,
                    pre_read_index,
                })
            })
            .collect();

        let pre_read_requests = candidates
            .iter()
            .filter_map(|candidate| candidate.as_ref().ok())
            .filter(|candidate| candidate.pre_read_index.is_some())
            .map(|candidate| MgetDocRequest {
                index: self.get_index_for_type(&candidate.object.type_name),
                id: self.serializer.generate_raw_id(
                    namespace.as_deref(),
                    &candidate.object.type_name,
                    &candidate.id,
                ),
                source_includes: Some(vec![SOURCE_TYPE.to_string(), SOURCE_NAMESPACES.to_string()]),
            })
            .collect();
        let pre_read = self.multi_get(pre_read_requests).await?;

        let mut operations = Vec::new();
        let planned: Vec<ItemResult<PlannedWrite>> = candidates
            .into_iter()
            .map(|candidate| {
                let candidate = candidate?;
                let (operation, raw) = self.plan_create(
                    candidate.method,
                    &candidate.id,
                    &candidate.object,
                    candidate.pre_read_index.and_then(|index| pre_read.get(index)),
                    namespace.as_deref(),
                    &options,
                    &time,
                )?;
                let write_index = operations.len();
                operations.push(operation);
                Ok(PlannedWrite {
                    write_index,
                    id: candidate.id,
                    type_name: candidate.object.type_name,
                    outcome: PlannedOutcome::Created(raw),
                })
            })
            .collect();

        let items = self
            .bulk_write(operations, self.refresh_or_default(options.refresh), None)
            .await?;
        let saved_objects = self.collect_bulk_results(planned, &items);
        log_bulk("bulk_create", &saved_objects);
        Ok(BulkResponse { saved_objects })
    }

    /// Reports which objects already exist and would conflict on create.
    pub async fn check_conflicts(
        &self,
        objects: Vec<CheckConflictsObject>,
        options: BaseOptions,
    ) -> RepoResult<CheckConflictsResponse> {
        if objects.is_empty() {
            return Ok(CheckConflictsResponse::default());
        }
        let namespace = normalize_namespace(options.namespace.as_deref())?;

        let candidates = read_candidates(
            objects
                .into_iter()
                .map(|object| (object.type_name, object.id)),
            |type_name, id| {
                self.ensure_allowed(type_name)
                    .map_err(|err| BulkItemError::new(id, type_name, &err))
            },
        );
        let pre_read_requests = candidates
            .iter()
            .filter_map(|candidate| candidate.as_ref().ok())
            .map(|candidate| MgetDocRequest {
                index: self.get_index_for_type(&candidate.type_name),
                id: self.serializer.generate_raw_id(
                    namespace.as_deref(),
                    &candidate.type_name,
                    &candidate.id,
                ),
                source_includes: Some(vec![SOURCE_TYPE.to_string(), SOURCE_NAMESPACES.to_string()]),
            })
            .collect();
        let pre_read = self.multi_get(pre_read_requests).await?;

        let mut errors = Vec::new();
        for candidate in candidates {
            let candidate = match candidate {
                Ok(candidate) => candidate,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };
            let Some(doc) = found_doc(&pre_read, candidate.pre_read_index) else {
                continue;
            };
            let visible = decode_mget_source(doc).is_some_and(|source| {
                exists_in_namespace(&self.registry, &source, namespace.as_deref())
            });
            let err = if visible {
                RepoError::conflict(&candidate.type_name, &candidate.id)
            } else {
                RepoError::not_overwritable(&candidate.type_name, &candidate.id)
            };
            errors.push(BulkItemError::new(&candidate.id, &candidate.type_name, &err));
        }

        debug!(
            "event=check_conflicts module=repo status=ok conflicts={}",
            errors.len()
        );
        Ok(CheckConflictsResponse { errors })
    }

    /// Reads many objects with one multi-get.
    pub async fn bulk_get(
        &self,
        objects: Vec<BulkGetObject>,
        options: BaseOptions,
    ) -> RepoResult<BulkResponse> {
        if objects.is_empty() {
            return Ok(BulkResponse {
                saved_objects: Vec::new(),
            });
        }
        let namespace = normalize_namespace(options.namespace.as_deref())?;

        let fields: Vec<Option<Vec<String>>> =
            objects.iter().map(|object| object.fields.clone()).collect();
        let candidates = read_candidates(
            objects
                .into_iter()
                .map(|object| (object.type_name, object.id)),
            |type_name, id| {
                self.ensure_allowed(type_name)
                    .map_err(|err| BulkItemError::new(id, type_name, &err))
            },
        );

        let pre_read_requests = candidates
            .iter()
            .zip(&fields)
            .filter_map(|(candidate, fields)| candidate.as_ref().ok().map(|c| (c, fields)))
            .map(|(candidate, fields)| MgetDocRequest {
                index: self.get_index_for_type(&candidate.type_name),
                id: self.serializer.generate_raw_id(
                    namespace.as_deref(),
                    &candidate.type_name,
                    &candidate.id,
                ),
                source_includes: included_fields(
                    std::slice::from_ref(&candidate.type_name),
                    fields.as_deref(),
                ),
            })
            .collect();
        let pre_read = self.multi_get(pre_read_requests).await?;

        let saved_objects: Vec<ItemResult<SavedObject>> = candidates
            .into_iter()
            .map(|candidate| {
                let candidate = candidate?;
                let not_found = || {
                    BulkItemError::new(
                        &candidate.id,
                        &candidate.type_name,
                        &RepoError::not_found(&candidate.type_name, &candidate.id),
                    )
                };
                let doc = found_doc(&pre_read, candidate.pre_read_index).ok_or_else(not_found)?;
                let source = decode_mget_source(doc)
                    .filter(|source| {
                        exists_in_namespace(&self.registry, source, namespace.as_deref())
                    })
                    .ok_or_else(not_found)?;
                Ok(self.saved_object_from_source(
                    &candidate.type_name,
                    &candidate.id,
                    source,
                    doc.seq_no,
                    doc.primary_term,
                ))
            })
            .collect();

        log_bulk("bulk_get", &saved_objects);
        Ok(BulkResponse { saved_objects })
    }

    /// Partially updates many objects with one bulk write.
    pub async fn bulk_update(
        &self,
        objects: Vec<BulkUpdateObject>,
        options: BulkUpdateOptions,
    ) -> RepoResult<BulkResponse> {
        let namespace = normalize_namespace(options.namespace.as_deref())?;
        let time = current_time();

        let mut pre_read_count = 0;
        let candidates: Vec<ItemResult<UpdateCandidate>> = objects
            .into_iter()
            .map(|object| {
                let fail = |err: RepoError| BulkItemError::new(&object.id, &object.type_name, &err);
                if !self.is_allowed(&object.type_name) {
                    return Err(fail(RepoError::not_found(&object.type_name, &object.id)));
                }
                let (item_namespace, namespace_string) = match object.namespace.as_deref() {
                    Some(ALL_NAMESPACES_STRING) => {
                        return Err(fail(RepoError::bad_request("\"namespace\" cannot be \"*\"")));
                    }
                    Some(explicit) => (
                        namespace_string_to_id(explicit).map_err(fail)?,
                        explicit.to_string(),
                    ),
                    None => (
                        namespace.clone(),
                        namespace_id_to_string(namespace.as_deref()),
                    ),
                };
                let document = update_document(
                    &object.type_name,
                    &object.attributes,
                    &time,
                    object.references.as_ref(),
                    object.permissions.as_ref(),
                )
                .map_err(fail)?;
                let pre_read_index = self
                    .registry
                    .is_multi_namespace(&object.type_name)
                    .then(|| {
                        pre_read_count += 1;
                        pre_read_count - 1
                    });
                Ok(UpdateCandidate {
                    object,
                    namespace: item_namespace,
                    namespace_string,
                    document,
                    pre_read_index,
                })
            })
            .collect();

        let pre_read_requests = candidates
            .iter()
            .filter_map(|candidate| candidate.as_ref().ok())
            .filter(|candidate| candidate.pre_read_index.is_some())
            .map(|candidate| MgetDocRequest {
                index: self.get_index_for_type(&candidate.object.type_name),
                id: self.serializer.generate_raw_id(
                    candidate.namespace.as_deref(),
                    &candidate.object.type_name,
                    &candidate.object.id,
                ),
                source_includes: Some(vec![SOURCE_TYPE.to_string(), SOURCE_NAMESPACES.to_string()]),
            })
            .collect();
        let pre_read = self.multi_get(pre_read_requests).await?;

        let mut operations = Vec::new();
        let planned: Vec<ItemResult<PlannedWrite>> = candidates
            .into_iter()
            .map(|candidate| {
                let candidate = candidate?;
                let (operation, namespaces) = self.plan_update(&candidate, &pre_read)?;
                let write_index = operations.len();
                operations.push(operation);
                Ok(PlannedWrite {
                    write_index,
                    id: candidate.object.id.clone(),
                    type_name: candidate.object.type_name.clone(),
                    outcome: PlannedOutcome::Updated {
                        object: candidate.object,
                        namespaces,
                        time: time.clone(),
                    },
                })
            })
            .collect();

        let items = self
            .bulk_write(
                operations,
                self.refresh_or_default(options.refresh),
                Some(vec![SOURCE_ORIGIN_ID.to_string()]),
            )
            .await?;
        let saved_objects = self.collect_bulk_results(planned, &items);
        log_bulk("bulk_update", &saved_objects);
        Ok(BulkResponse { saved_objects })
    }

    fn validate_create_item(&self, object: &BulkCreateObject) -> ItemResult<()> {
        let id = object.id.as_deref().unwrap_or_default();
        let fail = |err: RepoError| BulkItemError::new(id, &object.type_name, &err);

        if !self.is_allowed(&object.type_name) {
            return Err(fail(RepoError::UnsupportedType(object.type_name.clone())));
        }
        if let Some(initial_namespaces) = &object.initial_namespaces {
            if !self.registry.is_multi_namespace(&object.type_name) {
                return Err(fail(RepoError::bad_request(
                    "\"initialNamespaces\" can only be used on multi-namespace types",
                )));
            }
            if initial_namespaces.is_empty() {
                return Err(fail(RepoError::bad_request(
                    "\"initialNamespaces\" must be a non-empty array of strings",
                )));
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_create(
        &self,
        method: WriteMethod,
        id: &str,
        object: &BulkCreateObject,
        pre_read: Option<&MgetDoc>,
        namespace: Option<&str>,
        options: &BulkCreateOptions,
        time: &str,
    ) -> ItemResult<(BulkOperation, RawDoc)> {
        let type_name = object.type_name.as_str();
        let fail = |err: RepoError| BulkItemError::new(id, type_name, &err);

        let mut doc = SavedObjectDoc::new(id, type_name, object.attributes.clone());
        let mut precondition = object
            .version
            .as_deref()
            .map(decode_request_version)
            .transpose()
            .map_err(|err| fail(err.into()))?;

        if self.registry.is_multi_namespace(type_name) {
            let existing = match pre_read.filter(|doc| doc.found) {
                Some(found) => {
                    let source = decode_mget_source(found).ok_or_else(|| {
                        fail(RepoError::Unexpected(format!(
                            "stored document [{type_name}/{id}] has an unreadable source"
                        )))
                    })?;
                    if !exists_in_namespace(&self.registry, &source, namespace) {
                        return Err(fail(RepoError::not_overwritable(type_name, id)));
                    }
                    if precondition.is_none() {
                        precondition = pre_read_precondition(found);
                    }
                    Some(source)
                }
                None => None,
            };
            doc.namespaces = object
                .initial_namespaces
                .clone()
                .or_else(|| namespaces_of(existing.as_ref(), None, namespace));
        } else if self.registry.is_single_namespace(type_name) {
            doc.namespace = namespace.map(str::to_string);
        }
        doc.origin_id = object.origin_id.clone();
        doc.migration_version = object.migration_version.clone();
        doc.updated_at = Some(time.to_string());
        doc.references = object.references.clone().unwrap_or_default();
        doc.workspaces = match method {
            WriteMethod::Create => options.workspaces.clone(),
            WriteMethod::Index => object.workspaces.clone(),
        };
        doc.permissions = object.permissions.clone();

        let migrated = self.migrator.migrate_document(doc).map_err(|err| fail(err.into()))?;
        let raw = self.serializer.saved_object_to_raw(&migrated);
        let meta = BulkMeta {
            index: self.get_index_for_type(type_name),
            id: raw.id.clone(),
            precondition: if options.overwrite { precondition } else { None },
        };
        let source = raw.source.to_document();
        let operation = match method {
            WriteMethod::Index => BulkOperation::Index { meta, source },
            WriteMethod::Create => BulkOperation::Create { meta, source },
        };
        Ok((operation, raw))
    }

    fn plan_update(
        &self,
        candidate: &UpdateCandidate,
        pre_read: &[MgetDoc],
    ) -> ItemResult<(BulkOperation, Option<Vec<String>>)> {
        let object = &candidate.object;
        let fail = |err: RepoError| BulkItemError::new(&object.id, &object.type_name, &err);

        let (namespaces, precondition) = match candidate.pre_read_index {
            Some(index) => {
                let found = found_doc(pre_read, index);
                let source = found.and_then(decode_mget_source).filter(|source| {
                    exists_in_namespace(&self.registry, source, candidate.namespace.as_deref())
                });
                let (Some(found), Some(source)) = (found, source) else {
                    return Err(fail(RepoError::not_found(&object.type_name, &object.id)));
                };
                let namespaces = source
                    .namespaces
                    .unwrap_or_else(|| vec![namespace_id_to_string(source.namespace.as_deref())]);
                let precondition = match object.version.as_deref() {
                    Some(version) => {
                        Some(decode_request_version(version).map_err(|err| fail(err.into()))?)
                    }
                    None => pre_read_precondition(found),
                };
                (Some(namespaces), precondition)
            }
            None => {
                let namespaces = self
                    .registry
                    .is_single_namespace(&object.type_name)
                    .then(|| vec![candidate.namespace_string.clone()]);
                let precondition =
                    expected_version(object.version.as_deref(), None).map_err(fail)?;
                (namespaces, precondition)
            }
        };

        let operation = BulkOperation::Update {
            meta: BulkMeta {
                index: self.get_index_for_type(&object.type_name),
                id: self.serializer.generate_raw_id(
                    candidate.namespace.as_deref(),
                    &object.type_name,
                    &object.id,
                ),
                precondition,
            },
            doc: candidate.document.clone(),
        };
        Ok((operation, namespaces))
    }

    /// One multi-get; an empty request or a missing index reads as all misses.
    async fn multi_get(&self, docs: Vec<MgetDocRequest>) -> RepoResult<Vec<MgetDoc>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.client.mget(docs).await.tolerate_not_found()?;
        Ok(response
            .map(|response| response.body.docs)
            .unwrap_or_default())
    }

    async fn bulk_write(
        &self,
        operations: Vec<BulkOperation>,
        refresh: Refresh,
        update_source_includes: Option<Vec<String>>,
    ) -> RepoResult<Vec<BulkResponseItem>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        let expected = operations.len();
        let response = self
            .client
            .bulk(BulkRequest {
                operations,
                refresh,
                update_source_includes,
            })
            .await?;
        if response.body.items.len() != expected {
            return Err(RepoError::Unexpected(format!(
                "bulk response has {} items for {expected} operations",
                response.body.items.len()
            )));
        }
        Ok(response.body.items)
    }

    fn collect_bulk_results(
        &self,
        planned: Vec<ItemResult<PlannedWrite>>,
        items: &[BulkResponseItem],
    ) -> Vec<ItemResult<SavedObject>> {
        planned
            .into_iter()
            .map(|planned| {
                let planned = planned?;
                let Some(item) = items.get(planned.write_index) else {
                    return Err(BulkItemError::with_payload(
                        &planned.id,
                        &planned.type_name,
                        ErrorPayload::opaque("missing bulk response item"),
                    ));
                };
                if let Some(failure) = &item.error {
                    return Err(BulkItemError::with_payload(
                        &planned.id,
                        &planned.type_name,
                        bulk_operation_error(failure, &planned.type_name, &planned.id),
                    ));
                }

                Ok(match planned.outcome {
                    PlannedOutcome::Created(mut raw) => {
                        raw.seq_no = item.seq_no;
                        raw.primary_term = item.primary_term;
                        self.raw_to_saved_object(&raw)
                    }
                    PlannedOutcome::Updated {
                        object,
                        namespaces,
                        time,
                    } => SavedObject {
                        id: object.id,
                        type_name: object.type_name,
                        namespaces: namespaces.unwrap_or_default(),
                        origin_id: item
                            .source
                            .as_ref()
                            .and_then(|source| source.get(SOURCE_ORIGIN_ID))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        updated_at: Some(time),
                        version: encode_hit_version(item.seq_no, item.primary_term),
                        attributes: object.attributes,
                        references: object.references.unwrap_or_default(),
                        migration_version: None,
                        workspaces: None,
                        permissions: object.permissions,
                    },
                })
            })
            .collect()
    }
}

/// Validates read items; every survivor is pre-read in input order.
fn read_candidates<I, F>(objects: I, validate: F) -> Vec<ItemResult<ReadCandidate>>
where
    I: IntoIterator<Item = (String, String)>,
    F: Fn(&str, &str) -> ItemResult<()>,
{
    let mut pre_read_count = 0;
    objects
        .into_iter()
        .map(|(type_name, id)| {
            validate(&type_name, &id)?;
            let pre_read_index = pre_read_count;
            pre_read_count += 1;
            Ok(ReadCandidate {
                type_name,
                id,
                pre_read_index,
            })
        })
        .collect()
}

fn found_doc(pre_read: &[MgetDoc], index: usize) -> Option<&MgetDoc> {
    pre_read.get(index).filter(|doc| doc.found)
}

fn decode_mget_source(doc: &MgetDoc) -> Option<RawDocSource> {
    doc.source
        .as_ref()
        .and_then(|source| RawDocSource::from_document(source).ok())
}

fn pre_read_precondition(doc: &MgetDoc) -> Option<VersionPrecondition> {
    match (doc.seq_no, doc.primary_term) {
        (Some(seq_no), Some(primary_term)) => Some(VersionPrecondition::new(seq_no, primary_term)),
        _ => None,
    }
}

fn log_bulk(event: &str, results: &[ItemResult<SavedObject>]) {
    let failed = results.iter().filter(|result| result.is_err()).count();
    debug!(
        "event={event} module=repo status=ok items={} failed={failed}",
        results.len()
    );
}
