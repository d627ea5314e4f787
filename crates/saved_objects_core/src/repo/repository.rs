//! Saved objects repository façade.
//!
//! # Responsibility
//! - Expose single-object CRUD, namespace membership and search operations.
//! - Compose type allow-listing, namespace policy, preflight reads,
//!   migration and serialization around each store round-trip.
//!
//! # Invariants
//! - Local validation (type, namespace shape, option combinations) happens
//!   before any store round-trip.
//! - Absence, wrong-namespace visibility and a missing index all surface as
//!   the same `NotFound`.
//! - The repository holds no mutable state between calls; concurrent writers
//!   are arbitrated by store-side `(seq_no, primary_term)` preconditions.

use crate::config::{RepositoryConfig, FIND_DEFAULT_PAGE};
use crate::migration::DocumentMigrator;
use crate::model::raw_doc::{
    Document, RawDoc, RawDocSource, SOURCE_NAMESPACES, SOURCE_PERMISSIONS, SOURCE_REFERENCES,
    SOURCE_UPDATED_AT,
};
use crate::model::saved_object::{
    Attributes, Permissions, SavedObject, SavedObjectDoc, SavedObjectReference,
};
use crate::model::version::{decode_request_version, encode_version, VersionPrecondition};
use crate::namespace::{
    exists_in_namespace, namespace_id_to_string, normalize_namespace, unique_namespaces,
    ALL_NAMESPACES_STRING,
};
use crate::repo::error::{decorate_store_error, RepoError, RepoResult};
use crate::repo::options::{
    AddToNamespacesOptions, BaseOptions, CreateOptions, DeleteByQueryOptions,
    DeleteFromNamespacesOptions, DeleteOptions, FindOptions, FindResponse, FindResult,
    IncrementCounterOptions, NamespacesResponse, UpdateOptions,
};
use crate::search::{get_search_dsl, included_fields, SearchDslOptions};
use crate::serializer::SavedObjectsSerializer;
use crate::store::{
    DeleteRequest, GetRequest, Refresh, SearchRequest, StoreClient, StoreResultExt, StoreScript,
    UpdateBody, UpdateByQueryRequest, UpdateByQueryResponse, UpdateRequest, WriteRequest,
    WriteResult,
};
use crate::types::TypeRegistry;
use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Namespace-aware, versioned repository of saved objects.
pub struct SavedObjectsRepository {
    pub(super) index: String,
    pub(super) registry: Arc<TypeRegistry>,
    pub(super) serializer: SavedObjectsSerializer,
    pub(super) migrator: Arc<dyn DocumentMigrator>,
    pub(super) client: Arc<dyn StoreClient>,
    pub(super) allowed_types: Vec<String>,
    pub(super) refresh: Refresh,
    pub(super) find_default_per_page: usize,
}

impl SavedObjectsRepository {
    /// Builds a repository over every visible type plus the configured hidden types.
    ///
    /// # Errors
    /// - Returns `InvalidConfig` when an included hidden type is not registered.
    /// - Returns `InvalidConfig` when no type would be allowed.
    pub fn create_repository(
        config: RepositoryConfig,
        registry: Arc<TypeRegistry>,
        client: Arc<dyn StoreClient>,
        migrator: Arc<dyn DocumentMigrator>,
    ) -> RepoResult<Self> {
        config.validate()?;

        let all_types: Vec<String> = registry
            .get_all_types()
            .into_iter()
            .map(|declaration| declaration.name.clone())
            .collect();
        let missing: Vec<&str> = config
            .included_hidden_types
            .iter()
            .filter(|type_name| !all_types.contains(type_name))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(RepoError::InvalidConfig(format!(
                "Missing mappings for saved objects types: '{}'",
                missing.join(", ")
            )));
        }

        let allowed_types = unique_namespaces(
            all_types
                .iter()
                .filter(|type_name| !registry.is_hidden(type_name))
                .cloned()
                .chain(config.included_hidden_types.iter().cloned()),
        );
        if allowed_types.is_empty() {
            return Err(RepoError::InvalidConfig(
                "Empty or missing types for saved object repository!".to_string(),
            ));
        }

        info!(
            "event=repository_create module=repo status=ok index={} allowed_types={}",
            config.index,
            allowed_types.len()
        );
        Ok(Self {
            index: config.index,
            serializer: SavedObjectsSerializer::new(Arc::clone(&registry)),
            registry,
            migrator,
            client,
            allowed_types,
            refresh: config.refresh,
            find_default_per_page: config.find_default_per_page,
        })
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.allowed_types
    }

    /// Persists one object.
    ///
    /// Overwriting an existing multi-namespace object keeps its namespaces
    /// unless `initial_namespaces` is given.
    pub async fn create(
        &self,
        type_name: &str,
        attributes: Attributes,
        options: CreateOptions,
    ) -> RepoResult<SavedObject> {
        let namespace = normalize_namespace(options.namespace.as_deref())?;

        if let Some(initial_namespaces) = &options.initial_namespaces {
            if !self.registry.is_multi_namespace(type_name) {
                return Err(RepoError::bad_request(
                    "\"options.initialNamespaces\" can only be used on multi-namespace types",
                ));
            }
            if initial_namespaces.is_empty() {
                return Err(RepoError::bad_request(
                    "\"options.initialNamespaces\" must be a non-empty array of strings",
                ));
            }
        }
        self.ensure_allowed(type_name)?;

        // An empty id counts as missing.
        let explicit_id = options.id.clone().filter(|id| !id.is_empty());
        let overwrite_existing = explicit_id.is_some() && options.overwrite;
        let id = explicit_id.unwrap_or_else(generate_id);
        let time = current_time();

        let mut doc = SavedObjectDoc::new(id.clone(), type_name, attributes);
        if self.registry.is_single_namespace(type_name) {
            doc.namespace = namespace.clone();
        } else if self.registry.is_multi_namespace(type_name) {
            doc.namespaces = if overwrite_existing {
                let existing = self
                    .preflight_get_namespaces(type_name, &id, namespace.as_deref())
                    .await?;
                options.initial_namespaces.clone().or(existing)
            } else {
                options
                    .initial_namespaces
                    .clone()
                    .or_else(|| Some(vec![namespace_id_to_string(namespace.as_deref())]))
            };
        }
        doc.origin_id = options.origin_id;
        doc.migration_version = options.migration_version;
        doc.updated_at = Some(time);
        doc.references = options.references.unwrap_or_default();
        doc.workspaces = options.workspaces;
        doc.permissions = options.permissions;

        let migrated = self.migrator.migrate_document(doc)?;
        let mut raw = self.serializer.saved_object_to_raw(&migrated);

        let precondition = match (&options.version, options.overwrite) {
            (Some(version), true) => Some(decode_request_version(version)?),
            _ => None,
        };
        let request = WriteRequest {
            index: self.get_index_for_type(type_name),
            id: raw.id.clone(),
            source: raw.source.to_document(),
            precondition,
            refresh: self.refresh_or_default(options.refresh),
        };
        let response = if overwrite_existing {
            self.client.index(request).await
        } else {
            self.client.create(request).await
        }
        .map_err(|err| decorate_store_error(err, type_name, &id))?;

        raw.seq_no = Some(response.body.seq_no);
        raw.primary_term = Some(response.body.primary_term);
        debug!("event=create module=repo status=ok type={type_name} overwrite={overwrite_existing}");
        Ok(self.raw_to_saved_object(&raw))
    }

    /// Reads one object visible from the requested namespace.
    pub async fn get(
        &self,
        type_name: &str,
        id: &str,
        options: BaseOptions,
    ) -> RepoResult<SavedObject> {
        if !self.is_allowed(type_name) {
            return Err(RepoError::not_found(type_name, id));
        }
        let namespace = normalize_namespace(options.namespace.as_deref())?;

        let response = self
            .client
            .get(GetRequest {
                index: self.get_index_for_type(type_name),
                id: self
                    .serializer
                    .generate_raw_id(namespace.as_deref(), type_name, id),
            })
            .await
            .tolerate_not_found()
            .map_err(|err| decorate_store_error(err, type_name, id))?
            .ok_or_else(|| RepoError::not_found(type_name, id))?;

        let source = RawDocSource::from_document(&response.body.source)?;
        if !exists_in_namespace(&self.registry, &source, namespace.as_deref()) {
            return Err(RepoError::not_found(type_name, id));
        }
        Ok(self.saved_object_from_source(
            type_name,
            id,
            source,
            Some(response.body.seq_no),
            Some(response.body.primary_term),
        ))
    }

    /// Merges partial attributes into one object.
    ///
    /// The returned object carries only the attributes that were sent.
    pub async fn update(
        &self,
        type_name: &str,
        id: &str,
        attributes: Attributes,
        options: UpdateOptions,
    ) -> RepoResult<SavedObject> {
        if !self.is_allowed(type_name) {
            return Err(RepoError::not_found(type_name, id));
        }
        let namespace = normalize_namespace(options.namespace.as_deref())?;

        let preflight = if self.registry.is_multi_namespace(type_name) {
            Some(
                self.preflight_check_includes_namespace(type_name, id, namespace.as_deref())
                    .await?,
            )
        } else {
            None
        };

        let time = current_time();
        let doc = update_document(
            type_name,
            &attributes,
            &time,
            options.references.as_ref(),
            options.permissions.as_ref(),
        )?;
        let response = self
            .client
            .update(UpdateRequest {
                index: self.get_index_for_type(type_name),
                id: self
                    .serializer
                    .generate_raw_id(namespace.as_deref(), type_name, id),
                body: UpdateBody::Doc(doc),
                precondition: expected_version(options.version.as_deref(), preflight.as_ref())?,
                refresh: self.refresh_or_default(options.refresh),
                return_source: true,
            })
            .await
            .tolerate_not_found()
            .map_err(|err| decorate_store_error(err, type_name, id))?
            .ok_or_else(|| RepoError::not_found(type_name, id))?;

        let source = response
            .body
            .source
            .as_ref()
            .map(RawDocSource::from_document)
            .transpose()?;
        let namespaces = match &source {
            _ if self.registry.is_namespace_agnostic(type_name) => Vec::new(),
            Some(source) => source
                .namespaces
                .clone()
                .unwrap_or_else(|| vec![namespace_id_to_string(source.namespace.as_deref())]),
            None => vec![namespace_id_to_string(namespace.as_deref())],
        };

        Ok(SavedObject {
            id: id.to_string(),
            type_name: type_name.to_string(),
            namespaces,
            origin_id: source.and_then(|source| source.origin_id),
            updated_at: Some(time),
            version: Some(encode_version(
                response.body.seq_no,
                response.body.primary_term,
            )),
            attributes,
            references: options.references.unwrap_or_default(),
            migration_version: None,
            workspaces: None,
            permissions: options.permissions,
        })
    }

    /// Deletes one object.
    ///
    /// # Errors
    /// - Returns `BadRequest` for a multi-namespace object shared to several
    ///   namespaces unless `force` is set.
    pub async fn delete(&self, type_name: &str, id: &str, options: DeleteOptions) -> RepoResult<()> {
        if !self.is_allowed(type_name) {
            return Err(RepoError::not_found(type_name, id));
        }
        let namespace = normalize_namespace(options.namespace.as_deref())?;

        let preflight = if self.registry.is_multi_namespace(type_name) {
            let raw = self
                .preflight_check_includes_namespace(type_name, id, namespace.as_deref())
                .await?;
            let existing = raw.source.namespaces.clone().unwrap_or_default();
            if !options.force
                && (existing.len() > 1 || existing.iter().any(|ns| ns == ALL_NAMESPACES_STRING))
            {
                return Err(RepoError::bad_request(
                    "Unable to delete saved object that exists in multiple namespaces, use the `force` option to delete it anyway",
                ));
            }
            Some(raw)
        } else {
            None
        };

        let raw_id = self
            .serializer
            .generate_raw_id(namespace.as_deref(), type_name, id);
        self.delete_raw(type_name, id, raw_id, preflight.as_ref(), options.refresh)
            .await
    }

    /// Removes `namespace` from every object; objects left without a
    /// namespace are deleted. Namespace-agnostic types are untouched.
    pub async fn delete_by_namespace(
        &self,
        namespace: &str,
        options: DeleteByQueryOptions,
    ) -> RepoResult<UpdateByQueryResponse> {
        if namespace.is_empty() || namespace == ALL_NAMESPACES_STRING {
            return Err(RepoError::bad_request(
                "namespace is required, and must be a string that is not equal to '*'",
            ));
        }

        let types: Vec<String> = self
            .all_type_names()
            .into_iter()
            .filter(|type_name| !self.registry.is_namespace_agnostic(type_name))
            .collect();
        let query = get_search_dsl(
            &self.registry,
            &SearchDslOptions {
                types: types.clone(),
                namespaces: Some(vec![namespace.to_string()]),
                ..SearchDslOptions::default()
            },
        )?;

        let counts = self
            .update_by_query(
                &types,
                query,
                StoreScript::RemoveNamespace {
                    namespace: namespace.to_string(),
                },
                options,
            )
            .await?;
        info!(
            "event=delete_by_namespace module=repo status=ok total={} updated={} deleted={}",
            counts.total, counts.updated, counts.deleted
        );
        Ok(counts)
    }

    /// Removes `workspace` from every object in every namespace; objects left
    /// without a workspace are deleted.
    pub async fn delete_by_workspace(
        &self,
        workspace: &str,
        options: DeleteByQueryOptions,
    ) -> RepoResult<UpdateByQueryResponse> {
        if workspace.is_empty() || workspace == ALL_NAMESPACES_STRING {
            return Err(RepoError::bad_request(
                "workspace is required, and must be a string that is not equal to '*'",
            ));
        }

        let types = self.all_type_names();
        let query = get_search_dsl(
            &self.registry,
            &SearchDslOptions {
                types: types.clone(),
                namespaces: Some(vec![ALL_NAMESPACES_STRING.to_string()]),
                workspaces: Some(vec![workspace.to_string()]),
                ..SearchDslOptions::default()
            },
        )?;

        let counts = self
            .update_by_query(
                &types,
                query,
                StoreScript::RemoveWorkspace {
                    workspace: workspace.to_string(),
                },
                options,
            )
            .await?;
        info!(
            "event=delete_by_workspace module=repo status=ok total={} updated={} deleted={}",
            counts.total, counts.updated, counts.deleted
        );
        Ok(counts)
    }

    /// Shares a multi-namespace object to more namespaces.
    pub async fn add_to_namespaces(
        &self,
        type_name: &str,
        id: &str,
        namespaces: &[String],
        options: AddToNamespacesOptions,
    ) -> RepoResult<NamespacesResponse> {
        self.validate_namespace_change(type_name, id, namespaces)?;
        let namespace = normalize_namespace(options.namespace.as_deref())?;

        let preflight = self
            .preflight_check_includes_namespace(type_name, id, namespace.as_deref())
            .await?;
        let existing = stored_namespaces_or_empty(&preflight, type_name, id);
        let updated = unique_namespaces(existing.into_iter().chain(namespaces.iter().cloned()));

        let precondition = expected_version(options.version.as_deref(), Some(&preflight))?;
        self.update_namespaces(type_name, id, &updated, precondition, options.refresh)
            .await?;
        Ok(NamespacesResponse {
            namespaces: updated,
        })
    }

    /// Unshares a multi-namespace object; removing its last namespace deletes it.
    pub async fn delete_from_namespaces(
        &self,
        type_name: &str,
        id: &str,
        namespaces: &[String],
        options: DeleteFromNamespacesOptions,
    ) -> RepoResult<NamespacesResponse> {
        self.validate_namespace_change(type_name, id, namespaces)?;
        let namespace = normalize_namespace(options.namespace.as_deref())?;

        let preflight = self
            .preflight_check_includes_namespace(type_name, id, namespace.as_deref())
            .await?;
        let remaining: Vec<String> = stored_namespaces_or_empty(&preflight, type_name, id)
            .into_iter()
            .filter(|existing| !namespaces.contains(existing))
            .collect();

        if remaining.is_empty() {
            let raw_id = self.serializer.generate_raw_id(None, type_name, id);
            self.delete_raw(type_name, id, raw_id, Some(&preflight), options.refresh)
                .await?;
            return Ok(NamespacesResponse::default());
        }

        let precondition = expected_version(None, Some(&preflight))?;
        self.update_namespaces(type_name, id, &remaining, precondition, options.refresh)
            .await?;
        Ok(NamespacesResponse {
            namespaces: remaining,
        })
    }

    /// Increments a numeric attribute by one, creating the object when missing.
    ///
    /// Not idempotent: every delivered call increments again.
    pub async fn increment_counter(
        &self,
        type_name: &str,
        id: &str,
        counter_field: &str,
        options: IncrementCounterOptions,
    ) -> RepoResult<SavedObject> {
        if type_name.is_empty() {
            return Err(RepoError::bad_request("\"type\" argument must be a string"));
        }
        if counter_field.is_empty() {
            return Err(RepoError::bad_request(
                "\"counterFieldName\" argument must be a string",
            ));
        }
        self.ensure_allowed(type_name)?;
        let namespace = normalize_namespace(options.namespace.as_deref())?;

        let time = current_time();
        let mut doc = SavedObjectDoc::new(id, type_name, json!({ counter_field: 1 }));
        if self.registry.is_single_namespace(type_name) {
            doc.namespace = namespace.clone();
        } else if self.registry.is_multi_namespace(type_name) {
            doc.namespaces = self
                .preflight_get_namespaces(type_name, id, namespace.as_deref())
                .await?;
        }
        doc.migration_version = options.migration_version;
        doc.updated_at = Some(time.clone());

        let migrated = self.migrator.migrate_document(doc)?;
        let raw = self.serializer.saved_object_to_raw(&migrated);

        let response = self
            .client
            .update(UpdateRequest {
                index: self.get_index_for_type(type_name),
                id: raw.id.clone(),
                body: UpdateBody::Script {
                    script: StoreScript::IncrementCounter {
                        type_name: type_name.to_string(),
                        counter_field: counter_field.to_string(),
                        count: 1,
                        time,
                    },
                    upsert: Some(raw.source.to_document()),
                },
                precondition: None,
                refresh: self.refresh_or_default(options.refresh),
                return_source: true,
            })
            .await
            .map_err(|err| decorate_store_error(err, type_name, id))?;

        let source = response.body.source.as_ref().ok_or_else(|| {
            RepoError::Unexpected(format!(
                "store update of [{type_name}/{id}] returned no source"
            ))
        })?;
        Ok(self.saved_object_from_source(
            type_name,
            id,
            RawDocSource::from_document(source)?,
            Some(response.body.seq_no),
            Some(response.body.primary_term),
        ))
    }

    /// Searches objects; a missing index yields an empty page.
    pub async fn find(&self, options: FindOptions) -> RepoResult<FindResponse> {
        let has_types = options.types.as_ref().is_some_and(|types| !types.is_empty());
        let has_map = options.type_to_namespaces_map.is_some();
        let empty_namespaces = options.namespaces.as_ref().is_some_and(Vec::is_empty);

        if !has_types && !has_map {
            return Err(RepoError::bad_request(
                "options.type must be a string or an array of strings",
            ));
        }
        if empty_namespaces && !has_map {
            return Err(RepoError::bad_request(
                "options.namespaces cannot be an empty array",
            ));
        }
        if has_types && has_map {
            return Err(RepoError::bad_request(
                "options.type must be an empty string when options.typeToNamespacesMap is used",
            ));
        }
        // The map carries its own namespaces; `namespaces` must be given empty.
        if has_map && !empty_namespaces {
            return Err(RepoError::bad_request(
                "options.namespaces must be an empty array when options.typeToNamespacesMap is used",
            ));
        }

        let requested_types: Vec<String> = match (&options.types, &options.type_to_namespaces_map) {
            (Some(types), _) if !types.is_empty() => types.clone(),
            (_, Some(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        };
        let allowed_types: Vec<String> = requested_types
            .iter()
            .filter(|type_name| self.is_allowed(type_name))
            .cloned()
            .collect();

        let page = options.page.unwrap_or(FIND_DEFAULT_PAGE).max(1);
        let per_page = options.per_page.unwrap_or(self.find_default_per_page);
        let empty_page = FindResponse {
            page,
            per_page,
            total: 0,
            saved_objects: Vec::new(),
        };
        if allowed_types.is_empty() {
            return Ok(empty_page);
        }

        if let Some(filter) = options
            .filter
            .iter()
            .find(|filter| !allowed_types.contains(&filter.type_name))
        {
            return Err(RepoError::bad_request(format!(
                "This type {} is not allowed",
                filter.type_name
            )));
        }

        let query = get_search_dsl(
            &self.registry,
            &SearchDslOptions {
                types: allowed_types.clone(),
                namespaces: options.namespaces.clone(),
                type_to_namespaces_map: options.type_to_namespaces_map.clone(),
                search: options.search.clone(),
                default_search_operator: options.default_search_operator,
                search_fields: options.search_fields.clone(),
                root_search_fields: options.root_search_fields.clone(),
                has_reference: options.has_reference.clone(),
                filters: options.filter.clone(),
                sort_field: options.sort_field.clone(),
                sort_order: options.sort_order,
                workspaces: options.workspaces.clone(),
            },
        )?;

        let response = self
            .client
            .search(SearchRequest {
                indices: self.get_indices_for_types(&allowed_types),
                query,
                size: per_page,
                from: per_page.saturating_mul(page - 1),
                source_includes: included_fields(&requested_types, options.fields.as_deref()),
                preference: options.preference.clone(),
            })
            .await
            .tolerate_not_found()?;
        let Some(response) = response else {
            return Ok(empty_page);
        };

        let mut saved_objects = Vec::with_capacity(response.body.hits.len());
        for hit in response.body.hits {
            let raw = RawDoc {
                id: hit.id,
                source: RawDocSource::from_document(&hit.source)?,
                seq_no: Some(hit.seq_no),
                primary_term: Some(hit.primary_term),
            };
            saved_objects.push(FindResult {
                saved_object: self.raw_to_saved_object(&raw),
                score: hit.score,
                sort: hit.sort,
            });
        }

        debug!(
            "event=find module=repo status=ok types={} total={} returned={}",
            allowed_types.len(),
            response.body.total,
            saved_objects.len()
        );
        Ok(FindResponse {
            page,
            per_page,
            total: response.body.total,
            saved_objects,
        })
    }

    /// Index holding documents of `type_name`.
    pub fn get_index_for_type(&self, type_name: &str) -> String {
        self.registry
            .get_index(type_name)
            .unwrap_or(self.index.as_str())
            .to_string()
    }

    /// Deduplicated indices holding documents of `types`.
    pub fn get_indices_for_types(&self, types: &[String]) -> Vec<String> {
        unique_namespaces(types.iter().map(|type_name| self.get_index_for_type(type_name)))
    }

    pub(super) fn is_allowed(&self, type_name: &str) -> bool {
        self.allowed_types.iter().any(|allowed| allowed == type_name)
    }

    pub(super) fn ensure_allowed(&self, type_name: &str) -> RepoResult<()> {
        if self.is_allowed(type_name) {
            Ok(())
        } else {
            Err(RepoError::UnsupportedType(type_name.to_string()))
        }
    }

    pub(super) fn refresh_or_default(&self, refresh: Option<Refresh>) -> Refresh {
        refresh.unwrap_or(self.refresh)
    }

    /// Converts a stored or just-written raw document into a caller record.
    pub(super) fn raw_to_saved_object(&self, raw: &RawDoc) -> SavedObject {
        let doc = self.serializer.raw_to_saved_object(raw);
        let namespaces = if self.registry.is_single_namespace(&doc.type_name) {
            vec![namespace_id_to_string(doc.namespace.as_deref())]
        } else {
            doc.namespaces.unwrap_or_default()
        };

        SavedObject {
            id: doc.id,
            type_name: doc.type_name,
            namespaces,
            origin_id: doc.origin_id,
            updated_at: doc.updated_at,
            version: doc.version,
            attributes: doc.attributes,
            references: doc.references,
            migration_version: doc.migration_version,
            workspaces: doc.workspaces,
            permissions: doc.permissions,
        }
    }

    /// Builds a caller record from a fetched source addressed by `(type, id)`.
    pub(super) fn saved_object_from_source(
        &self,
        type_name: &str,
        id: &str,
        source: RawDocSource,
        seq_no: Option<i64>,
        primary_term: Option<i64>,
    ) -> SavedObject {
        let namespaces = if self.registry.is_namespace_agnostic(type_name) {
            Vec::new()
        } else {
            source
                .namespaces
                .unwrap_or_else(|| vec![namespace_id_to_string(source.namespace.as_deref())])
        };

        SavedObject {
            id: id.to_string(),
            type_name: type_name.to_string(),
            namespaces,
            origin_id: source.origin_id,
            updated_at: source.updated_at,
            version: crate::model::version::encode_hit_version(seq_no, primary_term),
            attributes: source.attributes.unwrap_or(Value::Null),
            references: source.references.unwrap_or_default(),
            migration_version: source.migration_version,
            workspaces: source.workspaces,
            permissions: source.permissions,
        }
    }

    fn all_type_names(&self) -> Vec<String> {
        self.registry
            .get_all_types()
            .into_iter()
            .map(|declaration| declaration.name.clone())
            .collect()
    }

    fn validate_namespace_change(
        &self,
        type_name: &str,
        id: &str,
        namespaces: &[String],
    ) -> RepoResult<()> {
        if !self.is_allowed(type_name) {
            return Err(RepoError::not_found(type_name, id));
        }
        if !self.registry.is_multi_namespace(type_name) {
            return Err(RepoError::bad_request(format!(
                "{type_name} doesn't support multiple namespaces"
            )));
        }
        if namespaces.is_empty() || namespaces.iter().any(String::is_empty) {
            return Err(RepoError::bad_request(
                "namespaces must be a non-empty array of strings",
            ));
        }
        Ok(())
    }

    async fn update_namespaces(
        &self,
        type_name: &str,
        id: &str,
        namespaces: &[String],
        precondition: Option<VersionPrecondition>,
        refresh: Option<Refresh>,
    ) -> RepoResult<()> {
        let mut doc = Document::new();
        doc.insert(SOURCE_UPDATED_AT.to_string(), Value::String(current_time()));
        doc.insert(SOURCE_NAMESPACES.to_string(), json!(namespaces));

        self.client
            .update(UpdateRequest {
                index: self.get_index_for_type(type_name),
                id: self.serializer.generate_raw_id(None, type_name, id),
                body: UpdateBody::Doc(doc),
                precondition,
                refresh: self.refresh_or_default(refresh),
                return_source: false,
            })
            .await
            .tolerate_not_found()
            .map_err(|err| decorate_store_error(err, type_name, id))?
            .ok_or_else(|| RepoError::not_found(type_name, id))?;
        Ok(())
    }

    async fn delete_raw(
        &self,
        type_name: &str,
        id: &str,
        raw_id: String,
        preflight: Option<&RawDoc>,
        refresh: Option<Refresh>,
    ) -> RepoResult<()> {
        let response = self
            .client
            .delete(DeleteRequest {
                index: self.get_index_for_type(type_name),
                id: raw_id,
                precondition: expected_version(None, preflight)?,
                refresh: self.refresh_or_default(refresh),
            })
            .await
            .tolerate_not_found()
            .map_err(|err| decorate_store_error(err, type_name, id))?
            .ok_or_else(|| RepoError::not_found(type_name, id))?;

        match response.body.result {
            WriteResult::Deleted => {
                debug!("event=delete module=repo status=ok type={type_name}");
                Ok(())
            }
            other => Err(RepoError::Unexpected(format!(
                "Unexpected store DELETE response: type={type_name} id={id} result={other:?}"
            ))),
        }
    }

    async fn update_by_query(
        &self,
        types: &[String],
        query: crate::search::SearchQuery,
        script: StoreScript,
        options: DeleteByQueryOptions,
    ) -> RepoResult<UpdateByQueryResponse> {
        if types.is_empty() {
            return Ok(UpdateByQueryResponse::default());
        }
        let response = self
            .client
            .update_by_query(UpdateByQueryRequest {
                indices: self.get_indices_for_types(types),
                query,
                script,
                refresh: options.refresh.unwrap_or(false),
                conflicts_proceed: true,
            })
            .await
            .tolerate_not_found()?;
        Ok(response.map(|response| response.body).unwrap_or_default())
    }
}

/// Partial-update body: attributes under the type key plus stamped fields.
pub(super) fn update_document(
    type_name: &str,
    attributes: &Attributes,
    time: &str,
    references: Option<&Vec<SavedObjectReference>>,
    permissions: Option<&Permissions>,
) -> RepoResult<Document> {
    let mut doc = Document::new();
    doc.insert(type_name.to_string(), attributes.clone());
    doc.insert(SOURCE_UPDATED_AT.to_string(), Value::String(time.to_string()));
    if let Some(references) = references {
        doc.insert(SOURCE_REFERENCES.to_string(), to_json(references)?);
    }
    if let Some(permissions) = permissions {
        doc.insert(SOURCE_PERMISSIONS.to_string(), to_json(permissions)?);
    }
    Ok(doc)
}

/// Write precondition from a caller version, else from a preflight read.
pub(super) fn expected_version(
    version: Option<&str>,
    document: Option<&RawDoc>,
) -> RepoResult<Option<VersionPrecondition>> {
    if let Some(version) = version {
        return Ok(Some(decode_request_version(version)?));
    }
    Ok(document.and_then(|document| match (document.seq_no, document.primary_term) {
        (Some(seq_no), Some(primary_term)) => Some(VersionPrecondition::new(seq_no, primary_term)),
        _ => None,
    }))
}

/// RFC 3339 UTC timestamp with millisecond precision.
pub(super) fn current_time() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(super) fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

fn stored_namespaces_or_empty(preflight: &RawDoc, type_name: &str, id: &str) -> Vec<String> {
    match &preflight.source.namespaces {
        Some(namespaces) => namespaces.clone(),
        None => {
            warn!(
                "event=namespaces_missing module=repo status=recovered type={type_name} id={id} policy=empty_set"
            );
            Vec::new()
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> RepoResult<Value> {
    serde_json::to_value(value).map_err(|err| RepoError::Unexpected(err.to_string()))
}
