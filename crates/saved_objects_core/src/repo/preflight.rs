//! Preflight reads of multi-namespace objects.
//!
//! # Invariants
//! - Preflight reads address the namespace-free raw id; visibility is then
//!   decided from the stored namespace set.
//! - Only multi-namespace types may be preflighted.

use crate::model::raw_doc::{RawDoc, RawDocSource};
use crate::namespace::{exists_in_namespace, namespaces_of};
use crate::repo::error::{decorate_store_error, RepoError, RepoResult};
use crate::repo::repository::SavedObjectsRepository;
use crate::store::{GetRequest, StoreResultExt};
use log::debug;

impl SavedObjectsRepository {
    /// Namespaces a write of `(type, id)` should carry.
    ///
    /// # Errors
    /// - Returns a not-overwritable `Conflict` when the object exists but is
    ///   not visible from `namespace`.
    pub(crate) async fn preflight_get_namespaces(
        &self,
        type_name: &str,
        id: &str,
        namespace: Option<&str>,
    ) -> RepoResult<Option<Vec<String>>> {
        self.ensure_multi_namespace(type_name)?;

        match self.fetch_unscoped(type_name, id).await? {
            Some(raw) => {
                if !exists_in_namespace(&self.registry, &raw.source, namespace) {
                    debug!(
                        "event=preflight module=repo status=conflict type={type_name} reason=foreign_namespace"
                    );
                    return Err(RepoError::not_overwritable(type_name, id));
                }
                Ok(namespaces_of(Some(&raw.source), None, namespace))
            }
            None => Ok(namespaces_of(None, None, namespace)),
        }
    }

    /// Reads `(type, id)` and requires it to be visible from `namespace`.
    pub(crate) async fn preflight_check_includes_namespace(
        &self,
        type_name: &str,
        id: &str,
        namespace: Option<&str>,
    ) -> RepoResult<RawDoc> {
        self.ensure_multi_namespace(type_name)?;

        match self.fetch_unscoped(type_name, id).await? {
            Some(raw) if exists_in_namespace(&self.registry, &raw.source, namespace) => Ok(raw),
            _ => Err(RepoError::not_found(type_name, id)),
        }
    }

    fn ensure_multi_namespace(&self, type_name: &str) -> RepoResult<()> {
        if self.registry.is_multi_namespace(type_name) {
            Ok(())
        } else {
            Err(RepoError::Unexpected(format!(
                "Cannot make preflight get request for non-multi-namespace type '{type_name}'."
            )))
        }
    }

    async fn fetch_unscoped(&self, type_name: &str, id: &str) -> RepoResult<Option<RawDoc>> {
        let response = self
            .client
            .get(GetRequest {
                index: self.get_index_for_type(type_name),
                id: self.serializer.generate_raw_id(None, type_name, id),
            })
            .await
            .tolerate_not_found()
            .map_err(|err| decorate_store_error(err, type_name, id))?;

        let Some(response) = response else {
            return Ok(None);
        };
        Ok(Some(RawDoc {
            source: RawDocSource::from_document(&response.body.source)?,
            id: response.body.id,
            seq_no: Some(response.body.seq_no),
            primary_term: Some(response.body.primary_term),
        }))
    }
}
