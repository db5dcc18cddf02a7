//! Repository trait definitions
//!
//! The trait uses RPITIT (Return Position Impl Trait In Traits) so
//! implementations can be plain `async fn`s without `async_trait`. Handlers
//! are generic over `R: Repository`, which keeps the CRUD layer independent
//! of the storage engine.

use std::future::Future;

use super::error::RepositoryError;
use super::filter::FilterCondition;
use super::query::DocumentQuery;
use super::schema::Schema;
use super::Document;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Document repository for one collection
///
/// Every method honors the schema's default filters, so documents they
/// exclude (secret tours, deactivated users) behave as if absent.
pub trait Repository: Clone + Send + Sync + 'static {
    /// The collection schema
    fn schema(&self) -> &dyn Schema;

    /// Entity name used in messages
    fn entity(&self) -> &'static str {
        self.schema().entity()
    }

    /// Find a document by identifier
    ///
    /// Returns `Ok(None)` when absent and an `InvalidId` error when `id`
    /// cannot belong to this collection.
    fn find_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = RepositoryResult<Option<Document>>> + Send;

    /// First document, in store order, matching every condition
    fn find_one(
        &self,
        filters: &[FilterCondition],
    ) -> impl Future<Output = RepositoryResult<Option<Document>>> + Send;

    /// Run a composed query
    fn find_all(
        &self,
        query: &DocumentQuery,
    ) -> impl Future<Output = RepositoryResult<Vec<Document>>> + Send;

    /// Count documents matching every condition
    fn count(
        &self,
        filters: &[FilterCondition],
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Validate and insert a new document, returning it as stored
    fn create(&self, data: Document) -> impl Future<Output = RepositoryResult<Document>> + Send;

    /// Merge `patch` into a document and re-validate the result
    ///
    /// A `null` in the patch removes the field. Fails with `NotFound` when
    /// the id is unmatched.
    fn update(
        &self,
        id: &str,
        patch: Document,
    ) -> impl Future<Output = RepositoryResult<Document>> + Send;

    /// Merge `patch` without running validation
    ///
    /// Unique constraints still apply.
    fn patch_unchecked(
        &self,
        id: &str,
        patch: Document,
    ) -> impl Future<Output = RepositoryResult<Document>> + Send;

    /// Remove a document; `false` when the id is unmatched
    fn delete(&self, id: &str) -> impl Future<Output = RepositoryResult<bool>> + Send;
}
