use async_trait::async_trait;
use falamedia_core::{BindingError, BindingStore, OwnerKind, OwnerReference};
use sqlx::PgPool;

/// Postgres binding repository
///
/// Owner kinds map onto the app's tables: user and child profiles live in
/// `profiles` (column `avatar_url`), vocabulary items in `vocabulary_items`
/// (column `image_url`). Exactly one update statement per bind, keyed by the
/// owner key, with no optimistic concurrency token.
#[derive(Clone)]
pub struct BindingRepository {
    pool: PgPool,
}

impl BindingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BindingStore for BindingRepository {
    #[tracing::instrument(skip(self, url), fields(db.operation = "update", db.table = %owner.kind.table(), owner_key = %owner.key))]
    async fn bind_image_url(&self, owner: &OwnerReference, url: &str) -> Result<(), BindingError> {
        // Table and column names cannot be bound; they are fixed per owner
        // kind, so each kind gets its own static statement.
        let query = match owner.kind {
            OwnerKind::UserProfile | OwnerKind::ChildProfile => {
                "UPDATE profiles SET avatar_url = $1, updated_at = NOW() WHERE id = $2"
            }
            OwnerKind::VocabularyItem => {
                "UPDATE vocabulary_items SET image_url = $1, updated_at = NOW() WHERE id = $2"
            }
        };

        let result = sqlx::query(query)
            .bind(url)
            .bind(&owner.key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, owner = %owner, "binding update failed");
                BindingError::Database(e.to_string())
            })?;

        if result.rows_affected() == 0 {
            return Err(BindingError::NotFound(owner.to_string()));
        }

        tracing::info!(owner = %owner, "image URL bound");
        Ok(())
    }

    async fn fetch_bound_url(
        &self,
        owner: &OwnerReference,
    ) -> Result<Option<String>, BindingError> {
        let query = match owner.kind {
            OwnerKind::UserProfile | OwnerKind::ChildProfile => {
                "SELECT avatar_url FROM profiles WHERE id = $1"
            }
            OwnerKind::VocabularyItem => {
                "SELECT image_url FROM vocabulary_items WHERE id = $1"
            }
        };

        let row: Option<Option<String>> = sqlx::query_scalar(query)
            .bind(&owner.key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BindingError::Database(e.to_string()))?;

        match row {
            Some(url) => Ok(url),
            None => Err(BindingError::NotFound(owner.to_string())),
        }
    }
}
