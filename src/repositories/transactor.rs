use crate::config::TransactorSettings;
use crate::error::{AppError, Result};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::future::Future;
use std::pin::Pin;

/// Future returned by a unit-of-work closure. It may borrow the scope it runs in.
pub type ScopedFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 's>>;

/// An open database transaction that repositories execute against.
///
/// A scope is created by [`Transactor::transact`] and committed or rolled back
/// only there. Work that is already running inside a scope composes further
/// work with [`Scope::transact`], which reuses the same transaction.
pub struct Scope {
    tx: Transaction<'static, Postgres>,
    depth: u32,
}

impl Scope {
    /// Connection bound to this scope's transaction.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Number of nested `transact` calls currently running on this scope.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_nested(&self) -> bool {
        self.depth > 0
    }

    /// Runs `work` inside this scope without committing or rolling back.
    /// Errors propagate untouched to the outermost caller, which aborts the
    /// whole unit of work.
    pub async fn transact<T, F>(&mut self, work: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut Scope) -> ScopedFuture<'s, T> + Send,
        T: Send,
    {
        self.depth += 1;
        let result = work(self).await;
        self.depth -= 1;
        result
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(AppError::from_sqlx)
    }

    async fn rollback(self) {
        if let Err(e) = self.tx.rollback().await {
            tracing::warn!("Rollback failed, connection will be discarded: {}", e);
        }
    }
}

/// Opens atomic units of work against the pool.
#[derive(Clone)]
pub struct Transactor {
    pool: PgPool,
    settings: TransactorSettings,
}

impl Transactor {
    pub fn new(pool: PgPool) -> Self {
        Self::with_settings(pool, TransactorSettings::default())
    }

    pub fn with_settings(pool: PgPool, settings: TransactorSettings) -> Self {
        Self { pool, settings }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn settings(&self) -> TransactorSettings {
        self.settings
    }

    /// Runs `work` in a fresh transaction.
    ///
    /// Commits when `work` succeeds and rolls back when it fails or when the
    /// configured transaction timeout elapses. Dropping the returned future
    /// before completion also rolls back, since an uncommitted sqlx
    /// transaction is rolled back when dropped.
    pub async fn transact<T, F>(&self, work: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut Scope) -> ScopedFuture<'s, T> + Send,
        T: Send,
    {
        let mut scope = self.begin().await?;

        let outcome = tokio::time::timeout(self.settings.transaction_timeout, work(&mut scope)).await;

        match outcome {
            Ok(Ok(value)) => {
                scope.commit().await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "Rolling back unit of work");
                scope.rollback().await;
                Err(err)
            }
            Err(_) => {
                scope.rollback().await;
                Err(AppError::Conflict(format!(
                    "Unit of work did not finish within {} ms",
                    self.settings.transaction_timeout.as_millis()
                )))
            }
        }
    }

    async fn begin(&self) -> Result<Scope> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_sqlx)?;

        // Local to this transaction; the pooled connection keeps its defaults.
        sqlx::query("SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $2, true)")
            .bind(format!("{}ms", self.settings.lock_timeout.as_millis()))
            .bind(format!("{}ms", self.settings.statement_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(AppError::from_sqlx)?;

        Ok(Scope { tx, depth: 0 })
    }
}
