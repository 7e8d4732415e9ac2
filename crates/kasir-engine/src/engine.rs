//! # Engine Handle
//!
//! [`Engine`] owns the injected [`Database`] and the configuration. The
//! operations themselves live next to their subject:
//!
//! - [`crate::checkout`] - checkout, hold, held orders
//! - [`crate::status`] - status transitions, delete
//! - [`crate::inventory`] - manual movements and stock reports
//!
//! ```rust,ignore
//! let db = Database::new(config.db_config()).await?;
//! let (worker, outbox) = OutboxWorker::new(db.clone(), config.outbox.clone(), accounting, activity);
//! tokio::spawn(worker.run());
//!
//! let engine = Engine::new(db, config).with_outbox(outbox);
//! let receipt = engine.checkout(&ctx, request).await?;
//! ```

use std::sync::Arc;

use kasir_core::validation::validate_date_range;
use kasir_core::{Outlet, Transaction, TransactionDetail};
use kasir_db::{Database, TransactionFilter};

use crate::config::EngineConfig;
use crate::context::TenantContext;
use crate::error::{EngineError, EngineResult};
use crate::worker::OutboxWorkerHandle;

/// The checkout and inventory engine.
///
/// Cheap to clone; clones share the pool and configuration.
#[derive(Clone)]
pub struct Engine {
    pub(crate) db: Database,
    pub(crate) config: Arc<EngineConfig>,
    outbox: Option<OutboxWorkerHandle>,
}

impl Engine {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Engine {
            db,
            config: Arc::new(config),
            outbox: None,
        }
    }

    /// Wakes this worker after every commit that queued outbox events.
    pub fn with_outbox(mut self, handle: OutboxWorkerHandle) -> Self {
        self.outbox = Some(handle);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loads a transaction with its lines and payments, if the caller's
    /// tenant owns it.
    pub async fn transaction(
        &self,
        ctx: &TenantContext,
        id: &str,
    ) -> EngineResult<TransactionDetail> {
        let detail = self
            .db
            .transactions()
            .get_detail(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Transaction", id))?;

        self.authorize_outlet(ctx, &detail.transaction.outlet_id).await?;
        Ok(detail)
    }

    /// Lists the tenant's transactions, newest first.
    ///
    /// Cashiers only see their own sales whatever `cashier_id` says; owners
    /// and managers may list anyone's.
    pub async fn list_transactions(
        &self,
        ctx: &TenantContext,
        mut filter: TransactionFilter,
    ) -> EngineResult<Vec<Transaction>> {
        validate_date_range(filter.from, filter.to)?;
        if let Some(outlet_id) = &filter.outlet_id {
            self.authorize_outlet(ctx, outlet_id).await?;
        }
        if !ctx.role.is_privileged() {
            filter.cashier_id = Some(ctx.user_id.clone());
        }

        Ok(self.db.transactions().list(&ctx.tenant_id, &filter).await?)
    }

    /// Checks that `outlet_id` exists and belongs to the caller's tenant.
    pub(crate) async fn authorize_outlet(
        &self,
        ctx: &TenantContext,
        outlet_id: &str,
    ) -> EngineResult<Outlet> {
        let outlet = self
            .db
            .catalog()
            .get_outlet(outlet_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Outlet", outlet_id))?;

        if outlet.tenant_id != ctx.tenant_id {
            return Err(EngineError::access_denied(format!(
                "outlet {} does not belong to tenant {}",
                outlet_id, ctx.tenant_id
            )));
        }

        Ok(outlet)
    }

    /// Loads a transaction header the caller's tenant owns.
    pub(crate) async fn owned_transaction(
        &self,
        ctx: &TenantContext,
        id: &str,
    ) -> EngineResult<Transaction> {
        let trx = self
            .db
            .transactions()
            .get_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Transaction", id))?;

        self.authorize_outlet(ctx, &trx.outlet_id).await?;
        Ok(trx)
    }

    /// Non-blocking; a no-op without a worker.
    pub(crate) fn nudge_outbox(&self) {
        if let Some(handle) = &self.outbox {
            handle.nudge();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{CheckoutRequest, HoldRequest};
    use crate::error::ErrorCode;
    use crate::test_support::{cash, fixture};
    use kasir_core::{CartLine, OrderType, TransactionStatus};

    #[tokio::test]
    async fn test_list_transactions_scopes_cashiers_to_their_own() {
        let f = fixture().await;
        f.item("nasi", 25_000, 10).await;

        let request = CheckoutRequest::new("o1", OrderType::DineIn)
            .with_line(CartLine::new("nasi", 1))
            .with_payment(cash(25_000));
        let sale = f.engine.checkout(&f.cashier, request).await.unwrap();
        let held = f
            .engine
            .hold(
                &f.manager,
                HoldRequest {
                    outlet_id: "o1".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let everyone = TransactionFilter::default();
        let mine = f.engine.list_transactions(&f.cashier, everyone.clone()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, sale.transaction().id);

        let all = f.engine.list_transactions(&f.manager, everyone).await.unwrap();
        assert_eq!(all.len(), 2);

        let pending = TransactionFilter {
            outlet_id: Some("o1".to_string()),
            status: Some(TransactionStatus::Pending),
            ..Default::default()
        };
        let rows = f.engine.list_transactions(&f.manager, pending).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, held.id);
    }

    #[tokio::test]
    async fn test_list_transactions_checks() {
        let f = fixture().await;

        let foreign = TransactionFilter {
            outlet_id: Some("o2".to_string()),
            ..Default::default()
        };
        let err = f.engine.list_transactions(&f.manager, foreign).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);

        let now = chrono::Utc::now();
        let backwards = TransactionFilter {
            from: Some(now),
            to: Some(now - chrono::Duration::days(1)),
            ..Default::default()
        };
        let err = f.engine.list_transactions(&f.manager, backwards).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
