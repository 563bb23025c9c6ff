//! Back-office use cases.

use common::EntityId;
use domain::{DomainError, Entity};
use futures_util::future::BoxFuture;
use persistence::{Result, StorageDriver};
use unit_of_work::{TransactionManager, UnitOfWork};

use crate::account::Account;
use crate::delivery::Delivery;
use crate::load;
use crate::product::Product;
use crate::record::BackofficeRecord;
use crate::sale::{Sale, SaleLine};

/// Service exposing one transactional method per back-office operation.
///
/// Every method runs in its own unit of work: the aggregate is loaded,
/// mutated in memory, saved (which also runs any handlers) and committed.
/// Any error rolls the whole operation back.
pub struct BackofficeService<D: StorageDriver> {
    manager: TransactionManager<D, BackofficeRecord>,
}

impl<D: StorageDriver> BackofficeService<D> {
    pub fn new(manager: TransactionManager<D, BackofficeRecord>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &TransactionManager<D, BackofficeRecord> {
        &self.manager
    }

    /// Opens a new account and returns its id.
    #[tracing::instrument(skip(self))]
    pub async fn open_account(&self, email: String) -> Result<EntityId> {
        let mut account = Account::open(EntityId::new(), email)?;
        let id = *account.id();
        self.execute("open_account", move |uow| {
            Box::pin(async move { uow.save(&mut account).await })
        })
        .await?;
        Ok(id)
    }

    /// Grants a permission. Returns false if the account already had it.
    #[tracing::instrument(skip(self))]
    pub async fn grant_permission(&self, account_id: EntityId, permission: String) -> Result<bool> {
        self.execute("grant_permission", move |uow| {
            Box::pin(async move {
                let mut account = load::account(uow, account_id).await?;
                let granted = account.grant_permission(permission)?;
                uow.save(&mut account).await?;
                Ok(granted)
            })
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn archive_account(&self, account_id: EntityId) -> Result<()> {
        self.execute("archive_account", move |uow| {
            Box::pin(async move {
                let mut account = load::account(uow, account_id).await?;
                account.archive()?;
                uow.save(&mut account).await
            })
        })
        .await
    }

    /// Registers a product and returns its id.
    #[tracing::instrument(skip(self))]
    pub async fn register_product(
        &self,
        sku: String,
        name: String,
        initial_stock: u64,
    ) -> Result<EntityId> {
        let mut product = Product::register(EntityId::new(), sku, name, initial_stock)?;
        let id = *product.id();
        self.execute("register_product", move |uow| {
            Box::pin(async move { uow.save(&mut product).await })
        })
        .await?;
        Ok(id)
    }

    /// Adjusts stock by hand and returns the new level.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(&self, product_id: EntityId, delta: i64, reason: String) -> Result<u64> {
        self.execute("adjust_stock", move |uow| {
            Box::pin(async move {
                let mut product = load::product(uow, product_id).await?;
                product.adjust_stock(delta, reason)?;
                uow.save(&mut product).await?;
                Ok(product.stock())
            })
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn archive_product(&self, product_id: EntityId) -> Result<()> {
        self.execute("archive_product", move |uow| {
            Box::pin(async move {
                let mut product = load::product(uow, product_id).await?;
                product.archive()?;
                uow.save(&mut product).await
            })
        })
        .await
    }

    /// Schedules a delivery of `(product, expected quantity)` lines.
    ///
    /// Every product must exist.
    #[tracing::instrument(skip(self))]
    pub async fn schedule_delivery(
        &self,
        supplier: String,
        lines: Vec<(EntityId, u32)>,
    ) -> Result<EntityId> {
        let mut delivery = Delivery::schedule(EntityId::new(), supplier, lines)?;
        let id = *delivery.id();
        self.execute("schedule_delivery", move |uow| {
            Box::pin(async move {
                for item in delivery.items() {
                    load::product(uow, item.product_id).await?;
                }
                uow.save(&mut delivery).await
            })
        })
        .await?;
        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn receive_delivery_item(
        &self,
        delivery_id: EntityId,
        line: u32,
        quantity: u32,
    ) -> Result<()> {
        self.execute("receive_delivery_item", move |uow| {
            Box::pin(async move {
                let mut delivery = load::delivery(uow, delivery_id).await?;
                delivery.receive_item(line, quantity)?;
                uow.save(&mut delivery).await
            })
        })
        .await
    }

    /// Completes a delivery; received quantities are added to stock in the
    /// same transaction.
    #[tracing::instrument(skip(self))]
    pub async fn complete_delivery(&self, delivery_id: EntityId) -> Result<()> {
        self.execute("complete_delivery", move |uow| {
            Box::pin(async move {
                let mut delivery = load::delivery(uow, delivery_id).await?;
                delivery.complete()?;
                uow.save(&mut delivery).await
            })
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_delivery(&self, delivery_id: EntityId) -> Result<()> {
        self.execute("cancel_delivery", move |uow| {
            Box::pin(async move {
                let mut delivery = load::delivery(uow, delivery_id).await?;
                delivery.cancel()?;
                uow.save(&mut delivery).await
            })
        })
        .await
    }

    /// Records a sale for an active account; sold quantities leave stock in
    /// the same transaction.
    #[tracing::instrument(skip(self))]
    pub async fn record_sale(&self, account_id: EntityId, lines: Vec<SaleLine>) -> Result<EntityId> {
        let mut sale = Sale::record(EntityId::new(), account_id, lines)?;
        let id = *sale.id();
        self.execute("record_sale", move |uow| {
            Box::pin(async move {
                let account = load::account(uow, account_id).await?;
                if account.is_archived() {
                    return Err(DomainError::conflict(format!(
                        "account {account_id} is archived"
                    ))
                    .into());
                }
                uow.save(&mut sale).await
            })
        })
        .await?;
        Ok(id)
    }

    pub async fn account(&self, id: EntityId) -> Result<Account> {
        self.execute("get_account", move |uow| {
            Box::pin(async move { load::account(uow, id).await })
        })
        .await
    }

    pub async fn product(&self, id: EntityId) -> Result<Product> {
        self.execute("get_product", move |uow| {
            Box::pin(async move { load::product(uow, id).await })
        })
        .await
    }

    pub async fn delivery(&self, id: EntityId) -> Result<Delivery> {
        self.execute("get_delivery", move |uow| {
            Box::pin(async move { load::delivery(uow, id).await })
        })
        .await
    }

    pub async fn sale(&self, id: EntityId) -> Result<Sale> {
        self.execute("get_sale", move |uow| {
            Box::pin(async move { load::sale(uow, id).await })
        })
        .await
    }

    async fn execute<T, F>(&self, operation: &'static str, work: F) -> Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut UnitOfWork<D, BackofficeRecord>) -> BoxFuture<'a, Result<T>>
            + Send,
    {
        let result = self.manager.run(work).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(error) => {
                tracing::debug!(operation, %error, category = ?error.category(), "operation failed");
                "error"
            }
        };
        metrics::counter!("backoffice_operations_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        result
    }
}
