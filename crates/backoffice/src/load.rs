//! Loading aggregates through a unit of work.

use common::{EntityId, Identity};
use persistence::{RepositoryExt, Result, StorageDriver};
use unit_of_work::UnitOfWork;

use crate::account::Account;
use crate::delivery::{Delivery, DeliveryItem};
use crate::product::Product;
use crate::record::{
    AccountRecord, BackofficeKind, BackofficeRecord, DeliveryRecord, ProductRecord, SaleRecord,
};
use crate::sale::Sale;

type Uow<D> = UnitOfWork<D, BackofficeRecord>;

pub async fn account<D: StorageDriver>(uow: &mut Uow<D>, id: EntityId) -> Result<Account> {
    let record = uow.repository(BackofficeKind::Account)?.get(&id.key()).await?;
    Ok(Account::from_record(AccountRecord::try_from(record)?))
}

pub async fn product<D: StorageDriver>(uow: &mut Uow<D>, id: EntityId) -> Result<Product> {
    let record = uow.repository(BackofficeKind::Product)?.get(&id.key()).await?;
    Ok(Product::from_record(ProductRecord::try_from(record)?))
}

pub async fn sale<D: StorageDriver>(uow: &mut Uow<D>, id: EntityId) -> Result<Sale> {
    let record = uow.repository(BackofficeKind::Sale)?.get(&id.key()).await?;
    Ok(Sale::from_record(SaleRecord::try_from(record)?))
}

/// Loads a delivery together with all of its lines.
pub async fn delivery<D: StorageDriver>(uow: &mut Uow<D>, id: EntityId) -> Result<Delivery> {
    let record = uow.repository(BackofficeKind::Delivery)?.get(&id.key()).await?;
    let state = DeliveryRecord::try_from(record)?;

    let items_repo = uow.repository(BackofficeKind::DeliveryItem)?;
    let mut items = Vec::with_capacity(state.lines as usize);
    for key in Delivery::item_keys(&state) {
        let item = DeliveryItem::try_from(items_repo.get(&key).await?)?;
        items.push(item);
    }

    Ok(Delivery::from_records(state, items)?)
}
