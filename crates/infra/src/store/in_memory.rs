use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use stockledger_core::{
    AggregateId, BusinessId, Document, ExpectedVersion, Page, Pagination, VariantId, Versioned,
};
use stockledger_inventory::{
    MovementId, StockKey, StockMovement, Variant, admit, fold_balance, guarded_keys,
};
use stockledger_purchasing::{PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};
use stockledger_sales::{SalesOrder, SalesOrderId, SalesOrderStatus};

use super::{ChangeSet, Committed, DocumentWrite, LedgerStore, StoreError};

#[derive(Debug, Default)]
struct State {
    variants: HashMap<StockKey, Variant>,
    movements: HashMap<StockKey, Vec<StockMovement>>,
    last_sequence: u64,
    purchase_orders: HashMap<(BusinessId, PurchaseOrderId), Versioned<PurchaseOrder>>,
    sales_orders: HashMap<(BusinessId, SalesOrderId), Versioned<SalesOrder>>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A commit holds the single write guard for its
/// whole duration, which serialises every commit scope.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

fn current_version<K, T>(map: &HashMap<K, Versioned<T>>, key: &K) -> u64
where
    K: Eq + core::hash::Hash,
{
    map.get(key).map(|v| v.version).unwrap_or(0)
}

fn balance_of(state: &State, key: &StockKey) -> Result<i64, StoreError> {
    match state.movements.get(key) {
        Some(log) => fold_balance(log).ok_or(StoreError::BalanceOutOfRange(key.1)),
        None => Ok(0),
    }
}

fn check_expected(expected: ExpectedVersion, current: u64) -> Result<(), StoreError> {
    if !expected.matches(current) {
        return Err(StoreError::Conflict(format!(
            "expected {expected:?}, found {current}"
        )));
    }
    Ok(())
}

/// Newest first; ties broken by id so pages are stable.
fn page_of<T, F>(mut docs: Vec<Versioned<T>>, pagination: Pagination, sort_key: F) -> Page<Versioned<T>>
where
    F: Fn(&T) -> (chrono::DateTime<Utc>, AggregateId),
{
    docs.sort_by(|a, b| sort_key(&b.document).cmp(&sort_key(&a.document)));
    let total = docs.len() as u64;
    let items = docs
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit as usize)
        .collect();
    Page::new(items, total, pagination)
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn register_variant(&self, variant: Variant) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let key = (variant.business_id(), variant.id());
        if state.variants.contains_key(&key) {
            return Err(StoreError::Conflict(format!("variant {} already exists", variant.id())));
        }
        if state
            .variants
            .values()
            .any(|v| v.business_id() == variant.business_id() && v.sku() == variant.sku())
        {
            return Err(StoreError::Conflict(format!(
                "sku '{}' is already registered",
                variant.sku()
            )));
        }
        state.variants.insert(key, variant);
        Ok(())
    }

    async fn variant(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>, StoreError> {
        let state = self.read()?;
        Ok(state.variants.get(&(business_id, variant_id)).cloned())
    }

    async fn movements(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.read()?;
        Ok(state
            .movements
            .get(&(business_id, variant_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn balance(&self, business_id: BusinessId, variant_id: VariantId) -> Result<i64, StoreError> {
        let state = self.read()?;
        balance_of(&state, &(business_id, variant_id))
    }

    async fn purchase_order(
        &self,
        business_id: BusinessId,
        id: PurchaseOrderId,
    ) -> Result<Option<Versioned<PurchaseOrder>>, StoreError> {
        let state = self.read()?;
        Ok(state.purchase_orders.get(&(business_id, id)).cloned())
    }

    async fn purchase_orders(
        &self,
        business_id: BusinessId,
        status: Option<PurchaseOrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Versioned<PurchaseOrder>>, StoreError> {
        let state = self.read()?;
        let docs = state
            .purchase_orders
            .iter()
            .filter(|((b, _), v)| *b == business_id && status.is_none_or(|s| v.document.status() == s))
            .map(|(_, v)| v.clone())
            .collect();
        Ok(page_of(docs, pagination, |o| (o.created_at(), o.id_typed().0)))
    }

    async fn sales_order(
        &self,
        business_id: BusinessId,
        id: SalesOrderId,
    ) -> Result<Option<Versioned<SalesOrder>>, StoreError> {
        let state = self.read()?;
        Ok(state.sales_orders.get(&(business_id, id)).cloned())
    }

    async fn sales_orders(
        &self,
        business_id: BusinessId,
        status: Option<SalesOrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Versioned<SalesOrder>>, StoreError> {
        let state = self.read()?;
        let docs = state
            .sales_orders
            .iter()
            .filter(|((b, _), v)| *b == business_id && status.is_none_or(|s| v.document.status() == s))
            .map(|(_, v)| v.clone())
            .collect();
        Ok(page_of(docs, pagination, |o| (o.created_at(), o.id_typed().0)))
    }

    async fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError> {
        changes.ensure_single_business()?;
        let (_, drafts, document) = changes.into_parts();

        let mut state = self.write()?;

        if let Some(draft) = drafts
            .iter()
            .find(|d| !state.variants.contains_key(&(d.business_id(), d.variant_id())))
        {
            return Err(StoreError::UnknownVariant(draft.variant_id()));
        }

        // 1) Version check (nothing is written until every check passed).
        let document_version = match &document {
            Some(DocumentWrite::PurchaseOrder { document, expected }) => {
                let current =
                    current_version(&state.purchase_orders, &(document.business_id(), document.id()));
                check_expected(*expected, current)?;
                Some(current + 1)
            }
            Some(DocumentWrite::SalesOrder { document, expected }) => {
                let current =
                    current_version(&state.sales_orders, &(document.business_id(), document.id()));
                check_expected(*expected, current)?;
                Some(current + 1)
            }
            None => None,
        };

        // 2) Guard admission against opening balances.
        let opening = guarded_keys(&drafts)
            .into_iter()
            .map(|key| balance_of(&state, &key).map(|balance| (key, balance)))
            .collect::<Result<HashMap<StockKey, i64>, _>>()?;
        admit(&opening, &drafts)?;

        // 3) Append movements, then write the document.
        let created_at = Utc::now();
        let mut committed = Vec::with_capacity(drafts.len());
        for draft in drafts {
            state.last_sequence += 1;
            let movement = StockMovement::from_draft(
                draft,
                MovementId::new(AggregateId::new()),
                state.last_sequence,
                created_at,
            );
            state
                .movements
                .entry((movement.business_id, movement.variant_id))
                .or_default()
                .push(movement.clone());
            committed.push(movement);
        }

        if let (Some(write), Some(version)) = (document, document_version) {
            match write {
                DocumentWrite::PurchaseOrder { document, .. } => {
                    state.purchase_orders.insert(
                        (document.business_id(), document.id()),
                        Versioned::new(version, document),
                    );
                }
                DocumentWrite::SalesOrder { document, .. } => {
                    state.sales_orders.insert(
                        (document.business_id(), document.id()),
                        Versioned::new(version, document),
                    );
                }
            }
        }

        Ok(Committed {
            movements: committed,
            document_version,
        })
    }
}
