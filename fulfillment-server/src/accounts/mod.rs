//! Account registry
//!
//! Administrative seeding and presence for the tagged [`Account`] union.
//! The lifecycle components read and write accounts inside their own
//! transactions through the `*_txn` loaders below.

use crate::core::error::{FulfillmentError, FulfillmentResult};
use crate::ledger::LedgerStorage;
use redb::WriteTransaction;
use rust_decimal::Decimal;
use shared::models::{
    Account, AccountCreate, AdminProfile, CustomerProfile, Product, ProductUpsert, RiderProfile,
    Role, VendorProfile, VendorWallet, DEFAULT_RIDER_RATING,
};
use shared::util::{now_millis, prefixed_id};

/// Load a vendor inside a write transaction
pub(crate) fn vendor_txn(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    vendor_id: &str,
) -> FulfillmentResult<VendorProfile> {
    match storage.get_account_txn(txn, vendor_id)? {
        Some(Account::Vendor(v)) => Ok(v),
        Some(_) => Err(FulfillmentError::RoleMismatch {
            account_id: vendor_id.to_string(),
            expected: Role::Vendor,
        }),
        None => Err(FulfillmentError::VendorNotFound(vendor_id.to_string())),
    }
}

/// Load a rider inside a write transaction
pub(crate) fn rider_txn(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    rider_id: &str,
) -> FulfillmentResult<RiderProfile> {
    match storage.get_account_txn(txn, rider_id)? {
        Some(Account::Rider(r)) => Ok(r),
        Some(_) => Err(FulfillmentError::RoleMismatch {
            account_id: rider_id.to_string(),
            expected: Role::Rider,
        }),
        None => Err(FulfillmentError::RiderNotFound(rider_id.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct AccountsService {
    storage: LedgerStorage,
}

impl AccountsService {
    pub fn new(storage: LedgerStorage) -> Self {
        Self { storage }
    }

    /// Register a new account, generating an id when none is given
    pub fn register_account(&self, input: AccountCreate) -> FulfillmentResult<Account> {
        let now = now_millis();
        let account = match input {
            AccountCreate::Customer { id, name, email } => Account::Customer(CustomerProfile {
                id: id.unwrap_or_else(|| prefixed_id("cus")),
                name,
                email,
                created_at: now,
            }),
            AccountCreate::Vendor { id, name, bank } => Account::Vendor(VendorProfile {
                id: id.unwrap_or_else(|| prefixed_id("ven")),
                name,
                is_online: false,
                wallet: VendorWallet::default(),
                bank,
                created_at: now,
            }),
            AccountCreate::Rider { id, name, bank } => Account::Rider(RiderProfile {
                id: id.unwrap_or_else(|| prefixed_id("rdr")),
                name,
                is_online: false,
                is_available: true,
                current_order_id: None,
                current_order_status: None,
                wallet_balance: Decimal::ZERO,
                total_earnings: Decimal::ZERO,
                total_withdrawn: Decimal::ZERO,
                total_deliveries: 0,
                total_cancellations: 0,
                average_rating: DEFAULT_RIDER_RATING,
                bank,
                created_at: now,
            }),
            AccountCreate::Admin { id, name } => Account::Admin(AdminProfile {
                id: id.unwrap_or_else(|| prefixed_id("adm")),
                name,
                created_at: now,
            }),
        };

        if account.name().trim().is_empty() {
            return Err(FulfillmentError::Validation("name must not be empty".into()));
        }

        let txn = self.storage.begin_write()?;
        if self.storage.get_account_txn(&txn, account.id())?.is_some() {
            return Err(FulfillmentError::AccountExists(account.id().to_string()));
        }
        self.storage.put_account(&txn, &account)?;
        txn.commit()?;

        tracing::info!(account_id = %account.id(), role = %account.role(), "Account registered");
        Ok(account)
    }

    pub fn get_account(&self, account_id: &str) -> FulfillmentResult<Account> {
        self.storage
            .get_account(account_id)?
            .ok_or_else(|| FulfillmentError::AccountNotFound(account_id.to_string()))
    }

    pub fn set_vendor_online(&self, vendor_id: &str, is_online: bool) -> FulfillmentResult<VendorProfile> {
        let txn = self.storage.begin_write()?;
        let mut vendor = vendor_txn(&self.storage, &txn, vendor_id)?;
        vendor.is_online = is_online;
        self.storage.put_account(&txn, &Account::Vendor(vendor.clone()))?;
        txn.commit()?;

        tracing::info!(vendor_id = %vendor_id, is_online, "Vendor presence updated");
        Ok(vendor)
    }

    /// Going offline while holding an order is rejected
    pub fn set_rider_online(&self, rider_id: &str, is_online: bool) -> FulfillmentResult<RiderProfile> {
        let txn = self.storage.begin_write()?;
        let mut rider = rider_txn(&self.storage, &txn, rider_id)?;
        if !is_online && rider.current_order_id.is_some() {
            return Err(FulfillmentError::RiderBusy(rider_id.to_string()));
        }
        rider.is_online = is_online;
        self.storage.put_account(&txn, &Account::Rider(rider.clone()))?;
        txn.commit()?;

        tracing::info!(rider_id = %rider_id, is_online, "Rider presence updated");
        Ok(rider)
    }

    /// Create or replace a catalog product
    pub fn upsert_product(&self, input: ProductUpsert) -> FulfillmentResult<Product> {
        if input.price <= Decimal::ZERO {
            return Err(FulfillmentError::Validation(format!(
                "price must be positive, got {}",
                input.price
            )));
        }
        if input.id.trim().is_empty() || input.name.trim().is_empty() {
            return Err(FulfillmentError::Validation("product id and name are required".into()));
        }

        let txn = self.storage.begin_write()?;
        vendor_txn(&self.storage, &txn, &input.vendor_id)?;
        let product = Product {
            id: input.id,
            vendor_id: input.vendor_id,
            name: input.name,
            price: input.price,
            is_available: input.is_available,
            updated_at: now_millis(),
        };
        self.storage.put_product(&txn, &product)?;
        txn.commit()?;

        tracing::debug!(product_id = %product.id, price = %product.price, "Product upserted");
        Ok(product)
    }
}
