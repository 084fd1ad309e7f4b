//! Shared harness for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use fulfillment_server::accounts::AccountsService;
use fulfillment_server::deadline::PreparationDeadlineMonitor;
use fulfillment_server::notify::RecordingSink;
use fulfillment_server::payment::HmacPaymentVerifier;
use fulfillment_server::{LedgerStorage, OrdersManager};
use rust_decimal::Decimal;
use shared::models::{AccountCreate, BankDetails, ProductUpsert, RiderProfile, VendorProfile};
use shared::order::{CreateOrderRequest, Order, OrderItemInput, PaymentMethod, PaymentProof};
use tempfile::TempDir;

pub const WEBHOOK_SECRET: &str = "integration-secret";

pub struct Harness {
    pub manager: OrdersManager,
    pub accounts: AccountsService,
    pub storage: LedgerStorage,
    pub sink: Arc<RecordingSink>,
    pub verifier: Arc<HmacPaymentVerifier>,
}

impl Harness {
    /// Wire every service over an existing ledger
    pub fn over(storage: LedgerStorage) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let verifier = Arc::new(HmacPaymentVerifier::new(WEBHOOK_SECRET));
        let deadlines = PreparationDeadlineMonitor::new(storage.clone(), sink.clone());
        let manager =
            OrdersManager::new(storage.clone(), sink.clone(), verifier.clone(), deadlines);
        Self {
            manager,
            accounts: AccountsService::new(storage.clone()),
            storage,
            sink,
            verifier,
        }
    }

    pub fn in_memory() -> Self {
        Self::over(LedgerStorage::open_in_memory().unwrap())
    }

    pub fn customer(&self, id: &str) {
        self.accounts
            .register_account(AccountCreate::Customer {
                id: Some(id.to_string()),
                name: format!("Customer {}", id),
                email: format!("{}@example.com", id),
            })
            .unwrap();
    }

    pub fn vendor(&self, id: &str) {
        self.accounts
            .register_account(AccountCreate::Vendor {
                id: Some(id.to_string()),
                name: format!("Kitchen {}", id),
                bank: Some(bank(id)),
            })
            .unwrap();
        self.accounts.set_vendor_online(id, true).unwrap();
    }

    pub fn rider(&self, id: &str) {
        self.accounts
            .register_account(AccountCreate::Rider {
                id: Some(id.to_string()),
                name: format!("Rider {}", id),
                bank: Some(bank(id)),
            })
            .unwrap();
        self.accounts.set_rider_online(id, true).unwrap();
    }

    pub fn product(&self, id: &str, vendor_id: &str, price: i64) {
        self.accounts
            .upsert_product(ProductUpsert {
                id: id.to_string(),
                vendor_id: vendor_id.to_string(),
                name: format!("Dish {}", id),
                price: Decimal::from(price),
                is_available: true,
            })
            .unwrap();
    }

    /// c1 / v1 / p1 @ 100
    pub fn basic_catalog(&self) {
        self.customer("c1");
        self.vendor("v1");
        self.product("p1", "v1", 100);
    }

    /// Provider proof for `amount` under a fresh payment id
    pub fn proof(&self, reference: &str, amount: Decimal) -> PaymentProof {
        let payment_id = format!("pay_{}", reference);
        PaymentProof {
            provider_order_id: reference.to_string(),
            signature: self.verifier.sign(reference, &payment_id, amount).unwrap(),
            payment_id,
            amount,
        }
    }

    /// Catalog total for `items` (subtotal + delivery + platform fee)
    pub fn quote(&self, items: &[(&str, u32)]) -> Decimal {
        let subtotal: Decimal = items
            .iter()
            .map(|(product_id, quantity)| {
                let product = self.storage.get_product(product_id).unwrap().unwrap();
                product.price * Decimal::from(*quantity)
            })
            .sum();
        subtotal + Decimal::from(44)
    }

    pub async fn place(&self, items: &[(&str, u32)], method: PaymentMethod) -> Order {
        let payment_proof = method
            .is_online()
            .then(|| self.proof(&shared::util::uuid_string(), self.quote(items)));
        self.manager
            .create_order(CreateOrderRequest {
                customer_id: "c1".to_string(),
                items: items
                    .iter()
                    .map(|(product_id, quantity)| OrderItemInput {
                        product_id: product_id.to_string(),
                        quantity: *quantity,
                    })
                    .collect(),
                payment_method: method,
                payment_proof,
                client_subtotal: None,
            })
            .await
            .unwrap()
    }

    /// Place, confirm and mark ready an order from v1
    pub async fn ready_order(&self, method: PaymentMethod) -> Order {
        let order = self.place(&[("p1", 2)], method).await;
        self.manager.confirm_order(&order.id, "v1").unwrap();
        self.manager.mark_ready(&order.id, "v1").unwrap()
    }

    pub fn rider_profile(&self, id: &str) -> RiderProfile {
        self.storage
            .get_account(id)
            .unwrap()
            .and_then(|a| a.as_rider().cloned())
            .unwrap()
    }

    pub fn vendor_profile(&self, id: &str) -> VendorProfile {
        self.storage
            .get_account(id)
            .unwrap()
            .and_then(|a| a.as_vendor().cloned())
            .unwrap()
    }
}

pub fn bank(holder: &str) -> BankDetails {
    BankDetails {
        account_holder: holder.to_string(),
        account_number: "000111222333".to_string(),
        ifsc: "TEST0001234".to_string(),
        bank_name: "Test Bank".to_string(),
    }
}

/// File-backed ledger inside a temp dir (dir must outlive the storage)
pub fn file_ledger() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.redb");
    (dir, path)
}
