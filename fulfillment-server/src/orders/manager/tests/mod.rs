use super::*;
use crate::accounts::AccountsService;
use crate::notify::RecordingSink;
use crate::payment::HmacPaymentVerifier;
use rust_decimal::Decimal;
use shared::models::{AccountCreate, ProductUpsert, RiderProfile, VendorWallet};
use shared::order::{OrderItemInput, PaymentProof};

mod test_lifecycle;
mod test_settlement;

const WEBHOOK_SECRET: &str = "test-webhook-secret";

struct TestEnv {
    manager: OrdersManager,
    accounts: AccountsService,
    storage: LedgerStorage,
    sink: Arc<RecordingSink>,
    verifier: Arc<HmacPaymentVerifier>,
}

fn create_test_manager() -> TestEnv {
    let storage = LedgerStorage::open_in_memory().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let verifier = Arc::new(HmacPaymentVerifier::new(WEBHOOK_SECRET));
    let deadlines = PreparationDeadlineMonitor::new(storage.clone(), sink.clone());
    let manager = OrdersManager::new(storage.clone(), sink.clone(), verifier.clone(), deadlines);
    TestEnv {
        manager,
        accounts: AccountsService::new(storage.clone()),
        storage,
        sink,
        verifier,
    }
}

// ========================================================================
// Seeding helpers
// ========================================================================

impl TestEnv {
    fn customer(&self, id: &str) {
        self.accounts
            .register_account(AccountCreate::Customer {
                id: Some(id.to_string()),
                name: format!("Customer {}", id),
                email: format!("{}@example.com", id),
            })
            .unwrap();
    }

    /// Online vendor
    fn vendor(&self, id: &str) {
        self.accounts
            .register_account(AccountCreate::Vendor {
                id: Some(id.to_string()),
                name: format!("Kitchen {}", id),
                bank: None,
            })
            .unwrap();
        self.accounts.set_vendor_online(id, true).unwrap();
    }

    /// Online, idle rider
    fn rider(&self, id: &str) {
        self.accounts
            .register_account(AccountCreate::Rider {
                id: Some(id.to_string()),
                name: format!("Rider {}", id),
                bank: None,
            })
            .unwrap();
        self.accounts.set_rider_online(id, true).unwrap();
    }

    fn product(&self, id: &str, vendor_id: &str, price: i64) {
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

    /// c1, v1 with p1 @ 100
    fn basic_catalog(&self) {
        self.customer("c1");
        self.vendor("v1");
        self.product("p1", "v1", 100);
    }

    /// Signed proof for `amount` under a fresh payment id
    fn proof(&self, amount: Decimal) -> PaymentProof {
        let reference = uuid_string();
        let payment_id = format!("pay_{}", reference);
        PaymentProof {
            signature: self.verifier.sign(&reference, &payment_id, amount).unwrap(),
            provider_order_id: reference,
            payment_id,
            amount,
        }
    }

    /// Catalog total the server will compute for `items`
    fn quote(&self, items: &[(&str, u32)]) -> Decimal {
        let subtotal: Decimal = items
            .iter()
            .map(|(product_id, quantity)| {
                self.storage.get_product(product_id).unwrap().unwrap().price
                    * Decimal::from(*quantity)
            })
            .sum();
        order_total(subtotal)
    }

    async fn place(&self, items: Vec<(&str, u32)>, method: PaymentMethod) -> Order {
        let payment_proof = method.is_online().then(|| self.proof(self.quote(&items)));
        self.manager
            .create_order(CreateOrderRequest {
                customer_id: "c1".into(),
                items: items
                    .into_iter()
                    .map(|(product_id, quantity)| OrderItemInput {
                        product_id: product_id.to_string(),
                        quantity,
                    })
                    .collect(),
                payment_method: method,
                payment_proof,
                client_subtotal: None,
            })
            .await
            .unwrap()
    }

    /// Place + confirm + ready for a single-vendor order
    async fn ready_order(&self, items: Vec<(&str, u32)>, method: PaymentMethod) -> Order {
        let order = self.place(items, method).await;
        let vendor = order.vendor_ids()[0].clone();
        self.manager.confirm_order(&order.id, &vendor).unwrap();
        self.manager.mark_ready(&order.id, &vendor).unwrap()
    }

    fn rider_profile(&self, id: &str) -> RiderProfile {
        self.storage
            .get_account(id)
            .unwrap()
            .unwrap()
            .as_rider()
            .unwrap()
            .clone()
    }

    fn wallet(&self, vendor_id: &str) -> VendorWallet {
        self.storage
            .get_account(vendor_id)
            .unwrap()
            .unwrap()
            .as_vendor()
            .unwrap()
            .wallet
            .clone()
    }
}
