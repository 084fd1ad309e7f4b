//! Account Model
//!
//! 账户按角色区分为带标签的联合类型，角色专属字段只存在于对应变体中。

use crate::order::RiderOrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account role tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Vendor,
    Rider,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Customer => "CUSTOMER",
            Role::Vendor => "VENDOR",
            Role::Rider => "RIDER",
            Role::Admin => "ADMIN",
        };
        f.write_str(s)
    }
}

/// Payout destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankDetails {
    pub account_holder: String,
    pub account_number: String,
    pub ifsc: String,
    pub bank_name: String,
}

/// Account record, tagged by `role`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Account {
    Customer(CustomerProfile),
    Vendor(VendorProfile),
    Rider(RiderProfile),
    Admin(AdminProfile),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminProfile {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub wallet: VendorWallet,
    #[serde(default)]
    pub bank: Option<BankDetails>,
    pub created_at: i64,
}

/// 商家钱包
///
/// `wallet_balance` 只会因在线支付的订单增加，现金订单只计入 `total_earnings`。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VendorWallet {
    /// 全部已结算收入（现金 + 在线，已扣佣金）
    pub total_earnings: Decimal,
    /// 可提现余额（仅在线部分）
    pub wallet_balance: Decimal,
    pub online_earnings: Decimal,
    pub total_withdrawn: Decimal,
    /// 累计超时罚款
    pub total_late_fees: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiderProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_online: bool,
    /// 空闲 ⇔ 当前没有配送中的订单
    #[serde(default = "default_true")]
    pub is_available: bool,
    /// Back-reference only, the order owns the assignment
    #[serde(default)]
    pub current_order_id: Option<String>,
    #[serde(default)]
    pub current_order_status: Option<RiderOrderStatus>,
    #[serde(default)]
    pub wallet_balance: Decimal,
    #[serde(default)]
    pub total_earnings: Decimal,
    #[serde(default)]
    pub total_withdrawn: Decimal,
    #[serde(default)]
    pub total_deliveries: u32,
    #[serde(default)]
    pub total_cancellations: u32,
    /// Running mean of delivery ratings
    #[serde(default = "default_rating")]
    pub average_rating: f64,
    #[serde(default)]
    pub bank: Option<BankDetails>,
    pub created_at: i64,
}

fn default_true() -> bool {
    true
}

/// New riders start with a perfect rating
pub const DEFAULT_RIDER_RATING: f64 = 5.0;

fn default_rating() -> f64 {
    DEFAULT_RIDER_RATING
}

impl RiderProfile {
    /// Online and not holding an order
    pub fn is_idle(&self) -> bool {
        self.is_online && self.is_available && self.current_order_id.is_none()
    }
}

impl Account {
    pub fn id(&self) -> &str {
        match self {
            Account::Customer(p) => &p.id,
            Account::Vendor(p) => &p.id,
            Account::Rider(p) => &p.id,
            Account::Admin(p) => &p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Account::Customer(p) => &p.name,
            Account::Vendor(p) => &p.name,
            Account::Rider(p) => &p.name,
            Account::Admin(p) => &p.name,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Account::Customer(_) => Role::Customer,
            Account::Vendor(_) => Role::Vendor,
            Account::Rider(_) => Role::Rider,
            Account::Admin(_) => Role::Admin,
        }
    }

    pub fn as_vendor(&self) -> Option<&VendorProfile> {
        match self {
            Account::Vendor(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vendor_mut(&mut self) -> Option<&mut VendorProfile> {
        match self {
            Account::Vendor(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_rider(&self) -> Option<&RiderProfile> {
        match self {
            Account::Rider(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_rider_mut(&mut self) -> Option<&mut RiderProfile> {
        match self {
            Account::Rider(r) => Some(r),
            _ => None,
        }
    }

    /// Bank details (vendors and riders only)
    pub fn bank(&self) -> Option<&BankDetails> {
        match self {
            Account::Vendor(v) => v.bank.as_ref(),
            Account::Rider(r) => r.bank.as_ref(),
            _ => None,
        }
    }
}

/// Register account payload (administrative seeding)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountCreate {
    Customer {
        #[serde(default)]
        id: Option<String>,
        name: String,
        email: String,
    },
    Vendor {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        bank: Option<BankDetails>,
    },
    Rider {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        bank: Option<BankDetails>,
    },
    Admin {
        #[serde(default)]
        id: Option<String>,
        name: String,
    },
}

/// Presence update payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub is_online: bool,
}
