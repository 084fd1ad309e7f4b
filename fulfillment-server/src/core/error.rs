//! 业务错误定义
//!
//! [`FulfillmentError`] 是订单生命周期、抢单、结算和提现共用的领域错误，
//! 在 HTTP 边界通过 `From<FulfillmentError> for AppError` 转换为统一错误码。

use crate::ledger::StorageError;
use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::Role;
use shared::order::OrderStatus;
use thiserror::Error;

/// 领域错误
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // ========== NotFound ==========
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Vendor not found: {0}")]
    VendorNotFound(String),

    #[error("Rider not found: {0}")]
    RiderNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    // ========== State machine ==========
    #[error("Cannot {operation} order {order_id} in status {from}")]
    InvalidStateTransition {
        order_id: String,
        from: OrderStatus,
        operation: &'static str,
    },

    #[error("Order {0} already claimed by another rider")]
    AlreadyClaimed(String),

    #[error("Order {0} already delivered")]
    AlreadyDelivered(String),

    #[error("Order {0} already picked up")]
    AlreadyPickedUp(String),

    #[error("Order {order_id} is not held by rider {rider_id}")]
    ClaimNotHeld { order_id: String, rider_id: String },

    #[error("Vendor {vendor_id} has no items in order {order_id}")]
    NotOrderVendor { order_id: String, vendor_id: String },

    // ========== Upstream / availability ==========
    #[error("Vendor is offline: {0}")]
    VendorOffline(String),

    #[error("Rider is offline: {0}")]
    RiderOffline(String),

    #[error("Rider {0} is busy with another order")]
    RiderBusy(String),

    #[error("Product is unavailable: {0}")]
    ProductUnavailable(String),

    #[error("Account {account_id} is not a {expected}")]
    RoleMismatch { account_id: String, expected: Role },

    /// 只有商家和骑手有可提现余额
    #[error("{role} account {account_id} cannot withdraw")]
    WithdrawalNotAllowed { account_id: String, role: Role },

    // ========== Payment ==========
    #[error("Online payment requires a payment proof")]
    PaymentProofRequired,

    #[error("Payment verification failed: {0}")]
    PaymentVerificationFailed(String),

    #[error("Payment provider unavailable: {0}")]
    PaymentUnavailable(String),

    #[error("Payment {payment_id} already paid for order {order_id}")]
    PaymentAlreadyUsed { payment_id: String, order_id: String },

    // ========== Wallet ==========
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Amount {requested} is below the minimum withdrawal {minimum}")]
    BelowMinimumWithdrawal { requested: Decimal, minimum: Decimal },

    #[error("No bank details on file for account {0}")]
    BankDetailsMissing(String),

    #[error("Withdrawal {0} has already been processed")]
    WithdrawalAlreadyProcessed(String),

    // ========== Validation ==========
    #[error("{0}")]
    Validation(String),
}

pub type FulfillmentResult<T> = Result<T, FulfillmentError>;

// 事务提交错误直接经 StorageError 归类
impl From<redb::CommitError> for FulfillmentError {
    fn from(e: redb::CommitError) -> Self {
        Self::Storage(e.into())
    }
}

/// 将存储错误转换为错误码
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    if matches!(e, StorageError::Serialization(_)) {
        return ErrorCode::InternalError;
    }

    // redb 错误通过字符串匹配分类
    let err_str = e.to_string().to_lowercase();

    // 磁盘空间不足
    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    // 内存不足
    if err_str.contains("out of memory") || err_str.contains("cannot allocate") {
        return ErrorCode::OutOfMemory;
    }

    // 数据损坏
    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    // 默认：系统繁忙
    ErrorCode::SystemBusy
}

impl FulfillmentError {
    /// Stable error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Storage(e) => classify_storage_error(e),
            Self::OrderNotFound(_) => ErrorCode::OrderNotFound,
            Self::AccountNotFound(_) => ErrorCode::AccountNotFound,
            Self::CustomerNotFound(_) => ErrorCode::CustomerNotFound,
            Self::VendorNotFound(_) => ErrorCode::VendorNotFound,
            Self::RiderNotFound(_) => ErrorCode::RiderNotFound,
            Self::ProductNotFound(_) => ErrorCode::ProductNotFound,
            Self::WithdrawalNotFound(_) => ErrorCode::WithdrawalNotFound,
            Self::AccountExists(_) => ErrorCode::AlreadyExists,
            Self::InvalidStateTransition { from, .. } => match from {
                OrderStatus::Delivered => ErrorCode::OrderAlreadyDelivered,
                OrderStatus::Cancelled => ErrorCode::OrderAlreadyCancelled,
                _ => ErrorCode::InvalidStateTransition,
            },
            Self::AlreadyClaimed(_) => ErrorCode::OrderAlreadyClaimed,
            Self::AlreadyDelivered(_) => ErrorCode::OrderAlreadyDelivered,
            Self::AlreadyPickedUp(_) => ErrorCode::AlreadyPickedUp,
            Self::ClaimNotHeld { .. } => ErrorCode::ClaimNotHeld,
            Self::NotOrderVendor { .. } => ErrorCode::PermissionDenied,
            Self::VendorOffline(_) => ErrorCode::VendorOffline,
            Self::RiderOffline(_) => ErrorCode::RiderOffline,
            Self::RiderBusy(_) => ErrorCode::RiderUnavailable,
            Self::ProductUnavailable(_) => ErrorCode::ProductUnavailable,
            Self::RoleMismatch { .. } | Self::WithdrawalNotAllowed { .. } => ErrorCode::RoleRequired,
            Self::PaymentProofRequired => ErrorCode::PaymentProofRequired,
            Self::PaymentVerificationFailed(_) => ErrorCode::PaymentFailed,
            Self::PaymentUnavailable(_) => ErrorCode::PaymentProviderUnavailable,
            Self::PaymentAlreadyUsed { .. } => ErrorCode::PaymentAlreadyUsed,
            Self::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            Self::BelowMinimumWithdrawal { .. } => ErrorCode::BelowMinimumWithdrawal,
            Self::BankDetailsMissing(_) => ErrorCode::BankDetailsMissing,
            Self::WithdrawalAlreadyProcessed(_) => ErrorCode::WithdrawalAlreadyProcessed,
            Self::Validation(_) => ErrorCode::ValidationFailed,
        }
    }
}

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        let code = err.code();
        match err {
            FulfillmentError::Storage(e) => {
                tracing::error!(error = %e, error_code = %code, "Storage error occurred");
                // 保留技术细节用于日志，响应只给出错误码的默认信息
                AppError::new(code)
            }
            FulfillmentError::InvalidStateTransition {
                ref order_id,
                from,
                operation,
            } => AppError::with_message(code, err.to_string())
                .with_detail("order_id", order_id.as_str())
                .with_detail("status", from.as_str())
                .with_detail("operation", operation),
            FulfillmentError::InsufficientBalance {
                requested,
                available,
            } => AppError::with_message(code, err.to_string())
                .with_detail("requested", requested.to_string())
                .with_detail("available", available.to_string()),
            other => AppError::with_message(code, other.to_string()),
        }
    }
}
