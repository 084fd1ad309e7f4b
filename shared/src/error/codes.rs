//! 错误码表
//!
//! 错误码在线上以 `u16` 传输，千位决定所属分段（见 [`super::ErrorCategory`]）。
//! 新增错误码只需在下方 `error_codes!` 表中加一行。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 由一张 `名称 = 数值 => 默认消息` 的表生成枚举、消息与 `TryFrom<u16>`
macro_rules! error_codes {
    ($( $(#[$meta:meta])* $name:ident = $value:literal => $message:literal, )+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u16", try_from = "u16")]
        #[repr(u16)]
        pub enum ErrorCode {
            $( $(#[$meta])* $name = $value, )+
        }

        impl ErrorCode {
            pub const ALL: &'static [ErrorCode] = &[$( ErrorCode::$name, )+];

            /// 面向开发者的英文默认消息
            pub const fn message(&self) -> &'static str {
                match self {
                    $( ErrorCode::$name => $message, )+
                }
            }
        }

        impl TryFrom<u16> for ErrorCode {
            type Error = InvalidErrorCode;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(ErrorCode::$name), )+
                    other => Err(InvalidErrorCode(other)),
                }
            }
        }
    };
}

error_codes! {
    Success = 0 => "OK",
    ValidationFailed = 2 => "Request validation failed",
    AlreadyExists = 4 => "Record already exists",

    PermissionDenied = 2001 => "Permission denied",
    /// 账户角色不匹配（如顾客调用骑手接口）
    RoleRequired = 2002 => "Account role does not allow this operation",

    OrderNotFound = 4001 => "Order not found",
    /// 当前状态不允许该操作
    InvalidStateTransition = 4002 => "Operation not allowed in current order status",
    OrderAlreadyDelivered = 4003 => "Order has already been delivered",
    OrderAlreadyCancelled = 4004 => "Order has already been cancelled",
    CustomerNotFound = 4007 => "Customer not found",

    /// 支付签名校验失败
    PaymentFailed = 5001 => "Payment verification failed",
    PaymentProofRequired = 5002 => "Online payment requires a payment proof",
    PaymentProviderUnavailable = 5003 => "Payment provider unavailable",
    /// 同一笔支付不能支撑多个订单
    PaymentAlreadyUsed = 5004 => "Payment has already been used for another order",

    ProductNotFound = 6001 => "Product not found",
    ProductUnavailable = 6002 => "Product is not available",
    VendorNotFound = 6101 => "Vendor not found",
    VendorOffline = 6102 => "Vendor is offline",

    RiderNotFound = 7001 => "Rider not found",
    /// 骑手手上已有订单
    RiderUnavailable = 7002 => "Rider is busy with another order",
    RiderOffline = 7003 => "Rider is offline",
    /// 抢单失败：其他骑手已抢到
    OrderAlreadyClaimed = 7004 => "Order already claimed by another rider",
    ClaimNotHeld = 7005 => "Order is not assigned to this rider",
    AlreadyPickedUp = 7006 => "Order has already been picked up",

    AccountNotFound = 8001 => "Account not found",
    InsufficientBalance = 8002 => "Insufficient balance",
    BelowMinimumWithdrawal = 8003 => "Amount is below the minimum withdrawal",
    WithdrawalNotFound = 8004 => "Withdrawal not found",
    WithdrawalAlreadyProcessed = 8005 => "Withdrawal has already been processed",
    BankDetailsMissing = 8006 => "No bank details on file",

    InternalError = 9001 => "Internal server error",
    /// 账本磁盘已满
    StorageFull = 9401 => "Storage is full",
    OutOfMemory = 9402 => "Out of memory",
    /// 账本文件损坏
    StorageCorrupted = 9403 => "Storage is corrupted",
    /// 瞬时 IO 错误，可重试
    SystemBusy = 9404 => "System busy, retry later",
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// 线上收到了表中不存在的错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error code {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.code(), f)
    }
}
