//! 错误码到 HTTP 状态码的映射

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        use ErrorCode::*;
        match self {
            Success => StatusCode::OK,

            ValidationFailed | ProductUnavailable => StatusCode::BAD_REQUEST,

            OrderNotFound | CustomerNotFound | ProductNotFound | VendorNotFound
            | RiderNotFound | AccountNotFound | WithdrawalNotFound => StatusCode::NOT_FOUND,

            // 抢单失败或记录状态已前进
            AlreadyExists | InvalidStateTransition | OrderAlreadyDelivered
            | OrderAlreadyCancelled | OrderAlreadyClaimed | AlreadyPickedUp | RiderUnavailable
            | WithdrawalAlreadyProcessed | PaymentAlreadyUsed => StatusCode::CONFLICT,

            PermissionDenied | RoleRequired | ClaimNotHeld => StatusCode::FORBIDDEN,

            PaymentFailed | PaymentProofRequired => StatusCode::PAYMENT_REQUIRED,

            // 请求合法但违反钱包规则
            InsufficientBalance | BelowMinimumWithdrawal | BankDetailsMissing => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            // 暂时性，客户端可稍后重试
            VendorOffline | RiderOffline | PaymentProviderUnavailable
            | SystemBusy => StatusCode::SERVICE_UNAVAILABLE,

            InternalError | StorageFull | OutOfMemory | StorageCorrupted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
