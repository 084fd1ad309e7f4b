//! 统一错误体系
//!
//! 服务内部用领域错误，到 HTTP 边界转换成 [`AppError`]，
//! 由 [`ApiResponse`] 信封输出 `{code, message, data?, details?}`。
//!
//! ```
//! use shared::error::{ApiResponse, AppError, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::OrderAlreadyClaimed)
//!     .with_detail("order_id", "ord-1");
//! let body = ApiResponse::<()>::error(&err);
//! assert_eq!(body.code, 7004);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult, ErrorDetails};
