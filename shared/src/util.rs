//! 时间戳与 ID 生成

use rand::Rng;

/// 当前 UTC 毫秒时间戳，账本中所有时间字段都用它
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 2024-01-01T00:00:00Z
const ID_EPOCH_MS: i64 = 1_704_067_200_000;
const TIMESTAMP_MASK: i64 = (1 << 41) - 1;
const RANDOM_BITS: u32 = 12;

/// 时间有序的 53 位整数：高 41 位为自 [`ID_EPOCH_MS`] 起的毫秒，低 12 位随机。
/// 53 位保证前端 JSON number 不丢精度。
pub fn time_ordered_id() -> i64 {
    let elapsed = (now_millis() - ID_EPOCH_MS) & TIMESTAMP_MASK;
    let salt = rand::thread_rng().gen_range(0..(1_i64 << RANDOM_BITS));
    (elapsed << RANDOM_BITS) | salt
}

/// 账户与提现 ID，如 `rdr_7190…`、`wd_7190…`
pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", time_ordered_id())
}

/// 订单 ID 使用 UUID v4
pub fn uuid_string() -> String {
    uuid::Uuid::new_v4().to_string()
}
