use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

/// 服务配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖（启动时会先加载 `.env`）：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/fulfillment | 工作目录（账本位于 database/ledger.redb） |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (未设置) | 设置后按天滚动写入日志文件 |
/// | MIN_WITHDRAWAL | 100 | 最低提现金额 |
/// | AUTO_APPROVE_WITHDRAWALS | true | 提现是否立即完成 |
/// | PAYMENT_WEBHOOK_SECRET | (空) | 支付签名 HMAC 密钥 |
/// | NOTIFICATION_CHANNEL_CAPACITY | 1024 | 通知广播缓冲区 |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 优雅关闭超时(毫秒) |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/fulfillment HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储账本和日志
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,

    // === 结算 ===
    /// 最低提现金额
    pub min_withdrawal: Decimal,
    /// 提现是否自动通过
    pub auto_approve_withdrawals: bool,

    // === 支付 ===
    /// 支付回调签名密钥
    pub payment_webhook_secret: String,

    /// 通知广播缓冲区大小
    pub notification_channel_capacity: usize,
    /// 关闭超时时间 (毫秒)
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: env_or("WORK_DIR", "/var/lib/fulfillment".to_string()),
            http_port: env_or("HTTP_PORT", 3000),
            environment: env_or("ENVIRONMENT", "development".to_string()),
            log_level: env_or("LOG_LEVEL", "info".to_string()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            min_withdrawal: env_or("MIN_WITHDRAWAL", Decimal::ONE_HUNDRED),
            auto_approve_withdrawals: env_or("AUTO_APPROVE_WITHDRAWALS", true),
            payment_webhook_secret: env_or("PAYMENT_WEBHOOK_SECRET", String::new()),
            notification_channel_capacity: env_or("NOTIFICATION_CHANNEL_CAPACITY", 1024_usize)
                .max(1),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10_000),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 账本数据库路径
    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
            .join("database")
            .join("ledger.redb")
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

}

/// 读取并解析环境变量，缺失或解析失败时回退到 `default`
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Unparseable config value, using default");
            default
        }),
        Err(_) => default,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        assert_eq!(env_or("FULFILLMENT_TEST_UNSET_KEY", 7_u16), 7);
        // SAFETY: 单线程测试内设置进程私有的键
        unsafe { std::env::set_var("FULFILLMENT_TEST_BAD_PORT", "not-a-port") };
        assert_eq!(env_or("FULFILLMENT_TEST_BAD_PORT", 3000_u16), 3000);
        unsafe { std::env::set_var("FULFILLMENT_TEST_MIN", " 250.50 ") };
        assert_eq!(
            env_or("FULFILLMENT_TEST_MIN", Decimal::ONE_HUNDRED),
            Decimal::new(25050, 2)
        );
    }

    #[test]
    fn test_ledger_path_under_work_dir() {
        let config = Config::with_overrides("/tmp/fulfillment-test", 4000);
        assert_eq!(config.http_port, 4000);
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/tmp/fulfillment-test/database/ledger.redb")
        );
    }
}
