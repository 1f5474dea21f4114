/// リコンサイラー設定
///
/// 各ライフサイクル操作の整定待機タイムアウトとポーリング間隔を管理する。
/// 環境変数から読み込み、未設定の場合はデフォルト値を使う。
use std::time::Duration;

use thiserror::Error;

/// 設定のエラー型
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcilerConfigError {
    /// 値が正の整数でない
    #[error("環境変数の値が不正です: {name}={value}")]
    InvalidValue { name: String, value: String },
}

/// 整定待機ポリシー（タイムアウトとポーリング間隔）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl SettlePolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

/// リコンサイラー設定
///
/// 以下の環境変数から読み込む:
/// - CREATE_TIMEOUT_SECS: Create時の整定待機タイムアウト（デフォルト: 600）
/// - UPDATE_TIMEOUT_SECS: Update時の整定待機タイムアウト（デフォルト: 600）
/// - DELETE_TIMEOUT_SECS: Delete時の整定待機タイムアウト（デフォルト: 600）
/// - SETTLE_POLL_INTERVAL_SECS: ドメイン状態のポーリング間隔（デフォルト: 15）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    create_timeout: Duration,
    update_timeout: Duration,
    delete_timeout: Duration,
    poll_interval: Duration,
}

impl ReconcilerConfig {
    /// デフォルトの整定待機タイムアウト（10分）
    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
    /// デフォルトのポーリング間隔
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

    /// 環境変数から設定を読み込む
    ///
    /// # エラー
    /// 値が正の整数として解釈できない場合は`InvalidValue`
    pub fn from_env() -> Result<Self, ReconcilerConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の取得関数から設定を読み込む
    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ReconcilerConfigError> {
        let secs = |name: &str, default: u64| -> Result<Duration, ReconcilerConfigError> {
            match lookup(name) {
                None => Ok(Duration::from_secs(default)),
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
                    _ => Err(ReconcilerConfigError::InvalidValue {
                        name: name.to_string(),
                        value,
                    }),
                },
            }
        };

        Ok(Self {
            create_timeout: secs("CREATE_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS)?,
            update_timeout: secs("UPDATE_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS)?,
            delete_timeout: secs("DELETE_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS)?,
            poll_interval: secs("SETTLE_POLL_INTERVAL_SECS", Self::DEFAULT_POLL_INTERVAL_SECS)?,
        })
    }

    /// 明示的な値で設定を作成（テスト用）
    pub fn new(
        create_timeout: Duration,
        update_timeout: Duration,
        delete_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            create_timeout,
            update_timeout,
            delete_timeout,
            poll_interval,
        }
    }

    /// 全操作で同じタイムアウトを使う設定を作成
    pub fn uniform(timeout: Duration, poll_interval: Duration) -> Self {
        Self::new(timeout, timeout, timeout, poll_interval)
    }

    pub fn create_policy(&self) -> SettlePolicy {
        SettlePolicy::new(self.create_timeout, self.poll_interval)
    }

    pub fn update_policy(&self) -> SettlePolicy {
        SettlePolicy::new(self.update_timeout, self.poll_interval)
    }

    pub fn delete_policy(&self) -> SettlePolicy {
        SettlePolicy::new(self.delete_timeout, self.poll_interval)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::uniform(
            Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            Duration::from_secs(Self::DEFAULT_POLL_INTERVAL_SECS),
        )
    }
}
