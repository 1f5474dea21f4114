// インフラストラクチャ層モジュール
pub mod logging;
pub mod opensearch_ops;
pub mod reconciler_config;

// 再エクスポート
pub use logging::{LogFormat, init_logging, init_logging_with_format};
pub use opensearch_ops::{AwsOpenSearchOps, OpenSearchOps, OpenSearchOpsError};
pub use reconciler_config::{ReconcilerConfig, ReconcilerConfigError, SettlePolicy};
