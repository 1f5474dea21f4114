//! 整定待機
//!
//! 変更系API呼び出しの後、ドメインの設定反映がActiveになるまで
//! 固定間隔でポーリングする。タイムアウトとキャンセルで打ち切る。
//! 期限は状態取得の呼び出し中にも適用する。

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{DomainStatus, SettleState};
use crate::infrastructure::{OpenSearchOps, OpenSearchOpsError, SettlePolicy};

/// 整定待機のエラー型
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettleError {
    /// タイムアウトまでにActiveにならなかった
    #[error(
        "ドメイン {domain_name} が{elapsed:?}以内にActiveになりませんでした（最終状態: {last_status}）"
    )]
    Timeout {
        domain_name: String,
        elapsed: Duration,
        last_status: DomainStatus,
    },
    /// 呼び出し元によるキャンセル
    #[error("ドメイン {domain_name} の整定待機がキャンセルされました（{elapsed:?}経過）")]
    Cancelled {
        domain_name: String,
        elapsed: Duration,
    },
    /// 致命的なポーリングエラー（ドメインの並行削除など）
    #[error("ドメイン {domain_name} の状態取得に失敗: {source}")]
    Poll {
        domain_name: String,
        #[source]
        source: OpenSearchOpsError,
    },
}

/// 整定待機の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleOutcome {
    /// ポーリング回数
    pub polls: u32,
    /// 経過時間
    pub elapsed: Duration,
}

/// ドメインがActiveになるまで待機する
///
/// 一時的なAPIエラーは警告を出して待機を続ける。
/// ResourceNotFoundとRejectedは致命的として即座に失敗する。
pub async fn wait_for_domain_active<O: OpenSearchOps + ?Sized>(
    ops: &O,
    domain_name: &str,
    policy: SettlePolicy,
    cancel: &CancellationToken,
) -> Result<SettleOutcome, SettleError> {
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut state = SettleState::initial();
    let mut last_status = DomainStatus::Processing;
    let mut polls: u32 = 0;

    info!(
        domain_name = %domain_name,
        timeout_secs = policy.timeout.as_secs(),
        poll_interval_secs = policy.poll_interval.as_secs(),
        "ドメイン整定待機開始"
    );

    let cancelled = |start: Instant| SettleError::Cancelled {
        domain_name: domain_name.to_string(),
        elapsed: start.elapsed(),
    };
    let timed_out = |start: Instant, last_status: DomainStatus| SettleError::Timeout {
        domain_name: domain_name.to_string(),
        elapsed: start.elapsed(),
        last_status,
    };

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(start));
        }

        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(start)),
            result = tokio::time::timeout_at(deadline, ops.get_domain_status(domain_name)) => result,
        };
        polls += 1;

        let Ok(polled) = polled else {
            state = state.on_failure();
            warn!(
                domain_name = %domain_name,
                state = ?state,
                elapsed_secs = start.elapsed().as_secs(),
                last_status = %last_status,
                "ドメイン状態取得が期限内に完了しませんでした"
            );
            return Err(timed_out(start, last_status));
        };

        match polled {
            Ok(status) => {
                last_status = status;
                state = state.on_status(status);
                if state == SettleState::Active {
                    let elapsed = start.elapsed();
                    info!(
                        domain_name = %domain_name,
                        polls = polls,
                        elapsed_secs = elapsed.as_secs(),
                        "ドメインがActiveになりました"
                    );
                    return Ok(SettleOutcome { polls, elapsed });
                }
            }
            Err(OpenSearchOpsError::AwsSdkError(message)) => {
                warn!(
                    domain_name = %domain_name,
                    error = %message,
                    "ドメイン状態取得の一時的なエラー（継続）"
                );
            }
            Err(source) => {
                state = state.on_failure();
                warn!(
                    domain_name = %domain_name,
                    state = ?state,
                    error = %source,
                    "ドメイン状態取得の致命的なエラー"
                );
                return Err(SettleError::Poll {
                    domain_name: domain_name.to_string(),
                    source,
                });
            }
        }

        let now = Instant::now();
        if now >= deadline {
            state = state.on_failure();
            warn!(
                domain_name = %domain_name,
                state = ?state,
                elapsed_secs = start.elapsed().as_secs(),
                last_status = %last_status,
                "ドメイン整定待機タイムアウト"
            );
            return Err(timed_out(start, last_status));
        }

        info!(
            domain_name = %domain_name,
            current_status = %last_status,
            elapsed_secs = start.elapsed().as_secs(),
            "Active状態待機中..."
        );

        // 期限を超えて眠らない
        let wake_at = (now + policy.poll_interval).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(start)),
            _ = tokio::time::sleep_until(wake_at) => {}
        }
    }
}
