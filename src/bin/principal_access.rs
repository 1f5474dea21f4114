/// 認可済みプリンシパル管理Lambda関数
///
/// 宣言的リソースフレームワークから呼び出され、ライフサイクル操作を実行する。
/// 入力ペイロードの`operation`で操作を選択する:
/// - create / update: `domain_name`, `account`
/// - read: `domain_name`, `id`, `is_new_resource`（省略時false）
/// - delete: `domain_name`, `account`
///
/// Lambdaの実行期限の少し前に整定待機をキャンセルし、
/// タイムアウトで強制終了される前に結果を返す。
///
/// # 環境変数
/// - CREATE_TIMEOUT_SECS / UPDATE_TIMEOUT_SECS / DELETE_TIMEOUT_SECS（デフォルト: 600）
/// - SETTLE_POLL_INTERVAL_SECS（デフォルト: 15）
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vpc_endpoint_principal::application::{
    Operation, PrincipalAccessReconciler, ReconcilerError, RefreshOutcome,
};
use vpc_endpoint_principal::domain::{AuthorizationRequest, AuthorizedPrincipal, ResourceIdentifier};
use vpc_endpoint_principal::infrastructure::{
    AwsOpenSearchOps, OpenSearchOps, ReconcilerConfig, init_logging,
};

/// 実行期限に対する余裕
const DEADLINE_MARGIN: Duration = Duration::from_secs(5);

/// Lambda関数の入力
#[derive(Debug, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
enum LifecycleRequest {
    Create {
        domain_name: String,
        account: String,
    },
    Update {
        domain_name: String,
        account: String,
    },
    Read {
        domain_name: String,
        id: String,
        #[serde(default)]
        is_new_resource: bool,
    },
    Delete {
        domain_name: String,
        account: String,
    },
}

impl LifecycleRequest {
    fn operation(&self) -> Operation {
        match self {
            LifecycleRequest::Create { .. } => Operation::Create,
            LifecycleRequest::Update { .. } => Operation::Update,
            LifecycleRequest::Read { .. } => Operation::Read,
            LifecycleRequest::Delete { .. } => Operation::Delete,
        }
    }
}

/// Lambda関数の出力
#[derive(Debug, Default, Serialize)]
struct LifecycleResponse {
    /// 処理成功フラグ
    success: bool,
    /// リソース識別子（create/update/readで存在する場合）
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    /// 読み戻したプリンシパル
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<AuthorizedPrincipal>,
    /// 追跡から外すべきか（readでリモートから消えていた場合）
    remove_from_state: bool,
    /// エラー種別（エラー時のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<String>,
    /// エラーメッセージ（エラー時のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    /// タイムスタンプ（ISO 8601形式）
    timestamp: String,
}

impl LifecycleResponse {
    fn ok() -> Self {
        Self {
            success: true,
            timestamp: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }

    fn from_error(err: &ReconcilerError) -> Self {
        Self {
            success: false,
            error_kind: Some(err.kind().to_string()),
            error_message: Some(err.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let config = ReconcilerConfig::from_env().map_err(|err| {
        error!(error = %err, "リコンサイラー設定読み込み失敗");
        err
    })?;
    info!(config = ?config, "リコンサイラー設定を読み込み");

    let ops = Arc::new(AwsOpenSearchOps::from_config().await);
    let reconciler = Arc::new(PrincipalAccessReconciler::new(ops, config));

    let func = service_fn(move |event: LambdaEvent<LifecycleRequest>| {
        let reconciler = Arc::clone(&reconciler);
        async move { handler(reconciler.as_ref(), event).await }
    });
    lambda_runtime::run(func).await?;
    Ok(())
}

/// Lambda関数のメインハンドラー
///
/// リコンサイラーのエラーは`success: false`の応答として返す。
async fn handler<O: OpenSearchOps + ?Sized>(
    reconciler: &PrincipalAccessReconciler<O>,
    event: LambdaEvent<LifecycleRequest>,
) -> Result<LifecycleResponse, Error> {
    let request = event.payload;
    let operation = request.operation();
    info!(
        operation = %operation,
        request_id = %event.context.request_id,
        "ライフサイクル操作を受信"
    );

    let cancel = CancellationToken::new();
    let deadline = UNIX_EPOCH + Duration::from_millis(event.context.deadline);
    let _deadline_guard = spawn_deadline_cancel(deadline, cancel.clone());

    let result = dispatch(reconciler, request, &cancel).await;

    match result {
        Ok(response) => {
            info!(operation = %operation, id = ?response.id, "ライフサイクル操作成功");
            Ok(response)
        }
        Err(err) => {
            warn!(
                operation = %operation,
                error_kind = err.kind(),
                error = %err,
                "ライフサイクル操作失敗"
            );
            Ok(LifecycleResponse::from_error(&err))
        }
    }
}

/// 実行期限の手前でキャンセルするタスクを起動する
///
/// 戻り値のガードがドロップされるとタスクも中止される。
fn spawn_deadline_cancel(deadline: SystemTime, cancel: CancellationToken) -> DeadlineGuard {
    let remaining = deadline
        .duration_since(SystemTime::now())
        .unwrap_or_default()
        .saturating_sub(DEADLINE_MARGIN);

    let handle = tokio::spawn(async move {
        tokio::time::sleep(remaining).await;
        warn!("Lambda実行期限が近いため整定待機をキャンセル");
        cancel.cancel();
    });
    DeadlineGuard(handle)
}

struct DeadlineGuard(tokio::task::JoinHandle<()>);

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn dispatch<O: OpenSearchOps + ?Sized>(
    reconciler: &PrincipalAccessReconciler<O>,
    request: LifecycleRequest,
    cancel: &CancellationToken,
) -> Result<LifecycleResponse, ReconcilerError> {
    let operation = request.operation();
    let validated = |domain_name: String, account: String| {
        AuthorizationRequest::new(domain_name, account)
            .map_err(|source| ReconcilerError::Validation { operation, source })
    };

    match request {
        LifecycleRequest::Create {
            domain_name,
            account,
        } => {
            let applied = reconciler
                .create(&validated(domain_name, account)?, cancel)
                .await?;
            Ok(LifecycleResponse {
                id: Some(applied.identifier.into()),
                principal: Some(applied.principal),
                ..LifecycleResponse::ok()
            })
        }
        LifecycleRequest::Update {
            domain_name,
            account,
        } => {
            let applied = reconciler
                .update(&validated(domain_name, account)?, cancel)
                .await?;
            Ok(LifecycleResponse {
                id: Some(applied.identifier.into()),
                principal: Some(applied.principal),
                ..LifecycleResponse::ok()
            })
        }
        LifecycleRequest::Read {
            domain_name,
            id,
            is_new_resource,
        } => {
            let identifier = ResourceIdentifier::from_stored(id);
            match reconciler
                .refresh(&domain_name, &identifier, is_new_resource)
                .await?
            {
                RefreshOutcome::Present(principal) => Ok(LifecycleResponse {
                    id: Some(identifier.into()),
                    principal: Some(principal),
                    ..LifecycleResponse::ok()
                }),
                RefreshOutcome::Drifted => Ok(LifecycleResponse {
                    remove_from_state: true,
                    ..LifecycleResponse::ok()
                }),
            }
        }
        LifecycleRequest::Delete {
            domain_name,
            account,
        } => {
            let outcome = reconciler
                .delete(&validated(domain_name, account)?, cancel)
                .await?;
            info!(outcome = ?outcome, "削除完了");
            Ok(LifecycleResponse {
                remove_from_state: true,
                ..LifecycleResponse::ok()
            })
        }
    }
}
