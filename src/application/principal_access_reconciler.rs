//! 認可済みプリンシパルのリコンサイラー
//!
//! 宣言された設定（ドメイン名、アカウントID）とリモート状態から、
//! 必要最小限のAPI呼び出し（Authorize / List / Revoke）を実行して収束させる。
//!
//! OpenSearch操作はコンストラクタで注入する。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::settle_waiter::{SettleError, wait_for_domain_active};
use crate::domain::{
    AuthorizationRequest, AuthorizedPrincipal, DomainStatus, ResourceIdentifier, ValidationError,
};
use crate::infrastructure::{OpenSearchOps, OpenSearchOpsError, ReconcilerConfig, SettlePolicy};

/// ライフサイクル操作の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// リコンサイラーのエラー型
///
/// 全てのバリアントは操作種別と対象（識別子またはドメイン/アカウント）を持つ。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcilerError {
    /// 必須フィールドの欠落（リモート呼び出し前に検出）
    #[error("{operation}: 入力検証エラー: {source}")]
    Validation {
        operation: Operation,
        #[source]
        source: ValidationError,
    },
    /// Authorize / Revokeが拒否された
    #[error("{operation} ({target}): 認可操作が拒否されました: {message}")]
    Authorization {
        operation: Operation,
        target: String,
        message: String,
    },
    /// ドメインまたはプリンシパルが存在しない
    #[error("{operation} ({target}): 見つかりません: {message}")]
    NotFound {
        operation: Operation,
        target: String,
        message: String,
    },
    /// 変更後にドメインがActiveにならなかった
    #[error("{operation} ({target}): 整定待機タイムアウト（{elapsed:?}経過、最終状態: {last_status}）")]
    SettleTimeout {
        operation: Operation,
        target: String,
        elapsed: Duration,
        last_status: DomainStatus,
    },
    /// 呼び出し元によるキャンセル
    #[error("{operation} ({target}): キャンセルされました")]
    Cancelled { operation: Operation, target: String },
    /// その他のAPI・通信エラー
    #[error("{operation} ({target}): {source}")]
    Transport {
        operation: Operation,
        target: String,
        #[source]
        source: OpenSearchOpsError,
    },
}

impl ReconcilerError {
    /// ドメインまたはプリンシパルの不在によるエラーか
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcilerError::NotFound { .. })
    }

    /// 呼び出し元に返すエラー種別名
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::Validation { .. } => "validation",
            ReconcilerError::Authorization { .. } => "authorization",
            ReconcilerError::NotFound { .. } => "not_found",
            ReconcilerError::SettleTimeout { .. } => "settle_timeout",
            ReconcilerError::Cancelled { .. } => "cancelled",
            ReconcilerError::Transport { .. } => "transport",
        }
    }

    /// リモート操作のエラーを分類する
    fn from_ops(operation: Operation, target: impl Into<String>, error: OpenSearchOpsError) -> Self {
        let target = target.into();
        match error {
            OpenSearchOpsError::ResourceNotFound(message) => ReconcilerError::NotFound {
                operation,
                target,
                message,
            },
            OpenSearchOpsError::Rejected(message) => ReconcilerError::Authorization {
                operation,
                target,
                message,
            },
            source @ OpenSearchOpsError::AwsSdkError(_) => ReconcilerError::Transport {
                operation,
                target,
                source,
            },
        }
    }

    fn from_settle(operation: Operation, target: impl Into<String>, error: SettleError) -> Self {
        let target = target.into();
        match error {
            SettleError::Timeout {
                elapsed,
                last_status,
                ..
            } => ReconcilerError::SettleTimeout {
                operation,
                target,
                elapsed,
                last_status,
            },
            SettleError::Cancelled { .. } => ReconcilerError::Cancelled { operation, target },
            SettleError::Poll { source, .. } => Self::from_ops(operation, target, source),
        }
    }
}

/// Create / Updateの結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedPrincipal {
    /// 導出したリソース識別子
    pub identifier: ResourceIdentifier,
    /// 読み戻したプリンシパル
    pub principal: AuthorizedPrincipal,
}

/// Refreshの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// リモートに存在する
    Present(AuthorizedPrincipal),
    /// リモートから消えている（追跡から外す）
    Drifted,
}

/// Deleteの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// 取り消してActiveまで待機した
    Revoked,
    /// 既に存在しなかった
    AlreadyAbsent,
}

/// 認可済みプリンシパルのリコンサイラー
pub struct PrincipalAccessReconciler<O: OpenSearchOps + ?Sized> {
    ops: Arc<O>,
    config: ReconcilerConfig,
}

impl<O: OpenSearchOps + ?Sized> PrincipalAccessReconciler<O> {
    pub fn new(ops: Arc<O>, config: ReconcilerConfig) -> Self {
        Self { ops, config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// プリンシパルを認可して識別子を返す
    ///
    /// 認可後、ドメインの設定反映がActiveになるまで待機し、
    /// プリンシパルを読み戻す。
    pub async fn create(
        &self,
        request: &AuthorizationRequest,
        cancel: &CancellationToken,
    ) -> Result<AppliedPrincipal, ReconcilerError> {
        self.upsert(Operation::Create, self.config.create_policy(), request, cancel)
            .await
    }

    /// Createと同じ処理（Authorizeは冪等）をUpdate用のタイムアウトで実行する
    pub async fn update(
        &self,
        request: &AuthorizationRequest,
        cancel: &CancellationToken,
    ) -> Result<AppliedPrincipal, ReconcilerError> {
        self.upsert(Operation::Update, self.config.update_policy(), request, cancel)
            .await
    }

    async fn upsert(
        &self,
        operation: Operation,
        policy: SettlePolicy,
        request: &AuthorizationRequest,
        cancel: &CancellationToken,
    ) -> Result<AppliedPrincipal, ReconcilerError> {
        request
            .validate()
            .map_err(|source| ReconcilerError::Validation { operation, source })?;

        let domain_name = request.domain_name();
        let account = request.account();
        let target = format!("{}/{}", domain_name, account);

        let authorized = self
            .ops
            .authorize_access(domain_name, account)
            .await
            .map_err(|e| ReconcilerError::from_ops(operation, target, e))?;

        let identifier = authorized.identifier();
        info!(
            operation = %operation,
            domain_name = %domain_name,
            resource_id = %identifier,
            "プリンシパルを認可"
        );

        wait_for_domain_active(self.ops.as_ref(), domain_name, policy, cancel)
            .await
            .map_err(|e| ReconcilerError::from_settle(operation, identifier.as_str(), e))?;

        let principal = match self.find(operation, domain_name, &identifier).await? {
            Some(principal) => principal,
            None => {
                warn!(
                    operation = %operation,
                    resource_id = %identifier,
                    "認可直後の一覧にプリンシパルが見つかりません（応答の値を使用）"
                );
                authorized
            }
        };

        Ok(AppliedPrincipal {
            identifier,
            principal,
        })
    }

    /// 識別子に一致するプリンシパルを取得する
    ///
    /// 一覧が空、または一致するものがない場合は`Ok(None)`。
    /// ドメイン自体が存在しない場合は`ReconcilerError::NotFound`。
    pub async fn read(
        &self,
        domain_name: &str,
        identifier: &ResourceIdentifier,
    ) -> Result<Option<AuthorizedPrincipal>, ReconcilerError> {
        let domain_name = domain_name.trim();
        if domain_name.is_empty() {
            return Err(ReconcilerError::Validation {
                operation: Operation::Read,
                source: ValidationError::EmptyField("domain_name"),
            });
        }
        if identifier.as_str().trim().is_empty() {
            return Err(ReconcilerError::Validation {
                operation: Operation::Read,
                source: ValidationError::EmptyField("id"),
            });
        }

        self.find(Operation::Read, domain_name, identifier).await
    }

    async fn find(
        &self,
        operation: Operation,
        domain_name: &str,
        identifier: &ResourceIdentifier,
    ) -> Result<Option<AuthorizedPrincipal>, ReconcilerError> {
        let principals = self
            .ops
            .list_access(domain_name)
            .await
            .map_err(|e| ReconcilerError::from_ops(operation, identifier.as_str(), e))?;

        Ok(principals
            .into_iter()
            .find(|p| p.domain_name == domain_name && &p.identifier() == identifier))
    }

    /// フレームワークのリフレッシュ用にReadを実行する
    ///
    /// 既存リソースの不在（ドメインごと消えた場合も含む）はドリフトとして扱う。
    /// 作成直後のリソースが見つからない場合はエラー。
    pub async fn refresh(
        &self,
        domain_name: &str,
        identifier: &ResourceIdentifier,
        is_new_resource: bool,
    ) -> Result<RefreshOutcome, ReconcilerError> {
        let not_found_message = match self.read(domain_name, identifier).await {
            Ok(Some(principal)) => return Ok(RefreshOutcome::Present(principal)),
            Ok(None) => format!("ドメイン {} に認可が存在しません", domain_name),
            Err(ReconcilerError::NotFound { message, .. }) => message,
            Err(err) => return Err(err),
        };

        if is_new_resource {
            return Err(ReconcilerError::NotFound {
                operation: Operation::Read,
                target: identifier.to_string(),
                message: not_found_message,
            });
        }

        warn!(
            domain_name = %domain_name,
            resource_id = %identifier,
            reason = %not_found_message,
            "認可済みプリンシパルが見つからないため追跡から外します"
        );
        Ok(RefreshOutcome::Drifted)
    }

    /// 認可を取り消す
    ///
    /// 既に存在しない場合は成功として扱い、整定待機は行わない。
    /// 取り消しが拒否された場合は一覧で不在を確認し、不在なら成功とする。
    pub async fn delete(
        &self,
        request: &AuthorizationRequest,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome, ReconcilerError> {
        let operation = Operation::Delete;
        request
            .validate()
            .map_err(|source| ReconcilerError::Validation { operation, source })?;

        let domain_name = request.domain_name();
        let account = request.account();
        let target = format!("{}/{}", domain_name, account);

        match self.ops.revoke_access(domain_name, account).await {
            Ok(()) => {}
            Err(OpenSearchOpsError::ResourceNotFound(message)) => {
                info!(
                    domain_name = %domain_name,
                    account = %account,
                    reason = %message,
                    "認可は既に存在しません"
                );
                return Ok(DeleteOutcome::AlreadyAbsent);
            }
            Err(OpenSearchOpsError::Rejected(message))
                if self.is_revoked(domain_name, account).await =>
            {
                info!(
                    domain_name = %domain_name,
                    account = %account,
                    reason = %message,
                    "取り消しは拒否されましたが認可は一覧に存在しません"
                );
                return Ok(DeleteOutcome::AlreadyAbsent);
            }
            Err(err) => return Err(ReconcilerError::from_ops(operation, target, err)),
        }

        wait_for_domain_active(
            self.ops.as_ref(),
            domain_name,
            self.config.delete_policy(),
            cancel,
        )
        .await
        .map_err(|e| ReconcilerError::from_settle(operation, target.as_str(), e))?;

        info!(
            domain_name = %domain_name,
            account = %account,
            "認可を取り消しました"
        );
        Ok(DeleteOutcome::Revoked)
    }

    /// 一覧にアカウントの認可が存在しないことを確認する
    ///
    /// 一覧取得に失敗した場合は確認できないため`false`。
    async fn is_revoked(&self, domain_name: &str, account: &str) -> bool {
        match self.ops.list_access(domain_name).await {
            Ok(principals) => !principals.iter().any(|p| p.principal == account),
            Err(err) => {
                warn!(
                    domain_name = %domain_name,
                    account = %account,
                    error = %err,
                    "取り消し拒否後の一覧取得に失敗"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PrincipalType;
    use crate::infrastructure::logging::init_test_logging;
    use crate::infrastructure::opensearch_ops::mock::MockOpenSearchOps;

    fn fast_config() -> ReconcilerConfig {
        ReconcilerConfig::uniform(Duration::from_secs(5), Duration::from_millis(10))
    }

    fn reconciler(mock: MockOpenSearchOps) -> (Arc<MockOpenSearchOps>, PrincipalAccessReconciler<MockOpenSearchOps>) {
        let ops = Arc::new(mock);
        let reconciler = PrincipalAccessReconciler::new(Arc::clone(&ops), fast_config());
        (ops, reconciler)
    }

    fn request(domain_name: &str, account: &str) -> AuthorizationRequest {
        AuthorizationRequest::new(domain_name, account).unwrap()
    }

    // ==================== Create テスト ====================

    #[tokio::test]
    async fn test_create_then_read() {
        init_test_logging();
        let (ops, reconciler) = reconciler(MockOpenSearchOps::new().with_status_sequence(
            "logs-prod",
            vec![DomainStatus::Processing, DomainStatus::Active],
        ));
        let cancel = CancellationToken::new();

        let applied = reconciler
            .create(&request("logs-prod", "123456789012"), &cancel)
            .await
            .unwrap();

        assert_eq!(
            applied.identifier.as_str(),
            "authorized-principal-123456789012-ACCOUNT-logs-prod"
        );
        assert_eq!(applied.principal.principal, "123456789012");
        assert_eq!(applied.principal.principal_type, PrincipalType::Account);
        assert_eq!(ops.status_call_count(), 2);

        let read = reconciler
            .read("logs-prod", &applied.identifier)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, applied.principal);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let (ops, reconciler) = reconciler(MockOpenSearchOps::new().with_domain("logs-prod"));
        let cancel = CancellationToken::new();
        let req = request("logs-prod", "123456789012");

        let first = reconciler.create(&req, &cancel).await.unwrap();
        let second = reconciler.update(&req, &cancel).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ops.principal_count("logs-prod"), 1);
        assert_eq!(ops.authorize_call_count(), 2);
    }

    #[tokio::test]
    async fn test_create_validation_before_remote_call() {
        let (ops, reconciler) = reconciler(MockOpenSearchOps::new().with_domain("logs-prod"));
        let req: AuthorizationRequest =
            serde_json::from_str(r#"{"domain_name":"logs-prod","account":""}"#).unwrap();

        let result = reconciler.create(&req, &CancellationToken::new()).await;

        assert_eq!(
            result.unwrap_err(),
            ReconcilerError::Validation {
                operation: Operation::Create,
                source: ValidationError::EmptyField("account"),
            }
        );
        assert_eq!(ops.authorize_call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rejected() {
        let (ops, reconciler) =
            reconciler(MockOpenSearchOps::new().with_rejected_mutations("logs-prod"));

        let result = reconciler
            .create(&request("logs-prod", "123456789012"), &CancellationToken::new())
            .await;

        match result.unwrap_err() {
            ReconcilerError::Authorization {
                operation,
                target,
                message,
            } => {
                assert_eq!(operation, Operation::Create);
                assert_eq!(target, "logs-prod/123456789012");
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("予期しないエラー: {:?}", other),
        }
        // 拒否時は整定待機しない
        assert_eq!(ops.status_call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_unknown_domain() {
        let (_, reconciler) = reconciler(MockOpenSearchOps::new());

        let result = reconciler
            .create(&request("missing", "123456789012"), &CancellationToken::new())
            .await;

        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_settle_timeout() {
        let ops = Arc::new(
            MockOpenSearchOps::new()
                .with_status_sequence("logs-prod", vec![DomainStatus::Processing]),
        );
        let config = ReconcilerConfig::new(
            Duration::from_millis(50),
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_millis(10),
        );
        let reconciler = PrincipalAccessReconciler::new(Arc::clone(&ops), config);

        let result = reconciler
            .create(&request("logs-prod", "123456789012"), &CancellationToken::new())
            .await;

        match result.unwrap_err() {
            ReconcilerError::SettleTimeout {
                operation,
                target,
                elapsed,
                last_status,
            } => {
                assert_eq!(operation, Operation::Create);
                assert_eq!(target, "authorized-principal-123456789012-ACCOUNT-logs-prod");
                assert!(elapsed >= Duration::from_millis(50));
                assert_eq!(last_status, DomainStatus::Processing);
            }
            other => panic!("予期しないエラー: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_cancelled() {
        let (_, reconciler) = reconciler(
            MockOpenSearchOps::new()
                .with_status_sequence("logs-prod", vec![DomainStatus::Processing]),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = reconciler
            .create(&request("logs-prod", "123456789012"), &cancel)
            .await;

        assert!(matches!(
            result.unwrap_err(),
            ReconcilerError::Cancelled {
                operation: Operation::Create,
                ..
            }
        ));
    }

    // ==================== Read テスト ====================

    #[tokio::test]
    async fn test_read_no_match_is_absent() {
        let (_, reconciler) = reconciler(MockOpenSearchOps::new().with_principal(
            "logs-prod",
            AuthorizedPrincipal::new("123456789012", PrincipalType::Account, "logs-prod"),
        ));
        let id =
            ResourceIdentifier::from_stored("authorized-principal-999999999999-ACCOUNT-logs-prod");

        let result = reconciler.read("logs-prod", &id).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_read_empty_domain_is_absent() {
        let (ops, reconciler) = reconciler(MockOpenSearchOps::new().with_domain("logs-prod"));
        let id =
            ResourceIdentifier::from_stored("authorized-principal-123456789012-ACCOUNT-logs-prod");

        let result = reconciler.read("logs-prod", &id).await.unwrap();

        assert!(result.is_none());
        assert_eq!(ops.list_call_count(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_domain_is_not_found() {
        let (_, reconciler) = reconciler(MockOpenSearchOps::new());
        let id =
            ResourceIdentifier::from_stored("authorized-principal-123456789012-ACCOUNT-logs-prod");

        let result = reconciler.read("logs-prod", &id).await;

        match result.unwrap_err() {
            ReconcilerError::NotFound {
                operation, target, ..
            } => {
                assert_eq!(operation, Operation::Read);
                assert_eq!(target, id.as_str());
            }
            other => panic!("予期しないエラー: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_trims_domain_name_like_create() {
        let (_, reconciler) = reconciler(MockOpenSearchOps::new().with_domain("logs-prod"));
        let cancel = CancellationToken::new();

        let applied = reconciler
            .create(&request(" logs-prod ", "123456789012"), &cancel)
            .await
            .unwrap();

        let read = reconciler
            .read(" logs-prod ", &applied.identifier)
            .await
            .unwrap();
        assert_eq!(read, Some(applied.principal));

        let outcome = reconciler
            .refresh(" logs-prod ", &applied.identifier, true)
            .await
            .unwrap();
        assert!(matches!(outcome, RefreshOutcome::Present(_)));
    }

    #[tokio::test]
    async fn test_read_empty_domain_name() {
        let (ops, reconciler) = reconciler(MockOpenSearchOps::new());
        let id = ResourceIdentifier::from_stored("authorized-principal-1-ACCOUNT-x");

        let result = reconciler.read(" ", &id).await;

        assert!(matches!(
            result.unwrap_err(),
            ReconcilerError::Validation { .. }
        ));
        assert_eq!(ops.list_call_count(), 0);
    }

    // ==================== Refresh テスト ====================

    #[tokio::test]
    async fn test_refresh_present() {
        let principal = AuthorizedPrincipal::new("123456789012", PrincipalType::Account, "logs-prod");
        let (_, reconciler) =
            reconciler(MockOpenSearchOps::new().with_principal("logs-prod", principal.clone()));

        let outcome = reconciler
            .refresh("logs-prod", &principal.identifier(), false)
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Present(principal));
    }

    #[tokio::test]
    async fn test_refresh_missing_domain_drifts_existing_resource() {
        let (_, reconciler) = reconciler(MockOpenSearchOps::new());
        let id =
            ResourceIdentifier::from_stored("authorized-principal-123456789012-ACCOUNT-logs-prod");

        let outcome = reconciler.refresh("logs-prod", &id, false).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Drifted);
    }

    #[tokio::test]
    async fn test_refresh_missing_new_resource_is_error() {
        let (_, reconciler) = reconciler(MockOpenSearchOps::new().with_domain("logs-prod"));
        let id =
            ResourceIdentifier::from_stored("authorized-principal-123456789012-ACCOUNT-logs-prod");

        let result = reconciler.refresh("logs-prod", &id, true).await;

        assert!(result.unwrap_err().is_not_found());
    }

    // ==================== Delete テスト ====================

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (ops, reconciler) = reconciler(MockOpenSearchOps::new().with_status_sequence(
            "logs-prod",
            vec![DomainStatus::Processing, DomainStatus::Active],
        ));
        let cancel = CancellationToken::new();
        let req = request("logs-prod", "123456789012");

        reconciler.create(&req, &cancel).await.unwrap();

        let first = reconciler.delete(&req, &cancel).await.unwrap();
        let second = reconciler.delete(&req, &cancel).await.unwrap();

        assert_eq!(first, DeleteOutcome::Revoked);
        assert_eq!(second, DeleteOutcome::AlreadyAbsent);
        assert_eq!(ops.revoke_call_count(), 2);
        assert_eq!(ops.principal_count("logs-prod"), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_domain_is_success() {
        let (ops, reconciler) = reconciler(MockOpenSearchOps::new());

        let outcome = reconciler
            .delete(&request("missing", "123456789012"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
        assert_eq!(ops.status_call_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_rejected() {
        let (ops, reconciler) = reconciler(
            MockOpenSearchOps::new()
                .with_principal(
                    "logs-prod",
                    AuthorizedPrincipal::new("123456789012", PrincipalType::Account, "logs-prod"),
                )
                .with_rejected_mutations("logs-prod"),
        );

        let result = reconciler
            .delete(&request("logs-prod", "123456789012"), &CancellationToken::new())
            .await;

        assert!(matches!(
            result.unwrap_err(),
            ReconcilerError::Authorization {
                operation: Operation::Delete,
                ..
            }
        ));
        assert_eq!(ops.list_call_count(), 1);
        assert_eq!(ops.principal_count("logs-prod"), 1);
    }

    #[tokio::test]
    async fn test_delete_rejected_but_absent_is_success() {
        // 未認可のアカウントに対して取り消しがValidationExceptionになる場合
        let (ops, reconciler) =
            reconciler(MockOpenSearchOps::new().with_rejected_mutations("logs-prod"));

        let outcome = reconciler
            .delete(&request("logs-prod", "123456789012"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
        assert_eq!(ops.list_call_count(), 1);
        assert_eq!(ops.status_call_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_settle_timeout() {
        let principal = AuthorizedPrincipal::new("123456789012", PrincipalType::Account, "logs-prod");
        let ops = Arc::new(
            MockOpenSearchOps::new()
                .with_principal("logs-prod", principal)
                .with_status_sequence("logs-prod", vec![DomainStatus::Processing]),
        );
        let config = ReconcilerConfig::new(
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_millis(40),
            Duration::from_millis(10),
        );
        let reconciler = PrincipalAccessReconciler::new(Arc::clone(&ops), config);

        let result = reconciler
            .delete(&request("logs-prod", "123456789012"), &CancellationToken::new())
            .await;

        assert!(matches!(
            result.unwrap_err(),
            ReconcilerError::SettleTimeout {
                operation: Operation::Delete,
                ..
            }
        ));
    }

    // ==================== ReconcilerError テスト ====================

    #[test]
    fn test_from_ops_classification() {
        let not_found = ReconcilerError::from_ops(
            Operation::Read,
            "id",
            OpenSearchOpsError::ResourceNotFound("gone".to_string()),
        );
        assert!(not_found.is_not_found());

        let transport = ReconcilerError::from_ops(
            Operation::Create,
            "logs-prod/1",
            OpenSearchOpsError::AwsSdkError("dispatch failure".to_string()),
        );
        assert_eq!(transport.kind(), "transport");
        assert_eq!(
            transport.to_string(),
            "create (logs-prod/1): AWS OpenSearch APIエラー: dispatch failure"
        );
    }

    #[test]
    fn test_settle_poll_not_found_maps_to_not_found() {
        let error = ReconcilerError::from_settle(
            Operation::Delete,
            "logs-prod/1",
            SettleError::Poll {
                domain_name: "logs-prod".to_string(),
                source: OpenSearchOpsError::ResourceNotFound("deleted".to_string()),
            },
        );
        assert!(error.is_not_found());
    }
}
