//! OpenSearch操作モジュール
//!
//! VPCエンドポイントのアクセス制御とドメイン状態取得を提供する。
//! - AuthorizeVpcEndpointAccess（プリンシパルの認可）
//! - ListVpcEndpointAccess（認可済みプリンシパルの一覧）
//! - RevokeVpcEndpointAccess（認可の取り消し）
//! - DescribeDomain（設定反映状態の確認）
//!
//! AWS SDKのエラーコードはこの層で`OpenSearchOpsError`に分類し、
//! 上位層はSDK固有の型を扱わない。

use async_trait::async_trait;
use aws_sdk_opensearch::Client as OpenSearchClient;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{AuthorizedPrincipal, DomainStatus, PrincipalType};

/// OpenSearch操作のエラー型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpenSearchOpsError {
    /// ドメイン（Revoke時は認可そのもの）が存在しない
    #[error("リソースが見つかりません: {0}")]
    ResourceNotFound(String),
    /// リクエストがサービスに拒否された（検証エラー、上限超過など）
    #[error("リクエストが拒否されました: {0}")]
    Rejected(String),
    /// その他のAPI・通信エラー
    #[error("AWS OpenSearch APIエラー: {0}")]
    AwsSdkError(String),
}

impl OpenSearchOpsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OpenSearchOpsError::ResourceNotFound(_))
    }
}

/// サービスエラーを分類する
fn classify(not_found: bool, rejected: bool, message: String) -> OpenSearchOpsError {
    if not_found {
        OpenSearchOpsError::ResourceNotFound(message)
    } else if rejected {
        OpenSearchOpsError::Rejected(message)
    } else {
        OpenSearchOpsError::AwsSdkError(message)
    }
}

/// SDKのプリンシパル型をドメイン型に変換する
fn to_domain_principal(
    principal: &aws_sdk_opensearch::types::AuthorizedPrincipal,
    domain_name: &str,
) -> Option<AuthorizedPrincipal> {
    let id = principal.principal()?;
    let principal_type = principal
        .principal_type()
        .map(|t| PrincipalType::from(t.as_str()))
        .unwrap_or(PrincipalType::Account);
    Some(AuthorizedPrincipal::new(id, principal_type, domain_name))
}

/// ページ分割された一覧を最後のページまで取得する
///
/// `fetch`は継続トークンを受け取り、そのページの要素と次のトークンを返す。
/// 次のトークンが空になった時点で終了する。
async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, OpenSearchOpsError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, String), OpenSearchOpsError>>,
{
    let mut items = Vec::new();
    let mut next_token = None;

    loop {
        let (page, token) = fetch(next_token.take()).await?;
        items.extend(page);
        if token.is_empty() {
            return Ok(items);
        }
        next_token = Some(token);
    }
}

/// OpenSearch操作トレイト（テスト用の抽象化）
#[async_trait]
pub trait OpenSearchOps: Send + Sync {
    /// アカウントにVPCエンドポイントへのアクセスを認可する
    ///
    /// 既に認可済みの組に対しては既存のプリンシパルを返す。
    async fn authorize_access(
        &self,
        domain_name: &str,
        account: &str,
    ) -> Result<AuthorizedPrincipal, OpenSearchOpsError>;

    /// ドメインの認可済みプリンシパルを全件取得する
    async fn list_access(&self, domain_name: &str)
    -> Result<Vec<AuthorizedPrincipal>, OpenSearchOpsError>;

    /// アカウントの認可を取り消す
    async fn revoke_access(&self, domain_name: &str, account: &str)
    -> Result<(), OpenSearchOpsError>;

    /// ドメインの設定反映状態を取得する
    async fn get_domain_status(&self, domain_name: &str)
    -> Result<DomainStatus, OpenSearchOpsError>;
}

/// 実際のAWS OpenSearch SDKを使用した実装
pub struct AwsOpenSearchOps {
    client: OpenSearchClient,
}

impl AwsOpenSearchOps {
    /// 新しいAwsOpenSearchOpsを作成
    pub fn new(client: OpenSearchClient) -> Self {
        Self { client }
    }

    /// AWS設定からデフォルトのクライアントを作成
    pub async fn from_config() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = OpenSearchClient::new(&config);
        Self::new(client)
    }
}

#[async_trait]
impl OpenSearchOps for AwsOpenSearchOps {
    async fn authorize_access(
        &self,
        domain_name: &str,
        account: &str,
    ) -> Result<AuthorizedPrincipal, OpenSearchOpsError> {
        info!(
            domain_name = %domain_name,
            account = %account,
            "AuthorizeVpcEndpointAccess開始"
        );

        let result = self
            .client
            .authorize_vpc_endpoint_access()
            .domain_name(domain_name)
            .account(account)
            .send()
            .await;

        match result {
            Ok(output) => {
                let principal = output
                    .authorized_principal()
                    .and_then(|p| to_domain_principal(p, domain_name))
                    .ok_or_else(|| {
                        OpenSearchOpsError::AwsSdkError(
                            "AuthorizeVpcEndpointAccess応答にプリンシパルが含まれていません"
                                .to_string(),
                        )
                    })?;

                info!(
                    domain_name = %domain_name,
                    principal = %principal.principal,
                    principal_type = %principal.principal_type,
                    "AuthorizeVpcEndpointAccess成功"
                );
                Ok(principal)
            }
            Err(err) => {
                let service_error = err.into_service_error();
                let error = classify(
                    service_error.is_resource_not_found_exception(),
                    service_error.is_validation_exception()
                        || service_error.is_limit_exceeded_exception()
                        || service_error.is_disabled_operation_exception()
                        || service_error.is_base_exception(),
                    service_error.to_string(),
                );
                warn!(
                    domain_name = %domain_name,
                    account = %account,
                    error = %error,
                    "AuthorizeVpcEndpointAccessエラー"
                );
                Err(error)
            }
        }
    }

    async fn list_access(
        &self,
        domain_name: &str,
    ) -> Result<Vec<AuthorizedPrincipal>, OpenSearchOpsError> {
        let client = &self.client;
        let principals = collect_pages(move |next_token: Option<String>| async move {
            let output = client
                .list_vpc_endpoint_access()
                .domain_name(domain_name)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|err| {
                    let service_error = err.into_service_error();
                    let error = classify(
                        service_error.is_resource_not_found_exception(),
                        service_error.is_disabled_operation_exception()
                            || service_error.is_base_exception(),
                        service_error.to_string(),
                    );
                    warn!(
                        domain_name = %domain_name,
                        error = %error,
                        "ListVpcEndpointAccessエラー"
                    );
                    error
                })?;

            let page: Vec<AuthorizedPrincipal> = output
                .authorized_principal_list()
                .iter()
                .filter_map(|p| to_domain_principal(p, domain_name))
                .collect();
            Ok::<_, OpenSearchOpsError>((page, output.next_token().to_string()))
        })
        .await?;

        debug!(
            domain_name = %domain_name,
            count = principals.len(),
            "ListVpcEndpointAccess成功"
        );
        Ok(principals)
    }

    async fn revoke_access(
        &self,
        domain_name: &str,
        account: &str,
    ) -> Result<(), OpenSearchOpsError> {
        info!(
            domain_name = %domain_name,
            account = %account,
            "RevokeVpcEndpointAccess開始"
        );

        let result = self
            .client
            .revoke_vpc_endpoint_access()
            .domain_name(domain_name)
            .account(account)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(
                    domain_name = %domain_name,
                    account = %account,
                    "RevokeVpcEndpointAccess成功"
                );
                Ok(())
            }
            Err(err) => {
                let service_error = err.into_service_error();
                let error = classify(
                    service_error.is_resource_not_found_exception(),
                    service_error.is_validation_exception()
                        || service_error.is_disabled_operation_exception()
                        || service_error.is_base_exception(),
                    service_error.to_string(),
                );
                warn!(
                    domain_name = %domain_name,
                    account = %account,
                    error = %error,
                    "RevokeVpcEndpointAccessエラー"
                );
                Err(error)
            }
        }
    }

    async fn get_domain_status(
        &self,
        domain_name: &str,
    ) -> Result<DomainStatus, OpenSearchOpsError> {
        let result = self
            .client
            .describe_domain()
            .domain_name(domain_name)
            .send()
            .await;

        match result {
            Ok(output) => {
                let status = output
                    .domain_status()
                    .map(|s| {
                        DomainStatus::from_flags(
                            s.processing().unwrap_or(false),
                            s.upgrade_processing().unwrap_or(false),
                        )
                    })
                    .ok_or_else(|| {
                        OpenSearchOpsError::AwsSdkError(
                            "DescribeDomain応答にドメイン状態が含まれていません".to_string(),
                        )
                    })?;

                debug!(
                    domain_name = %domain_name,
                    status = %status,
                    "ドメイン状態取得成功"
                );
                Ok(status)
            }
            Err(err) => {
                let service_error = err.into_service_error();
                let error = classify(
                    service_error.is_resource_not_found_exception(),
                    service_error.is_validation_exception() || service_error.is_base_exception(),
                    service_error.to_string(),
                );
                warn!(
                    domain_name = %domain_name,
                    error = %error,
                    "DescribeDomainエラー"
                );
                Err(error)
            }
        }
    }
}
