/// VPCエンドポイントアクセス認可リクエスト
///
/// 宣言された設定（ドメイン名とアカウントID）を保持する。
/// 一度作成したら変更しない。
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 入力検証エラー
///
/// リモート呼び出しの前に検出される。リトライ対象外。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// 必須フィールドが空
    #[error("必須フィールドが空です: {0}")]
    EmptyField(&'static str),
}

/// ドメインとプリンシパルの組を表す認可リクエスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    domain_name: String,
    account: String,
}

impl AuthorizationRequest {
    /// 検証済みのリクエストを作成する
    ///
    /// 前後の空白は除去してから検証する。
    ///
    /// # エラー
    /// `domain_name`または`account`が空の場合は`ValidationError::EmptyField`
    pub fn new(
        domain_name: impl Into<String>,
        account: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let request = Self {
            domain_name: domain_name.into().trim().to_string(),
            account: account.into().trim().to_string(),
        };
        request.validate()?;
        Ok(request)
    }

    /// 必須フィールドを検証する
    ///
    /// デシリアライズで作られた値は`new`を経由しないため、
    /// 呼び出し側はリモート呼び出し前にこれを実行する。
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.domain_name.trim().is_empty() {
            return Err(ValidationError::EmptyField("domain_name"));
        }
        if self.account.trim().is_empty() {
            return Err(ValidationError::EmptyField("account"));
        }
        Ok(())
    }

    /// ドメイン名を取得
    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// アカウントIDを取得
    pub fn account(&self) -> &str {
        &self.account
    }
}
