/// 認可済みプリンシパル
///
/// リモートの一覧取得で返されるレコード。ローカルでは変更しない。
use serde::{Deserialize, Serialize};

use super::resource_identifier::ResourceIdentifier;

/// プリンシパル種別
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrincipalType {
    /// AWSアカウント
    Account,
    /// AWSサービス
    Service,
    /// 未知の種別
    Other(String),
}

impl PrincipalType {
    /// 識別子に埋め込む文字列表現
    pub fn as_str(&self) -> &str {
        match self {
            PrincipalType::Account => "ACCOUNT",
            PrincipalType::Service => "SERVICE",
            PrincipalType::Other(s) => s,
        }
    }
}

impl From<&str> for PrincipalType {
    fn from(s: &str) -> Self {
        // AWS APIはAWS_ACCOUNT / AWS_SERVICEを返す
        match s.to_uppercase().as_str() {
            "ACCOUNT" | "AWS_ACCOUNT" => PrincipalType::Account,
            "SERVICE" | "AWS_SERVICE" => PrincipalType::Service,
            _ => PrincipalType::Other(s.to_string()),
        }
    }
}

impl std::fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for PrincipalType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PrincipalType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(PrincipalType::from(s.as_str()))
    }
}

/// ドメインに対して認可されたプリンシパル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedPrincipal {
    /// プリンシパル（アカウントIDまたはサービス名）
    pub principal: String,
    /// プリンシパル種別
    pub principal_type: PrincipalType,
    /// 対象ドメイン名
    pub domain_name: String,
}

impl AuthorizedPrincipal {
    pub fn new(
        principal: impl Into<String>,
        principal_type: PrincipalType,
        domain_name: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            principal_type,
            domain_name: domain_name.into(),
        }
    }

    /// このレコードのリソース識別子を導出する
    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::derive(&self.principal, &self.principal_type, &self.domain_name)
    }
}
