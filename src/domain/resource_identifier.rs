/// リソース識別子
///
/// `authorized-principal-{principal}-{principal_type}-{domain_name}`の形式で
/// 決定的に導出される。宣言状態とリモート状態の突き合わせに使う。
use serde::{Deserialize, Serialize};

use super::authorized_principal::PrincipalType;

/// 識別子のプレフィックス
const PREFIX: &str = "authorized-principal";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceIdentifier(String);

impl ResourceIdentifier {
    /// プリンシパル、種別、ドメイン名から識別子を導出する
    pub fn derive(principal: &str, principal_type: &PrincipalType, domain_name: &str) -> Self {
        Self(format!(
            "{}-{}-{}-{}",
            PREFIX,
            principal,
            principal_type.as_str(),
            domain_name
        ))
    }

    /// 保存済みの識別子文字列から復元する（フレームワークが永続化した値）
    pub fn from_stored(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ResourceIdentifier> for String {
    fn from(id: ResourceIdentifier) -> Self {
        id.0
    }
}
