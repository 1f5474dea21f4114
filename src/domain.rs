// ドメイン層モジュール
pub mod authorization_request;
pub mod authorized_principal;
pub mod domain_status;
pub mod resource_identifier;

// 再エクスポート
pub use authorization_request::{AuthorizationRequest, ValidationError};
pub use authorized_principal::{AuthorizedPrincipal, PrincipalType};
pub use domain_status::{DomainStatus, SettleState};
pub use resource_identifier::ResourceIdentifier;
