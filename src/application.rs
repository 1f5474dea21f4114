// アプリケーション層モジュール
pub mod principal_access_reconciler;
pub mod settle_waiter;

// 再エクスポート
pub use principal_access_reconciler::{
    AppliedPrincipal, DeleteOutcome, Operation, PrincipalAccessReconciler, ReconcilerError,
    RefreshOutcome,
};
pub use settle_waiter::{SettleError, SettleOutcome, wait_for_domain_active};
