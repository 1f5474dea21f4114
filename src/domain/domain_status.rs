//! ドメイン状態と整定待機の状態機械
//!
//! 変更系API呼び出しの直後はProcessingとみなし、
//! ポーリングで得た状態のみで遷移する。

/// DescribeDomainから得たドメインの設定反映状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainStatus {
    /// 設定変更を反映中
    Processing,
    /// 変更反映済み
    Active,
}

impl DomainStatus {
    /// DescribeDomainのフラグから状態を判定する
    ///
    /// `processing`と`upgrade_processing`のどちらかがtrueならProcessing。
    pub fn from_flags(processing: bool, upgrade_processing: bool) -> Self {
        if processing || upgrade_processing {
            DomainStatus::Processing
        } else {
            DomainStatus::Active
        }
    }
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainStatus::Processing => write!(f, "processing"),
            DomainStatus::Active => write!(f, "active"),
        }
    }
}

/// 整定待機の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleState {
    Processing,
    Active,
    Failed,
}

impl SettleState {
    /// 変更系API呼び出し直後の初期状態
    pub fn initial() -> Self {
        SettleState::Processing
    }

    /// ポーリング結果で遷移する
    ///
    /// 終端状態（Active / Failed）からは遷移しない。
    pub fn on_status(self, status: DomainStatus) -> Self {
        match (self, status) {
            (SettleState::Processing, DomainStatus::Active) => SettleState::Active,
            (SettleState::Processing, DomainStatus::Processing) => SettleState::Processing,
            (terminal, _) => terminal,
        }
    }

    /// タイムアウトまたは致命的なポーリングエラー
    pub fn on_failure(self) -> Self {
        match self {
            SettleState::Processing => SettleState::Failed,
            terminal => terminal,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SettleState::Processing)
    }
}
