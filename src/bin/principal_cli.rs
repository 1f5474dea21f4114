/// 認可済みプリンシパル管理CLI
///
/// Lambdaと同じライフサイクル操作をローカルから実行する。
/// 結果をJSONで標準出力に書き出す。Ctrl-Cで整定待機をキャンセルする。
///
/// # ローカル実行
/// ```bash
/// # 認可
/// cargo run --bin principal_cli -- authorize --domain-name logs-prod --account 123456789012
///
/// # 取得
/// cargo run --bin principal_cli -- read --domain-name logs-prod \
///     --id authorized-principal-123456789012-ACCOUNT-logs-prod
///
/// # 取り消し（タイムアウト指定）
/// cargo run --bin principal_cli -- --timeout-secs 300 revoke --domain-name logs-prod --account 123456789012
/// ```
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use vpc_endpoint_principal::application::{Operation, PrincipalAccessReconciler, ReconcilerError};
use vpc_endpoint_principal::domain::{AuthorizationRequest, ResourceIdentifier};
use vpc_endpoint_principal::infrastructure::{
    AwsOpenSearchOps, LogFormat, ReconcilerConfig, init_logging_with_format,
};

/// コマンドライン引数
#[derive(Parser, Debug)]
#[command(name = "principal_cli")]
#[command(about = "OpenSearch VPCエンドポイントの認可済みプリンシパルを管理")]
struct CliArgs {
    /// 整定待機タイムアウト秒数（環境変数の設定より優先される）
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// ポーリング間隔秒数（環境変数の設定より優先される）
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// アカウントを認可する
    Authorize {
        #[arg(long)]
        domain_name: String,
        #[arg(long)]
        account: String,
    },
    /// 識別子に一致するプリンシパルを取得する
    Read {
        #[arg(long)]
        domain_name: String,
        #[arg(long)]
        id: String,
    },
    /// アカウントの認可を取り消す
    Revoke {
        #[arg(long)]
        domain_name: String,
        #[arg(long)]
        account: String,
    },
}

impl CliArgs {
    /// 環境変数の設定にコマンドライン引数を重ねる
    fn config(&self, base: ReconcilerConfig) -> ReconcilerConfig {
        let timeout = self.timeout_secs.map(Duration::from_secs);
        let interval = self
            .poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(base.create_policy().poll_interval);

        ReconcilerConfig::new(
            timeout.unwrap_or(base.create_policy().timeout),
            timeout.unwrap_or(base.update_policy().timeout),
            timeout.unwrap_or(base.delete_policy().timeout),
            interval,
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging_with_format(LogFormat::Compact);

    let args = CliArgs::parse();
    let base = match ReconcilerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "リコンサイラー設定読み込み失敗");
            return ExitCode::FAILURE;
        }
    };

    let ops = Arc::new(AwsOpenSearchOps::from_config().await);
    let reconciler = PrincipalAccessReconciler::new(ops, args.config(base));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("中断シグナルを受信、キャンセルします");
            trigger.cancel();
        }
    });

    match run(&reconciler, args.command, &cancel).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error_kind = err.kind(), error = %err, "操作失敗");
            let output = json!({ "error_kind": err.kind(), "error_message": err.to_string() });
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

async fn run(
    reconciler: &PrincipalAccessReconciler<AwsOpenSearchOps>,
    command: Command,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, ReconcilerError> {
    match command {
        Command::Authorize {
            domain_name,
            account,
        } => {
            let request = AuthorizationRequest::new(domain_name, account).map_err(|source| {
                ReconcilerError::Validation {
                    operation: Operation::Create,
                    source,
                }
            })?;
            let applied = reconciler.create(&request, cancel).await?;
            Ok(json!({ "id": applied.identifier, "principal": applied.principal }))
        }
        Command::Read { domain_name, id } => {
            let identifier = ResourceIdentifier::from_stored(id);
            let principal = reconciler.read(&domain_name, &identifier).await?;
            Ok(json!({ "id": identifier, "principal": principal }))
        }
        Command::Revoke {
            domain_name,
            account,
        } => {
            let request = AuthorizationRequest::new(domain_name, account).map_err(|source| {
                ReconcilerError::Validation {
                    operation: Operation::Delete,
                    source,
                }
            })?;
            let outcome = reconciler.delete(&request, cancel).await?;
            Ok(json!({ "outcome": outcome }))
        }
    }
}
