use clap::{Parser, Subcommand};
use cloudmirror_lib::core::{EventChannel, SyncController, SyncEngine, SyncEvent, SyncOutcome};
use cloudmirror_lib::logging::{get_log_dir, LogConfig, SizeRotatingWriter};
use cloudmirror_lib::{dirs, storage, AppConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "cloudmirror")]
#[command(about = "Mirror a local folder into an object-storage bucket")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "CLOUDMIRROR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config file if it does not exist
    Init,
    /// Upload every file of the sync folder to the bucket
    Sync {
        /// Override the configured sync folder
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Override the configured bucket
        #[arg(long)]
        bucket: Option<String>,
        /// Override the configured region
        #[arg(long)]
        region: Option<String>,
        /// Print events and the final report as JSON lines
        #[arg(long)]
        json: bool,
    },
}

/// 初始化日志系统
fn init_logging(config: &LogConfig, log_dir: &Path) {
    if !config.enabled {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    let mut env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(config.tracing_level().into());
    for directive in ["opendal=warn", "hyper=warn", "reqwest=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    match SizeRotatingWriter::new(log_dir, config.max_size_bytes()) {
        Ok(file_writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false);

            // debug 构建同时输出到 stderr
            let console_layer = cfg!(debug_assertions).then(|| {
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
            });

            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(console_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        Err(e) => {
            // 文件日志创建失败，回退到控制台
            eprintln!("failed to open log directory {}: {}", log_dir.display(), e);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(dirs::default_config_path);

    let loaded = AppConfig::load_or_init(&config_path);
    let log_config = loaded.as_ref().map(|c| c.log.clone()).unwrap_or_default();
    init_logging(&log_config, &get_log_dir(&config_path));
    let config = loaded?;

    match cli.command {
        Commands::Init => {
            println!("config: {}", config_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sync {
            folder,
            bucket,
            region,
            json,
        } => {
            let mut config = config;
            if let Some(folder) = folder {
                config.sync.sync_folder = folder;
            }
            if let Some(bucket) = bucket {
                config.sync.bucket_name = bucket;
            }
            if let Some(region) = region {
                config.sync.region = region;
            }
            run_sync(config, json).await
        }
    }
}

/// 执行一次同步，Ctrl-C 时停止并等待当前文件上传完成
async fn run_sync(config: AppConfig, json: bool) -> anyhow::Result<ExitCode> {
    let store = storage::create_store(&config.sync, &config.engine)?;
    let (events, mut rx) = EventChannel::new();
    let engine = SyncEngine::new(config.sync.clone(), store)?
        .with_options(config.engine.clone())
        .with_progress_sink(Arc::new(events.clone()))
        .with_status_sink(Arc::new(events));
    let controller = SyncController::new(Arc::new(engine));

    let printer = tokio::spawn(async move {
        let mut done = 0u64;
        while let Some(event) = rx.recv().await {
            if json {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{}", line);
                }
                continue;
            }
            match event {
                SyncEvent::Progress(update) => done += update.increment,
                SyncEvent::Status { message } => println!("[{}] {}", done, message),
            }
        }
    });

    controller.start();
    let report = tokio::select! {
        report = controller.wait() => report,
        _ = tokio::signal::ctrl_c() => {
            info!("收到中断信号，等待当前文件上传完成...");
            controller.stop().await
        }
    };

    // 引擎释放后事件通道关闭，打印任务随之结束
    drop(controller);
    let _ = printer.await;

    let Some(report) = report else {
        return Ok(ExitCode::FAILURE);
    };

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "{} processed, {} uploaded, {} failed, {} bytes",
            report.files_processed, report.files_uploaded, report.files_failed, report.bytes_uploaded
        );
    }

    Ok(match report.outcome {
        SyncOutcome::Completed if report.files_failed == 0 => ExitCode::SUCCESS,
        SyncOutcome::Stopped => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}
