use birthday_etl::adapters::build_notifier;
use birthday_etl::config::LogFormat;
use birthday_etl::core::report;
use birthday_etl::utils::{logger, validation::Validate};
use birthday_etl::{BirthdayPipeline, CliConfig, EtlEngine, EtlError, LocalStorage, TomlConfig};
use clap::Parser;

fn exit_with(e: &EtlError) -> ! {
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 初始化日誌
    match args.log_format {
        LogFormat::Compact => logger::init_cli_logger(args.verbose),
        LogFormat::Json => logger::init_json_logger(args.verbose),
    }

    tracing::info!("Starting birthday-etl");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    // 載入並驗證配置
    let config = match TomlConfig::from_file(&args.config).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            exit_with(&e);
        }
    };

    tracing::info!("📋 Pipeline: {} v{}", config.pipeline.name, config.pipeline.version);
    if let Some(description) = &config.pipeline.description {
        tracing::info!("📝 {}", description);
    }
    tracing::info!("📄 Source: {}", config.source.path);
    tracing::info!(
        "📁 Output: {} ({})",
        config.load.output_path,
        config.load.output_formats.join(", ")
    );

    let notifier = match build_notifier(&config, args.dry_run) {
        Ok(notifier) => notifier,
        Err(e) => {
            tracing::error!("❌ Cannot set up notifications: {}", e);
            exit_with(&e);
        }
    };

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let run_date = args.date.unwrap_or_else(|| config.today());

    let pipeline = BirthdayPipeline::new(LocalStorage::default(), config, notifier);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run(run_date).await {
        Ok(run_report) => {
            tracing::info!("✅ Birthday run completed successfully!");
            println!("{}", report::render(&run_report));
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Birthday run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            exit_with(&e);
        }
    }
}
