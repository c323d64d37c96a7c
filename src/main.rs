use anyhow::Context;
use clap::Parser;
use notion_rollup::utils::{logger, validation::Validate};
use notion_rollup::{
    CliArgs, HandlerFactory, LogFormat, NotionClient, ProcessorConfigSpec, ProcessorFactory,
    RollupEngine, RunConfig, RunSummary,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    if args.list {
        println!("Processors: {}", ProcessorFactory::available_processors().join(", "));
        println!("Handlers:   {}", HandlerFactory::available_handlers().join(", "));
        return Ok(());
    }

    // 初始化日誌
    match args.log_format {
        LogFormat::Compact => logger::init_cli_logger(args.verbose),
        LogFormat::Json => logger::init_json_logger(args.verbose),
    }

    tracing::info!("🚀 Starting notion-rollup");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = match RunConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.severity().exit_code());
    }

    display_config_summary(&config, args.dry_run);

    let client = NotionClient::new(&config.notion).context("building the Notion client")?;
    let engine = RollupEngine::new(client, config).with_dry_run(args.dry_run);

    match engine.run().await {
        Ok(summary) => display_run_summary(&summary)?,
        Err(e) => {
            tracing::error!(
                "❌ Rollup failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            std::process::exit(e.severity().exit_code());
        }
    }

    Ok(())
}

fn display_config_summary(config: &RunConfig, dry_run: bool) {
    println!("📋 Configuration Summary:");
    println!("  Database: {}", config.notion.database_id);
    println!("  API: {} ({})", config.notion.base_url(), config.notion.version());

    if let Some(handler_type) = &config.handler_type {
        println!("  Handler: {}", handler_type);
    } else {
        match &config.processor_config {
            Some(ProcessorConfigSpec::Single(processor)) => println!(
                "  Processor: {} over {}",
                processor.processor_type,
                processor.properties.join(", ")
            ),
            Some(ProcessorConfigSpec::Many(processors)) => {
                println!("  Processors:");
                for processor in processors {
                    println!(
                        "    - {} over {}",
                        processor.processor_type,
                        processor.properties.join(", ")
                    );
                }
            }
            None => println!("  Processor: sum over {}", config.target_props.join(", ")),
        }
    }

    if dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn display_run_summary(summary: &RunSummary) -> anyhow::Result<()> {
    let payload = serde_json::to_string_pretty(&summary.properties)?;

    if summary.dry_run {
        tracing::info!("✅ Dry run complete, no page was updated");
        println!("🔍 Would update {} page(s):", summary.target_page_ids.len());
    } else {
        tracing::info!("✅ Rollup completed successfully!");
        println!("✅ Updated {} page(s):", summary.target_page_ids.len());
    }

    for page_id in &summary.target_page_ids {
        println!("  - {}", page_id);
    }
    println!("📊 Aggregated {} source row(s) into:", summary.source_rows);
    println!("{}", payload);

    Ok(())
}
