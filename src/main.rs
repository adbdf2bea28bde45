use clap::Parser;
use img2base::utils::error::{ErrorSeverity, Img2BaseError};
use img2base::utils::{logger, validation::Validate};
use img2base::{CliConfig, ConversionPipeline, Img2BaseEngine, LocalStorage, Settings};

fn exit_code(e: &Img2BaseError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: &Img2BaseError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("{}", logger::status_message(&format!("Error: {}", e.user_friendly_message())));
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let settings = match Settings::resolve(&cli) {
        Ok(settings) => settings,
        Err(e) => fail(&e),
    };

    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    let writes_to_disk = settings.output_path.is_some();
    let pipeline = match ConversionPipeline::new(LocalStorage::current_dir(), settings) {
        Ok(pipeline) => pipeline,
        Err(e) => fail(&e),
    };
    let engine = Img2BaseEngine::new(pipeline);

    match engine.run().await {
        Ok(result) => {
            for failure in &result.report.failures {
                eprintln!("⚠️ {}: {}", failure.source, failure.error);
            }

            if writes_to_disk {
                tracing::info!("📁 Output saved to: {}", result.output);
            } else {
                println!("{}", result.output);
            }
            eprintln!("{}", logger::status_message("Encoding succeeded"));

            if result.report.failed() > 0 {
                std::process::exit(1);
            }
        }
        Err(e) => fail(&e),
    }

    Ok(())
}
