//! CaviRisk: cardiovascular mortality risk from CAVI and blood markers.
//!
//! Command-line entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cavirisk::adapters::sanitize::SanitizingMakeWriter;
use cavirisk::application::{DefaultRiskCalculator, RiskProgress, RiskWorker};
use cavirisk::config::RiskConfig;
use cavirisk::domain::{ModelPerformance, INPUT_FIELDS};
use cavirisk::{PatientInput, RiskResult};

#[derive(Parser)]
#[command(name = "cavirisk")]
#[command(about = "Cardiovascular mortality risk from CAVI, ABI and blood markers", long_about = None)]
struct Cli {
    /// Directory holding the exported models (overrides CAVIRISK_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate risk for one patient
    Assess(PatientArgs),

    /// Show which engine is active and what it expects
    Info,
}

/// Raw form values; parsed the same way as the web form.
#[derive(Args)]
struct PatientArgs {
    /// Age in years
    #[arg(long)]
    age: Option<String>,

    /// Sex (0 = female, 1 = male)
    #[arg(long)]
    sex: Option<String>,

    /// Mean cardio-ankle vascular index
    #[arg(long)]
    cavi_mean: Option<String>,

    /// Mean ankle-brachial index
    #[arg(long)]
    abi_mean: Option<String>,

    /// Hematocrit (%)
    #[arg(long)]
    hct: Option<String>,

    /// Hemoglobin (g/dL)
    #[arg(long)]
    hb: Option<String>,
}

impl PatientArgs {
    fn fields(&self) -> [(&str, &str); 6] {
        let values = [
            &self.age,
            &self.sex,
            &self.cavi_mean,
            &self.abi_mean,
            &self.hct,
            &self.hb,
        ];
        let mut fields = [("", ""); 6];
        for (slot, (name, value)) in fields.iter_mut().zip(INPUT_FIELDS.iter().zip(values)) {
            *slot = (*name, value.as_deref().unwrap_or(""));
        }
        fields
    }
}

fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // stdout carries results; logs go to stderr unless a file is requested.
    let log_mode = std::env::var("CAVIRISK_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, guard) = if log_mode == "file" {
        let log_file =
            std::env::var("CAVIRISK_LOG_FILE").unwrap_or_else(|_| "cavirisk.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("opening log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    Ok(guard)
}

fn main() -> Result<()> {
    let _guard = init_logging()?;
    let cli = Cli::parse();

    let mut config = RiskConfig::from_env()?;
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }
    tracing::info!("Starting CaviRisk (models: {})", config.model_dir.display());

    let calculator = Arc::new(DefaultRiskCalculator::from_config(&config));

    match cli.command {
        Commands::Assess(args) => {
            let input = PatientInput::from_form(args.fields())?;
            if input.has_non_finite() {
                tracing::warn!("Patient input contains non-numeric values");
                eprintln!("Warning: some values are not numbers; scores will not be meaningful.");
            }
            let result = RiskWorker::spawn(Arc::clone(&calculator), input)
                .wait_with(|progress| {
                    if !cli.json {
                        match progress {
                            RiskProgress::Initializing => eprintln!("Loading risk models..."),
                            RiskProgress::Calculating => eprintln!("Calculating risk..."),
                            _ => {}
                        }
                    }
                })
                .map_err(anyhow::Error::msg)?;

            if cli.json {
                print_json_result(&calculator, &result)?;
            } else {
                print_result(&calculator, &result);
            }
        }
        Commands::Info => {
            calculator.initialize()?;
            if cli.json {
                let info = serde_json::json!({
                    "mode": calculator.mode_info(),
                    "features": calculator
                        .feature_descriptions()
                        .iter()
                        .map(|(name, description)| serde_json::json!({ "name": name, "description": description }))
                        .collect::<Vec<_>>(),
                    "performance": calculator.model_performance(),
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&calculator);
            }
        }
    }

    Ok(())
}

fn print_json_result(calculator: &DefaultRiskCalculator, result: &RiskResult) -> Result<()> {
    let output = serde_json::json!({
        "result": result,
        "assessment": result.assessment(),
        "mode": calculator.mode_info(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_result(calculator: &DefaultRiskCalculator, result: &RiskResult) {
    let assessment = result.assessment();
    let mode = calculator.mode_info();

    println!("10-Year Mortality Risk: {:.1}%", result.binary_risk * 100.0);
    println!("  {}: {}", assessment.mortality, assessment.mortality.recommendation());
    println!();
    println!("Long-term Risk Profile: {:.1}/100", result.survival_risk);
    println!("  {}: {}", assessment.profile, assessment.profile.recommendation());
    println!();
    println!("Clinical Recommendation");
    println!("  {}", assessment.protocol.recommendation());
    println!();
    println!("Mode: {} ({})", mode.mode, mode.description);
    println!("  {}", result.model_versions.binary);
    println!("  {}", result.model_versions.survival);
    if let Some(confidence) = result.confidence {
        println!(
            "  Confidence: {:.0}% / {:.0}%",
            confidence.binary * 100.0,
            confidence.survival * 100.0
        );
    }
    println!("Calculated at {}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
}

fn print_info(calculator: &DefaultRiskCalculator) {
    let mode = calculator.mode_info();
    println!("Mode: {} ({})", mode.mode, mode.description);
    for model in &mode.models {
        println!("  {model}");
    }

    println!();
    println!("Features:");
    for (name, description) in calculator.feature_descriptions() {
        println!("  {name:<22} {description}");
    }

    let ModelPerformance { binary, survival } = calculator.model_performance();
    println!();
    println!("Performance:");
    println!(
        "  Binary: AUC {:.3}, accuracy {:.2}, sensitivity {:.2}, specificity {:.2}",
        binary.auc, binary.accuracy, binary.sensitivity, binary.specificity
    );
    println!("  Survival: C-index {:.4} ({})", survival.c_index, survival.description);
}
