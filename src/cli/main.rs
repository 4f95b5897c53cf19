//! Remote background removal CLI
//!
//! Sends one image to a provider and writes the result to a file or stdout.

use super::config::{default_output_path, CliConfigBuilder};
use crate::{
    config::{ProviderId, ProviderInfo},
    error::ErrorKind,
    lifecycle::ImageLifecycleController,
    registry::ProviderRegistry,
    services::{StatusSink, StatusUpdate, TracingStatusSink},
    types::{ImageSource, JobState, JobStatus, OutputFormat, ProcessingResult},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Remove image backgrounds through remote services
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-remote")]
pub struct Cli {
    /// Input image file or http(s) URL (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present = "list_providers")]
    pub input: Option<String>,

    /// Output file. Use "-" for stdout [default: <stem>_nobg.<ext>, stdout for stdin input]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Provider (removebg, clipdrop, replicate, huggingface)
    #[arg(short, long, default_value = "removebg")]
    pub provider: String,

    /// API key for the selected provider
    #[arg(short = 'k', long, env = "BGREMOVE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Requested output resolution
    #[arg(long, value_enum, default_value_t = CliSize::Auto)]
    pub size: CliSize,

    /// Preferred output format; default file names follow the returned image
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Delay between job status checks for asynchronous providers (milliseconds)
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Maximum number of job status checks before giving up
    #[arg(long, default_value_t = 120)]
    pub max_poll_attempts: u32,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// List available providers and exit
    #[arg(long)]
    pub list_providers: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliSize {
    Auto,
    Preview,
    Full,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpg,
    Webp,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli).context("Failed to initialize tracing")?;

    if cli.list_providers {
        print_providers();
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let settings = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let input = cli
        .input
        .as_deref()
        .context("An input file, URL or '-' is required")?;

    let source = read_source(input).await?;
    info!(
        provider = settings.provider.as_str(),
        source = %source.describe(),
        "Starting background removal"
    );

    let registry = Arc::new(
        ProviderRegistry::builder()
            .config(settings.client.clone())
            .providers([settings.provider])
            .build()
            .context("Failed to create provider registry")?,
    );
    let spinner = create_spinner();
    let sink = Arc::new(CliStatusSink::new(spinner.clone(), cli.verbose > 0));
    let controller = ImageLifecycleController::new(registry, sink)
        .with_request_options(settings.size, settings.format);

    let credential = cli.api_key.clone().unwrap_or_default();
    let job = controller
        .submit(source, settings.provider.as_str(), &credential)
        .await
        .context("Failed to process image")?;

    let outcome = match job.state() {
        JobState::Success(result) => {
            write_output(cli.output.as_deref(), input, settings.format, result).await
        },
        JobState::Error(error) => {
            let mut message = error.message().to_string();
            if error.kind() == ErrorKind::MissingCredential {
                let info = ProviderInfo::for_provider(settings.provider);
                message.push_str(&format!(
                    ". Pass --api-key or set BGREMOVE_API_KEY (get a key at {})",
                    info.signup_url
                ));
            }
            Err(anyhow::anyhow!(message))
                .with_context(|| format!("Background removal failed ({})", error.kind()))
        },
        JobState::Idle | JobState::Processing => {
            Err(anyhow::anyhow!("Image job ended in unexpected state {}", job.status()))
        },
    };

    controller.discard(job.id());
    outcome
}

fn init_tracing(cli: &Cli) -> Result<()> {
    use crate::tracing_config::{TracingConfig, TracingFormat};

    let format = match cli.log_format {
        CliLogFormat::Console => TracingFormat::Console,
        CliLogFormat::Compact => TracingFormat::Compact,
        #[cfg(feature = "tracing-json")]
        CliLogFormat::Json => TracingFormat::Json,
    };

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(format)
        .with_session_id(uuid::Uuid::new_v4().to_string())
        .init()
        .context("Failed to initialize tracing subscriber")?;

    debug!(verbosity = cli.verbose, "Tracing initialized");
    Ok(())
}

/// Print the provider catalog
fn print_providers() {
    println!("Available providers:");
    for info in ProviderInfo::catalog() {
        println!();
        println!("  {} ({})", info.name, info.id);
        println!("    {}", info.description);
        println!("    Free quota: {}", info.free_quota);
        println!("    Pricing:    {}", info.pricing);
        println!("    Docs:       {}", info.doc_url);
        println!("    Sign up:    {}", info.signup_url);
    }
    println!();
    println!(
        "Default provider: {}. Set the API key with --api-key or BGREMOVE_API_KEY.",
        ProviderId::RemoveBg
    );
}

/// Turn the positional input into an image source
async fn read_source(input: &str) -> Result<ImageSource> {
    if input == "-" {
        info!("Reading image from stdin");
        return Ok(ImageSource::from_bytes(read_stdin()?));
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        return Ok(ImageSource::from_url(input));
    }
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read input file: {}", input))?;
    Ok(ImageSource::from_bytes(data))
}

/// Read image data from stdin
fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read image data from stdin")?;

    if buffer.is_empty() {
        anyhow::bail!("No data received from stdin");
    }

    Ok(buffer)
}

/// Write image data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    io::stdout()
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    io::stdout().flush().context("Failed to flush stdout")?;
    Ok(())
}

async fn write_output(
    output: Option<&str>,
    input: &str,
    format: OutputFormat,
    result: &ProcessingResult,
) -> Result<()> {
    // Providers answer with their own encoding, so default names follow the bytes
    let received = result.format().and_then(OutputFormat::from_image_format);
    if let Some(actual) = received.filter(|actual| *actual != format) {
        warn!(
            requested = format.extension(),
            received = actual.extension(),
            "Provider returned a different image format than requested"
        );
    }

    let path = match output {
        Some("-") => None,
        Some(path) => Some(std::path::PathBuf::from(path)),
        None if input == "-" => None,
        None => Some(default_output_path(input, received.unwrap_or(format))),
    };

    match path {
        None => {
            write_stdout(result.data())?;
            info!("Image written to stdout");
        },
        Some(path) => {
            result
                .save(&path)
                .await
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            info!(
                "✅ Saved {} ({} bytes, {}ms)",
                path.display(),
                result.data().len(),
                result.metadata().duration_ms
            );
        },
    }

    if let Some(credits) = result.metadata().credits_charged {
        info!(credits, "Credits charged");
    }
    if let Some(remaining) = result.metadata().remaining_credits {
        info!(remaining, "Credits remaining");
    }
    Ok(())
}

fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Status sink driving the terminal spinner
struct CliStatusSink {
    spinner: ProgressBar,
    tracing: TracingStatusSink,
}

impl CliStatusSink {
    fn new(spinner: ProgressBar, verbose: bool) -> Self {
        Self {
            spinner,
            tracing: TracingStatusSink::new(verbose),
        }
    }
}

impl StatusSink for CliStatusSink {
    fn status_changed(&self, update: StatusUpdate) {
        match update.status {
            JobStatus::Success | JobStatus::Error => self.spinner.finish_and_clear(),
            JobStatus::Idle | JobStatus::Processing => self.spinner.set_message(update.message.clone()),
        }
        self.tracing.status_changed(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ProviderId,
        services::ArtifactStore,
        types::ResultMetadata,
    };
    use bytes::Bytes;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "bgremove-remote",
            "cat.jpg",
            "-p",
            "clipdrop",
            "-k",
            "abc",
            "--size",
            "full",
            "-f",
            "webp",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.input.as_deref(), Some("cat.jpg"));
        assert_eq!(cli.provider, "clipdrop");
        assert_eq!(cli.api_key.as_deref(), Some("abc"));
        assert_eq!(cli.size, CliSize::Full);
        assert_eq!(cli.format, CliOutputFormat::Webp);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.max_poll_attempts, 120);
    }

    #[test]
    fn test_input_required_unless_listing() {
        assert!(Cli::try_parse_from(["bgremove-remote"]).is_err());
        let cli = Cli::try_parse_from(["bgremove-remote", "--list-providers"]).unwrap();
        assert!(cli.list_providers);
        assert!(cli.input.is_none());
    }

    #[tokio::test]
    async fn test_read_source_variants() {
        let url = read_source("https://example.com/cat.png").await.unwrap();
        assert_eq!(url.as_url(), Some("https://example.com/cat.png"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();
        let file = read_source(path.to_str().unwrap()).await.unwrap();
        assert_eq!(file.as_bytes().map(|b| b.as_ref()), Some(PNG_MAGIC));

        assert!(read_source(dir.path().join("missing.png").to_str().unwrap())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_write_output_to_file() {
        let store = ArtifactStore::new();
        let result = ProcessingResult::new(
            Bytes::from_static(PNG_MAGIC),
            &store,
            ResultMetadata::new(ProviderId::RemoveBg, 5),
        );
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.png");

        write_output(Some(out.to_str().unwrap()), "cat.jpg", OutputFormat::Png, &result)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), PNG_MAGIC);
    }

    #[tokio::test]
    async fn test_default_output_named_after_received_format() {
        let store = ArtifactStore::new();
        let result = ProcessingResult::new(
            Bytes::from_static(PNG_MAGIC),
            &store,
            ResultMetadata::new(ProviderId::Clipdrop, 5),
        );
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cat.png");

        write_output(None, input.to_str().unwrap(), OutputFormat::Jpg, &result)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("cat_nobg.png")).unwrap(),
            PNG_MAGIC
        );
        assert!(!dir.path().join("cat_nobg.jpg").exists());
    }
}
