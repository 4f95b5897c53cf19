//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliOutputFormat, CliSize};
use crate::{
    config::{ClientConfig, ProviderId},
    types::{OutputFormat, SizeHint},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings resolved from CLI arguments
#[derive(Debug, Clone)]
pub(crate) struct CliSettings {
    pub(crate) client: ClientConfig,
    pub(crate) provider: ProviderId,
    pub(crate) size: SizeHint,
    pub(crate) format: OutputFormat,
}

/// Convert CLI arguments to library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build settings from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<CliSettings> {
        let provider = cli.provider.parse::<ProviderId>().map_err(|unknown| {
            anyhow::anyhow!(
                "Unknown provider '{}'. Available: {}",
                unknown,
                ProviderId::ALL.map(|p| p.as_str()).join(", ")
            )
        })?;

        let client = ClientConfig::builder()
            .request_timeout(Duration::from_secs(cli.timeout))
            .poll_interval(Duration::from_millis(cli.poll_interval_ms))
            .max_poll_attempts(cli.max_poll_attempts)
            .build()
            .context("Invalid client configuration")?;

        let size = match cli.size {
            CliSize::Auto => SizeHint::Auto,
            CliSize::Preview => SizeHint::Preview,
            CliSize::Full => SizeHint::Full,
        };
        let format = match cli.format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpg => OutputFormat::Jpg,
            CliOutputFormat::Webp => OutputFormat::Webp,
        };

        Ok(CliSettings {
            client,
            provider,
            size,
            format,
        })
    }

    /// Validate CLI arguments before any I/O
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.timeout == 0 {
            anyhow::bail!("Timeout must be at least 1 second");
        }
        if cli.poll_interval_ms == 0 {
            anyhow::bail!("Poll interval must be greater than zero");
        }
        if cli.input.is_none() && !cli.list_providers {
            anyhow::bail!("An input file, URL or '-' is required");
        }
        Ok(())
    }
}

/// Default output path for an input: `<stem>_nobg.<ext>` next to file inputs,
/// in the working directory for URLs
pub(crate) fn default_output_path(input: &str, format: OutputFormat) -> PathBuf {
    let is_url = input.starts_with("http://") || input.starts_with("https://");
    let (dir, stem) = if is_url {
        let stem = reqwest::Url::parse(input)
            .ok()
            .and_then(|url| {
                url.path_segments()?
                    .filter(|segment| !segment.is_empty())
                    .last()
                    .map(str::to_string)
            })
            .and_then(|segment| {
                Path::new(&segment)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "image".to_string());
        (PathBuf::from("."), stem)
    } else {
        let path = Path::new(input);
        let stem = path
            .file_stem()
            .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        (dir, stem)
    };

    dir.join(format!("{}_nobg.{}", stem, format.extension()))
}
