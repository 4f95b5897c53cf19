//! Remote background removal CLI tool
//!
//! Command-line interface for removing backgrounds through remove.bg, Clipdrop,
//! Replicate or Hugging Face.

#[cfg(feature = "cli")]
use bgremove_remote::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
