use super::Parser;

/// Session and token lifecycle service.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Settings file; defaults to settings/dev.toml or settings/release.toml.
    #[arg(long)]
    pub settings: Option<String>,
}
