//! Contains the logic for the `pack` command.
use std::path::PathBuf;

use clap::Args;
use lockjar_common::error::Result;
use tracing::info;

use super::join_error;

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Archive to write.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Files and directories to include. Directories contribute their contents.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

impl PackArgs {
    pub async fn run(&self) -> Result<()> {
        let output = self.output.clone();
        let inputs = self.inputs.clone();
        tokio::task::spawn_blocking(move || lockjar_aio::pack(&output, &inputs))
            .await
            .map_err(join_error)??;
        info!("Wrote {}", self.output.display());
        Ok(())
    }
}
