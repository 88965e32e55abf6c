//! Contains the logic for the `outdated` command.
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use lockjar_aio::{read_json_async, read_to_string_async};
use lockjar_common::catalog::Catalog;
use lockjar_common::error::Result;
use lockjar_common::event::{ConsoleListener, ConsoleOptions, EventSink};
use lockjar_common::Config;
use lockjar_core::outdated::check_outdated;
use tracing::debug;

use super::{join_error, read_lines};

#[derive(Args, Debug)]
pub struct OutdatedArgs {
    /// Repository snapshot (JSON) to query.
    #[arg(long)]
    pub catalog: PathBuf,

    /// File with one artifact coordinate per line.
    #[arg(long)]
    pub artifacts: PathBuf,

    /// File with one repository URL per line.
    #[arg(long)]
    pub repositories: PathBuf,
}

impl OutdatedArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let catalog = read_json_async::<Catalog>(&self.catalog).await?.normalize()?;
        let artifacts = read_lines(&read_to_string_async(&self.artifacts).await?);
        let repositories = read_lines(&read_to_string_async(&self.repositories).await?);
        debug!(
            "Checking {} artifacts against {} repositories",
            artifacts.len(),
            repositories.len()
        );

        let events = EventSink::new(Arc::new(ConsoleListener::new(ConsoleOptions {
            verbose: config.verbose,
        })));
        let sink = events.clone();
        let report = tokio::task::spawn_blocking(move || {
            check_outdated(&artifacts, &repositories, &catalog, &sink)
        })
        .await
        .map_err(join_error)??;
        events.close();

        print!("{report}");
        Ok(())
    }
}
