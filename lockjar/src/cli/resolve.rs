//! Contains the logic for the `resolve` command.
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use lockjar_aio::{atomic_write_file_async, read_json_async, write_json_async};
use lockjar_common::catalog::Catalog;
use lockjar_common::dependency::Exclusion;
use lockjar_common::error::Result;
use lockjar_common::event::{ConsoleListener, ConsoleOptions, EventSink};
use lockjar_common::model::Coordinates;
use lockjar_common::Config;
use lockjar_core::lockfile;
use lockjar_core::resolve::{ResolutionRequest, Resolver, ResolverOptions, PHASE_WRITING};
use lockjar_core::rules::{render_rules, RuleSettings};
use tracing::{debug, info};

use super::join_error;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Repository snapshot (JSON) to resolve against.
    #[arg(long)]
    pub catalog: PathBuf,

    /// Root artifact, `group:artifact[:packaging[:classifier]]:version`.
    #[arg(long = "artifact", required = true)]
    pub artifacts: Vec<String>,

    /// Repository URL, in lookup order. Defaults to the configured
    /// repositories the catalog knows, else every catalog repository.
    #[arg(long = "repository")]
    pub repositories: Vec<String>,

    /// `group:artifact` to drop everywhere; `*` matches any part.
    #[arg(long = "exclude")]
    pub exclusions: Vec<String>,

    /// BOM whose managed versions pin matching artifacts.
    #[arg(long = "bom")]
    pub boms: Vec<String>,

    /// Where to write the lock file; printed to stdout when absent.
    #[arg(long)]
    pub lock_file: Option<PathBuf>,

    /// Where to write the import rules.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    #[arg(long, default_value = "maven")]
    pub repository_name: String,

    #[arg(long)]
    pub settings_label: Option<String>,

    /// Treat artifacts no repository has as an error.
    #[arg(long)]
    pub fail_on_missing: bool,
}

impl ResolveArgs {
    fn repositories(&self, config: &Config, catalog: &Catalog) -> Vec<String> {
        if !self.repositories.is_empty() {
            return self.repositories.clone();
        }
        let known = catalog.repository_urls();
        let configured: Vec<String> = config
            .repositories
            .iter()
            .filter(|r| known.contains(r))
            .cloned()
            .collect();
        if configured.is_empty() {
            known
        } else {
            configured
        }
    }

    fn request(&self, repositories: &[String]) -> Result<ResolutionRequest> {
        let mut request = ResolutionRequest::new();
        for repo in repositories {
            request.add_repository(repo.clone());
        }
        for raw in &self.artifacts {
            request.add_artifact(Coordinates::parse(raw)?, std::iter::empty::<Exclusion>());
        }
        for raw in &self.boms {
            request.add_bom(Coordinates::parse(raw)?);
        }
        for raw in &self.exclusions {
            request.exclude(Exclusion::parse(raw)?);
        }
        Ok(request)
    }

    pub async fn run(&self, config: &Config) -> Result<()> {
        let catalog = read_json_async::<Catalog>(&self.catalog).await?.normalize()?;
        let repositories = self.repositories(config, &catalog);
        let request = self.request(&repositories)?;
        debug!(
            "Resolving {} artifacts against {}",
            request.artifacts.len(),
            repositories.join(", ")
        );

        let mut options = ResolverOptions::from_config(config);
        options.missing_as_fatal |= self.fail_on_missing;
        let events = EventSink::new(Arc::new(ConsoleListener::new(ConsoleOptions {
            verbose: config.verbose,
        })));

        let resolver = Resolver::new(Arc::new(catalog), options, events.clone());
        let graph = tokio::task::spawn_blocking(move || resolver.resolve(&request))
            .await
            .map_err(join_error)??;

        events.phase(PHASE_WRITING);
        let doc = lockfile::render_graph(&repositories, &graph);
        match &self.lock_file {
            Some(path) => write_json_async(path, &doc).await?,
            None => print!("{}", lockfile::to_text(&doc)?),
        }

        if let Some(path) = &self.rules {
            let settings = RuleSettings {
                repository_name: self.repository_name.clone(),
                settings_label: self.settings_label.clone(),
            };
            let text = render_rules(&graph.dependency_infos(), &settings);
            atomic_write_file_async(path, text.into_bytes()).await?;
        }
        events.close();

        info!(
            "Resolved {} artifacts ({} conflicts, {} missing)",
            graph.nodes.len(),
            graph.conflicts.len(),
            graph.missing().count()
        );
        Ok(())
    }
}
