// lockjar-common/src/config.rs
use std::env;
use std::path::PathBuf;

use directories::UserDirs;
use tracing::debug;

use super::error::{LockjarError, Result};

const DEFAULT_REPOSITORY: &str = "https://repo1.maven.org/maven2/";
const HOME_DIR_NAME: &str = ".lockjar";
const MAX_DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub home: PathBuf,
    pub repositories: Vec<String>,
    pub workers: usize,
    /// Surfaces the detail attached to log events on the console.
    pub verbose: bool,
    pub missing_as_fatal: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading lockjar configuration");

        let home = match env::var("LOCKJAR_HOME").ok().filter(|s| !s.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let user_home = UserDirs::new()
                    .map(|ud| ud.home_dir().to_path_buf())
                    .ok_or_else(|| {
                        LockjarError::Config(
                            "could not determine the user home directory; set LOCKJAR_HOME"
                                .to_string(),
                        )
                    })?;
                user_home.join(HOME_DIR_NAME)
            }
        };
        debug!("Effective LOCKJAR_HOME set to: {}", home.display());

        let repositories = match env::var("LOCKJAR_REPOSITORIES") {
            Ok(list) if !list.trim().is_empty() => parse_repository_list(&list),
            _ => vec![DEFAULT_REPOSITORY.to_string()],
        };

        let workers = match env::var("LOCKJAR_WORKERS") {
            Ok(raw) => raw.parse::<usize>().map_err(|e| {
                LockjarError::Config(format!("LOCKJAR_WORKERS must be a number, got '{raw}': {e}"))
            })?,
            Err(_) => default_worker_count(),
        }
        .max(1);

        let verbose = env_flag("LOCKJAR_VERBOSE");
        let missing_as_fatal = env_flag("LOCKJAR_MISSING_FATAL");

        debug!(
            "Configuration loaded: {} repositories, {} workers",
            repositories.len(),
            workers
        );
        Ok(Self {
            home,
            repositories,
            workers,
            verbose,
            missing_as_fatal,
        })
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home.join("logs")
    }
}

pub fn default_worker_count() -> usize {
    std::cmp::max(1, num_cpus::get_physical().saturating_sub(1)).min(MAX_DEFAULT_WORKERS)
}

fn parse_repository_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
