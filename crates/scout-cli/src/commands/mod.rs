//! Command implementations and dispatch logic.
//!
//! Query commands map onto one registry endpoint each. The request is built
//! and validated first, then run through a `RequestCoordinator`; whatever
//! happens, the outcome is printed as an envelope.

use std::collections::HashMap;
use std::time::Duration;

use camino::Utf8PathBuf;
use scout_config::{ConfigLayering, ConfigLoader, ConfigSource, ScoutConfig};
use scout_core::error::{ScoutError, ScoutResult};
use scout_core::types::{Envelope, Request};
use scout_registry::api::{self, Page, SearchQuery};
use scout_registry::{
    CoordinatorConfig, HttpUpstreamConfig, RegistrySettings, RequestCoordinator, RetryConfig,
};
use tracing::{debug, info};


use crate::output::OutputHandler;
use crate::{Commands, GlobalArgs, PageArgs, QueryCommand};

/// Shared context for all commands
pub struct CommandContext {
    pub output: OutputHandler,
    pub config: ScoutConfig,
    pub sources: Vec<ConfigSource>,
    /// Caller deadline for a whole query
    pub deadline: Option<Duration>,
}

impl CommandContext {
    /// Resolve configuration and set up output
    pub async fn load(global: &GlobalArgs) -> ScoutResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| ScoutError::io("Failed to get current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| ScoutError::ConfigValidation {
            field: "cwd".to_string(),
            reason: format!("current directory is not valid UTF-8: {}", e),
        })?;

        let (config, sources) = ConfigLoader::new(cwd)
            .load(
                global.config.as_deref(),
                &ConfigLayering::collect_env_overrides(),
                &cli_overrides(global),
            )
            .await?;

        for source in &sources {
            debug!(?source, "Loaded configuration layer");
        }

        Ok(Self {
            output: OutputHandler::new(global.compact),
            config,
            sources,
            deadline: global.deadline.map(Duration::from_secs),
        })
    }
}

/// Flags that override configuration keys
pub fn cli_overrides(global: &GlobalArgs) -> HashMap<String, String> {
    let mut overrides: HashMap<String, String> = global.overrides.iter().cloned().collect();
    if let Some(key) = &global.api_key {
        overrides.insert("api_key".to_string(), key.clone());
    }
    overrides
}

/// Dispatch a command to its handler; returns whether it succeeded
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> ScoutResult<bool> {
    match command {
        Commands::Config => {
            ctx.output.config(&ctx.config, &ctx.sources)?;
            Ok(true)
        }
        Commands::Query(query) => {
            let coordinator = RequestCoordinator::from_settings(&registry_settings(&ctx.config))?;
            let envelope = match build_request(&query) {
                Ok(request) => {
                    info!(path = request.path(), "Querying registry");
                    run_query(&coordinator, &request, ctx.deadline).await
                }
                Err(err) => Envelope::failure(&err),
            };

            ctx.output.envelope(&envelope)?;
            Ok(envelope.is_success())
        }
    }
}

/// Execute one request, bounded by the caller deadline when given
pub async fn run_query(
    coordinator: &RequestCoordinator,
    request: &Request,
    deadline: Option<Duration>,
) -> Envelope {
    match deadline {
        Some(limit) => coordinator.execute_with_timeout(request, limit).await,
        None => coordinator.execute(request).await,
    }
}

/// Translate the resolved configuration into access-layer settings
pub fn registry_settings(config: &ScoutConfig) -> RegistrySettings {
    RegistrySettings {
        upstream: HttpUpstreamConfig {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            api_key_query_param: config.api_key_query_param.clone(),
            timeout: config.timeout(),
            pool_max_idle_per_host: config.pool_max_idle_per_host,
            pool_idle_timeout: config.pool_idle_timeout(),
            ..HttpUpstreamConfig::default()
        },
        retry: RetryConfig {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
            max_retry_after: config.max_retry_after(),
            ..RetryConfig::default()
        },
        rate_limit_requests: config.rate_limit_requests,
        rate_limit_window: config.rate_limit_window(),
        cache_max_entries: config.cache_max_entries,
        coordinator: CoordinatorConfig {
            cache_ttl: config.cache_ttl(),
            coalesce_inflight: config.coalesce_inflight,
        },
    }
}

fn page(args: PageArgs) -> ScoutResult<Page> {
    Page::new(args.page, args.per_page)
}

/// Build the registry request for a query command
pub fn build_request(query: &QueryCommand) -> ScoutResult<Request> {
    match query {
        QueryCommand::Platforms => Ok(api::platforms()),
        QueryCommand::Project { platform, name } => api::project(platform, name),
        QueryCommand::Deps { platform, name, version } => {
            api::project_dependencies(platform, name, version.as_deref())
        }
        QueryCommand::Dependents { platform, name, page: p } => {
            api::project_dependents(platform, name, page(*p)?)
        }
        QueryCommand::DependentRepos { platform, name, page: p } => {
            api::project_dependent_repositories(platform, name, page(*p)?)
        }
        QueryCommand::Contributors { platform, name, page: p } => {
            api::project_contributors(platform, name, page(*p)?)
        }
        QueryCommand::Sourcerank { platform, name } => api::project_sourcerank(platform, name),
        QueryCommand::Search {
            query,
            platforms,
            languages,
            licenses,
            keywords,
            sort,
            page: p,
        } => api::search(&SearchQuery {
            query: query.clone(),
            platforms: platforms.clone(),
            languages: languages.clone(),
            licenses: licenses.clone(),
            keywords: keywords.clone(),
            sort: sort.clone(),
            page: page(*p)?,
        }),
        QueryCommand::Repo { host, url } => api::repository(*host, url),
        QueryCommand::RepoProjects { host, url, page: p } => {
            api::repository_projects(*host, url, page(*p)?)
        }
        QueryCommand::User { host, login } => api::user(*host, login),
        QueryCommand::UserRepos { host, login, page: p } => {
            api::user_repositories(*host, login, page(*p)?)
        }
        QueryCommand::UserProjects { host, login, page: p } => {
            api::user_projects(*host, login, page(*p)?)
        }
    }
}
