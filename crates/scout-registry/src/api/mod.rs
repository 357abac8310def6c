//! Registry API endpoint requests
//!
//! Each function validates its arguments and returns the `Request` for one
//! endpoint. Argument problems surface as validation errors before any
//! network activity; payload interpretation is left to the caller.

use serde::{Deserialize, Serialize};

use scout_core::error::ScoutError;
use scout_core::types::Request;
use crate::RegistryResult;

/// Largest page size the registry serves
pub const MAX_PER_PAGE: u32 = 100;

/// Package manager platforms known to the registry
pub const PLATFORMS: &[&str] = &[
    "alcatraz", "bower", "cargo", "carthage", "clojars", "cocoapods", "conda", "cpan", "cran",
    "dub", "elm", "go", "hackage", "haxelib", "hex", "homebrew", "julia", "maven", "meteor",
    "nimble", "npm", "nuget", "packagist", "pub", "puppet", "purescript", "pypi", "racket",
    "rubygems", "swiftpm",
];

/// Source-code hosts with repository endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryHost {
    GitHub,
    GitLab,
    Bitbucket,
}

impl RepositoryHost {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryHost::GitHub => "github",
            RepositoryHost::GitLab => "gitlab",
            RepositoryHost::Bitbucket => "bitbucket",
        }
    }

    fn web_prefix(&self) -> &'static str {
        match self {
            RepositoryHost::GitHub => "https://github.com/",
            RepositoryHost::GitLab => "https://gitlab.com/",
            RepositoryHost::Bitbucket => "https://bitbucket.org/",
        }
    }
}

impl std::str::FromStr for RepositoryHost {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(RepositoryHost::GitHub),
            "gitlab" => Ok(RepositoryHost::GitLab),
            "bitbucket" => Ok(RepositoryHost::Bitbucket),
            other => Err(ScoutError::validation(
                "host",
                format!("unknown repository host '{}' (expected github, gitlab or bitbucket)", other),
            )),
        }
    }
}

/// Page selection for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, per_page: 30 }
    }
}

impl Page {
    /// Validate page number; `per_page` is clamped to the registry maximum
    pub fn new(page: u32, per_page: u32) -> RegistryResult<Self> {
        if page == 0 {
            return Err(ScoutError::validation("page", "pages start at 1"));
        }
        if per_page == 0 {
            return Err(ScoutError::validation("per_page", "must be at least 1"));
        }
        Ok(Self {
            page,
            per_page: per_page.min(MAX_PER_PAGE),
        })
    }
}

/// Search sort orders accepted by the registry
pub const SEARCH_SORTS: &[&str] = &[
    "rank",
    "stars",
    "dependents_count",
    "dependent_repos_count",
    "latest_release_published_at",
    "contributions_count",
    "created_at",
];

/// Filters for package search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub platforms: Vec<String>,
    pub languages: Vec<String>,
    pub licenses: Vec<String>,
    pub keywords: Vec<String>,
    pub sort: Option<String>,
    pub page: Page,
}

/// Validate and normalize a platform name
pub fn validate_platform(platform: &str) -> RegistryResult<String> {
    let normalized = platform.trim().to_ascii_lowercase();
    if PLATFORMS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(ScoutError::validation(
            "platform",
            format!("unsupported platform '{}'", platform.trim()),
        ))
    }
}

/// Trim and collapse whitespace in a name; empty and all-dot names are rejected
pub fn sanitize_name(field: &str, name: &str) -> RegistryResult<String> {
    let cleaned = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err(ScoutError::validation(field, "must not be empty"));
    }
    // "." and ".." are dot-segments and would be resolved away in the URL
    if cleaned.chars().all(|c| c == '.') {
        return Err(ScoutError::validation(
            field,
            format!("'{}' is not a valid name", cleaned),
        ));
    }
    Ok(cleaned)
}

/// Percent-encode one path segment (`@scope/pkg` becomes `%40scope%2Fpkg`)
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn package_path(platform: &str, name: &str) -> RegistryResult<String> {
    let platform = validate_platform(platform)?;
    let name = sanitize_name("name", name)?;
    Ok(format!("{}/{}", platform, encode_segment(&name)))
}

fn paged(request: scout_core::types::RequestBuilder, page: Page) -> Request {
    request
        .param("page", page.page)
        .param("per_page", page.per_page)
        .build()
}

/// Supported package managers
pub fn platforms() -> Request {
    Request::get("platforms").build()
}

/// Package information, including its versions
pub fn project(platform: &str, name: &str) -> RegistryResult<Request> {
    Ok(Request::get(package_path(platform, name)?).build())
}

/// Dependencies of one package version (latest when `version` is `None`)
pub fn project_dependencies(
    platform: &str,
    name: &str,
    version: Option<&str>,
) -> RegistryResult<Request> {
    let version = match version {
        Some(v) => sanitize_name("version", v)?,
        None => "latest".to_string(),
    };
    Ok(Request::get(format!(
        "{}/{}/dependencies",
        package_path(platform, name)?,
        encode_segment(&version)
    ))
    .build())
}

/// Packages that depend on a package
pub fn project_dependents(platform: &str, name: &str, page: Page) -> RegistryResult<Request> {
    let path = format!("{}/dependents", package_path(platform, name)?);
    Ok(paged(Request::get(path), page))
}

/// Repositories that depend on a package
pub fn project_dependent_repositories(
    platform: &str,
    name: &str,
    page: Page,
) -> RegistryResult<Request> {
    let path = format!("{}/dependent_repositories", package_path(platform, name)?);
    Ok(paged(Request::get(path), page))
}

/// Contributors to a package's repository
pub fn project_contributors(platform: &str, name: &str, page: Page) -> RegistryResult<Request> {
    let path = format!("{}/contributors", package_path(platform, name)?);
    Ok(paged(Request::get(path), page))
}

/// SourceRank breakdown for a package
pub fn project_sourcerank(platform: &str, name: &str) -> RegistryResult<Request> {
    Ok(Request::get(format!("{}/sourcerank", package_path(platform, name)?)).build())
}

/// Search packages
pub fn search(query: &SearchQuery) -> RegistryResult<Request> {
    let q = query.query.trim();
    let has_filter = !query.platforms.is_empty()
        || !query.languages.is_empty()
        || !query.licenses.is_empty()
        || !query.keywords.is_empty();
    if q.is_empty() && !has_filter {
        return Err(ScoutError::validation("query", "provide a search term or at least one filter"));
    }

    let platforms = query
        .platforms
        .iter()
        .map(|p| validate_platform(p))
        .collect::<RegistryResult<Vec<_>>>()?;

    if let Some(sort) = &query.sort {
        if !SEARCH_SORTS.contains(&sort.as_str()) {
            return Err(ScoutError::validation(
                "sort",
                format!("'{}' is not one of {}", sort, SEARCH_SORTS.join(", ")),
            ));
        }
    }

    let joined = |values: &[String]| (!values.is_empty()).then(|| values.join(","));
    let builder = Request::get("search")
        .param("q", q)
        .param_opt("platforms", joined(&platforms))
        .param_opt("languages", joined(&query.languages))
        .param_opt("licenses", joined(&query.licenses))
        .param_opt("keywords", joined(&query.keywords))
        .param_opt("sort", query.sort.clone());

    Ok(paged(builder, query.page))
}

/// Split a repository web URL into owner and name
pub fn parse_repository_url(host: RepositoryHost, url: &str) -> RegistryResult<(String, String)> {
    let url = url.trim();
    let rest = url.strip_prefix(host.web_prefix()).ok_or_else(|| {
        ScoutError::validation(
            "repository_url",
            format!("{} repository URL must start with {}", host.as_str(), host.web_prefix()),
        )
    })?;

    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    match (parts.next(), parts.next()) {
        (Some(owner), Some(name)) => {
            let name = name.strip_suffix(".git").unwrap_or(name);
            Ok((
                sanitize_name("repository_url", owner)?,
                sanitize_name("repository_url", name)?,
            ))
        }
        _ => Err(ScoutError::validation(
            "repository_url",
            format!("expected {}<owner>/<repository>", host.web_prefix()),
        )),
    }
}

/// Repository information from its web URL
pub fn repository(host: RepositoryHost, url: &str) -> RegistryResult<Request> {
    let (owner, name) = parse_repository_url(host, url)?;
    Ok(Request::get(format!(
        "{}/{}/{}",
        host.as_str(),
        encode_segment(&owner),
        encode_segment(&name)
    ))
    .build())
}

/// Packages published from a repository
pub fn repository_projects(host: RepositoryHost, url: &str, page: Page) -> RegistryResult<Request> {
    let (owner, name) = parse_repository_url(host, url)?;
    let path = format!(
        "{}/{}/{}/projects",
        host.as_str(),
        encode_segment(&owner),
        encode_segment(&name)
    );
    Ok(paged(Request::get(path), page))
}

/// User or organisation profile
pub fn user(host: RepositoryHost, login: &str) -> RegistryResult<Request> {
    let login = sanitize_name("login", login)?;
    Ok(Request::get(format!("{}/{}", host.as_str(), encode_segment(&login))).build())
}

/// Repositories owned by a user or organisation
pub fn user_repositories(host: RepositoryHost, login: &str, page: Page) -> RegistryResult<Request> {
    let login = sanitize_name("login", login)?;
    let path = format!("{}/{}/repositories", host.as_str(), encode_segment(&login));
    Ok(paged(Request::get(path), page))
}

/// Packages maintained by a user or organisation
pub fn user_projects(host: RepositoryHost, login: &str, page: Page) -> RegistryResult<Request> {
    let login = sanitize_name("login", login)?;
    let path = format!("{}/{}/projects", host.as_str(), encode_segment(&login));
    Ok(paged(Request::get(path), page))
}
