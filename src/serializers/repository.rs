//! Repository details derived from an entity's source location

use reqwest::Url;

use crate::catalog::Entity;

/// Code repository of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    /// Host of the repository, e.g. `github.com`
    pub provider: String,
    /// The source location as written on the entity
    pub url: String,
    /// `https://<host>/<owner>/<repo>`
    pub repository_url: String,
    /// Glob covering the entity's directory within the repository
    pub path: String,
}

/// Path segments that separate the repository from a ref and file path
const REF_MARKERS: [&str; 3] = ["tree", "blob", "src"];

impl RepositoryInfo {
    /// Resolve from the `backstage.io/source-location` annotation
    ///
    /// Only `url:` locations with an `owner/repo` path are understood.
    pub fn from_entity(entity: &Entity) -> Option<Self> {
        let location = entity.source_location()?;
        if location.location_type != "url" {
            return None;
        }
        Self::parse(&location.target)
    }

    /// Parse a repository browser URL such as
    /// `https://github.com/acme/shop/tree/main/services/checkout`
    pub fn parse(target: &str) -> Option<Self> {
        let url = Url::parse(target).ok()?;
        let host = url.host_str()?.to_string();
        let segments: Vec<&str> = url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .collect();

        let [owner, repo, rest @ ..] = segments.as_slice() else {
            return None;
        };
        let repo = repo.strip_suffix(".git").unwrap_or(*repo);

        // GitLab puts a `-` segment before `tree`/`blob`
        let rest = match rest {
            ["-", tail @ ..] => tail,
            other => other,
        };
        let filepath = match rest {
            [marker, _git_ref, path @ ..] if REF_MARKERS.contains(marker) => path.join("/"),
            _ => String::new(),
        };

        let path = if filepath.is_empty() {
            "**".to_string()
        } else {
            format!("{}/**", filepath)
        };

        Some(Self {
            provider: host.clone(),
            url: target.to_string(),
            repository_url: format!("https://{}/{}/{}", host, owner, repo),
            path,
        })
    }
}
