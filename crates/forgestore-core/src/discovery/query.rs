//! Query builders for the discovery categories and keyword search
//!
//! Each category maps to a provider-specific search expression: GitHub takes
//! a full query-syntax string with date windows, GitLab takes a search term
//! plus server-side ordering and a client-side star floor.

use chrono::{Duration, Utc};

use crate::discovery::platform::TargetPlatform;
use crate::forge::RepoQuery;
use crate::models::Provider;

/// Browsing category on the home surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryCategory {
    /// Established repositories with recent pushes
    Trending,
    /// Repositories created in the last month
    New,
    /// Anything touched in the last few days
    RecentlyUpdated,
}

impl DiscoveryCategory {
    /// Build the provider-shaped query for this category
    pub fn query(&self, provider: Provider, platform: TargetPlatform) -> RepoQuery {
        match provider {
            Provider::GitHub => self.github_query(platform),
            Provider::GitLab => self.gitlab_query(platform),
        }
    }

    fn github_query(&self, platform: TargetPlatform) -> RepoQuery {
        let (base, sort, days_back) = match self {
            DiscoveryCategory::Trending => ("stars:>500 archived:false pushed:>=", "stars", 7),
            DiscoveryCategory::New => ("stars:>5 archived:false created:>=", "created", 30),
            DiscoveryCategory::RecentlyUpdated => {
                ("stars:>50 archived:false pushed:>=", "updated", 3)
            }
        };
        let date = (Utc::now() - Duration::days(days_back)).format("%Y-%m-%d");
        RepoQuery {
            text: format!("{}{} topic:{}", base, date, platform.search_term()),
            sort: Some(sort.to_string()),
            order: "desc".to_string(),
            min_stars: 0,
        }
    }

    fn gitlab_query(&self, platform: TargetPlatform) -> RepoQuery {
        let (sort, min_stars) = match self {
            DiscoveryCategory::Trending => ("star_count", 100),
            DiscoveryCategory::New => ("created_at", 5),
            DiscoveryCategory::RecentlyUpdated => ("last_activity_at", 50),
        };
        RepoQuery {
            text: platform.search_term().to_string(),
            sort: Some(sort.to_string()),
            order: "desc".to_string(),
            min_stars,
        }
    }
}

/// Sort order for keyword search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchSort {
    MostStars,
    MostForks,
    #[default]
    BestMatch,
}

impl SearchSort {
    fn provider_keys(&self, provider: Provider) -> Option<&'static str> {
        match provider {
            Provider::GitHub => match self {
                SearchSort::MostStars => Some("stars"),
                SearchSort::MostForks => Some("forks"),
                // GitHub's default ordering IS best match
                SearchSort::BestMatch => None,
            },
            Provider::GitLab => match self {
                SearchSort::MostStars => Some("star_count"),
                SearchSort::MostForks => Some("star_count"),
                SearchSort::BestMatch => Some("similarity"),
            },
        }
    }

    /// Build a keyword-search query for the provider
    pub fn query(&self, provider: Provider, text: &str) -> RepoQuery {
        RepoQuery {
            text: text.to_string(),
            sort: self.provider_keys(provider).map(String::from),
            order: "desc".to_string(),
            min_stars: 0,
        }
    }
}

impl std::str::FromStr for SearchSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stars" | "most-stars" => Ok(SearchSort::MostStars),
            "forks" | "most-forks" => Ok(SearchSort::MostForks),
            "best-match" | "match" | "relevance" => Ok(SearchSort::BestMatch),
            _ => Err(format!("Unknown sort: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_trending_query_shape() {
        let query = DiscoveryCategory::Trending.query(Provider::GitHub, TargetPlatform::Android);
        assert!(query.text.starts_with("stars:>500 archived:false pushed:>="));
        assert!(query.text.ends_with("topic:android"));
        assert_eq!(query.sort.as_deref(), Some("stars"));
        assert_eq!(query.order, "desc");
        assert_eq!(query.min_stars, 0);
    }

    #[test]
    fn test_github_new_and_updated_windows() {
        let new = DiscoveryCategory::New.query(Provider::GitHub, TargetPlatform::Linux);
        assert!(new.text.contains("created:>="));
        assert_eq!(new.sort.as_deref(), Some("created"));

        let updated =
            DiscoveryCategory::RecentlyUpdated.query(Provider::GitHub, TargetPlatform::Linux);
        assert!(updated.text.contains("pushed:>="));
        assert_eq!(updated.sort.as_deref(), Some("updated"));
    }

    #[test]
    fn test_gitlab_category_floors() {
        let trending = DiscoveryCategory::Trending.query(Provider::GitLab, TargetPlatform::Linux);
        assert_eq!(trending.text, "linux");
        assert_eq!(trending.sort.as_deref(), Some("star_count"));
        assert_eq!(trending.min_stars, 100);

        let new = DiscoveryCategory::New.query(Provider::GitLab, TargetPlatform::Linux);
        assert_eq!(new.min_stars, 5);
        assert_eq!(new.sort.as_deref(), Some("created_at"));

        let updated =
            DiscoveryCategory::RecentlyUpdated.query(Provider::GitLab, TargetPlatform::Linux);
        assert_eq!(updated.min_stars, 50);
        assert_eq!(updated.sort.as_deref(), Some("last_activity_at"));
    }

    #[test]
    fn test_search_sort_mapping() {
        let stars = SearchSort::MostStars.query(Provider::GitHub, "terminal");
        assert_eq!(stars.text, "terminal");
        assert_eq!(stars.sort.as_deref(), Some("stars"));

        let best = SearchSort::BestMatch.query(Provider::GitHub, "terminal");
        assert_eq!(best.sort, None);

        let gitlab = SearchSort::MostStars.query(Provider::GitLab, "terminal");
        assert_eq!(gitlab.sort.as_deref(), Some("star_count"));
    }

    #[test]
    fn test_search_sort_from_str() {
        assert_eq!("stars".parse::<SearchSort>().unwrap(), SearchSort::MostStars);
        assert_eq!(
            "best-match".parse::<SearchSort>().unwrap(),
            SearchSort::BestMatch
        );
        assert!("weird".parse::<SearchSort>().is_err());
    }
}
