//! Target platform: search terms, relevance scoring, installer predicates
//!
//! Discovery is always "repositories that ship something installable on
//! THIS platform". The platform supplies the search topic, the heuristic
//! relevance score used to prune candidates before probing, and the asset
//! filename predicate the probe tests against.

use serde::{Deserialize, Serialize};

use crate::models::RepositorySummary;

/// Score every candidate starts from; keeps all scores strictly positive so
/// the >0 prune can never empty a platform outright
const BASE_SCORE: i32 = 5;

const DESKTOP_TOPICS: [&str; 5] = ["desktop", "electron", "app", "gui", "compose-desktop"];
const DESKTOP_LANGUAGES: [&str; 6] = ["kotlin", "c++", "rust", "c#", "swift", "dart"];

/// Platform the user wants installable artifacts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPlatform {
    Android,
    Windows,
    MacOs,
    Linux,
}

impl TargetPlatform {
    /// Platform of the running host (desktop only; Android builds pass
    /// `Android` explicitly)
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            TargetPlatform::Windows
        } else if cfg!(target_os = "macos") {
            TargetPlatform::MacOs
        } else {
            TargetPlatform::Linux
        }
    }

    /// Topic/search term used to steer provider queries
    pub fn search_term(&self) -> &'static str {
        match self {
            TargetPlatform::Android => "android",
            TargetPlatform::Windows => "desktop",
            TargetPlatform::MacOs => "macos",
            TargetPlatform::Linux => "linux",
        }
    }

    /// Heuristic relevance of a repository for this platform
    ///
    /// Topic hits weigh most, language hits next, description keywords
    /// least. Candidates scoring zero or below are pruned before probing.
    pub fn score(&self, repo: &RepositorySummary) -> i32 {
        let mut score = BASE_SCORE;
        let topics: Vec<String> = repo.topics.iter().map(|t| t.to_lowercase()).collect();
        let language = repo.language.as_deref().map(|l| l.to_lowercase());
        let desc = repo
            .description
            .as_deref()
            .map(|d| d.to_lowercase())
            .unwrap_or_default();

        match self {
            TargetPlatform::Android => {
                if topics.iter().any(|t| t == "android") {
                    score += 10;
                }
                if topics.iter().any(|t| t == "mobile") {
                    score += 5;
                }
                if matches!(language.as_deref(), Some("kotlin") | Some("java")) {
                    score += 5;
                }
                if desc.contains("android") || desc.contains("apk") {
                    score += 3;
                }
            }
            TargetPlatform::Windows | TargetPlatform::MacOs | TargetPlatform::Linux => {
                if topics.iter().any(|t| DESKTOP_TOPICS.contains(&t.as_str())) {
                    score += 10;
                }
                if topics
                    .iter()
                    .any(|t| t == "cross-platform" || t == "multiplatform")
                {
                    score += 8;
                }
                if language
                    .as_deref()
                    .map(|l| DESKTOP_LANGUAGES.contains(&l))
                    .unwrap_or(false)
                {
                    score += 5;
                }
                if desc.contains("desktop") || desc.contains("application") {
                    score += 3;
                }
            }
        }

        score
    }

    /// Does this asset filename look installable here?
    pub fn is_installer_asset(&self, asset_name: &str) -> bool {
        let name = asset_name.to_lowercase();
        match self {
            TargetPlatform::Android => name.ends_with(".apk"),
            TargetPlatform::Windows => {
                name.ends_with(".msi") || name.ends_with(".exe") || name.contains(".exe")
            }
            TargetPlatform::MacOs => name.ends_with(".dmg") || name.ends_with(".pkg"),
            TargetPlatform::Linux => {
                name.ends_with(".appimage") || name.ends_with(".deb") || name.ends_with(".rpm")
            }
        }
    }
}

impl std::fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetPlatform::Android => write!(f, "android"),
            TargetPlatform::Windows => write!(f, "windows"),
            TargetPlatform::MacOs => write!(f, "macos"),
            TargetPlatform::Linux => write!(f, "linux"),
        }
    }
}

impl std::str::FromStr for TargetPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "android" => Ok(TargetPlatform::Android),
            "windows" | "win" => Ok(TargetPlatform::Windows),
            "macos" | "mac" | "darwin" => Ok(TargetPlatform::MacOs),
            "linux" => Ok(TargetPlatform::Linux),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}
