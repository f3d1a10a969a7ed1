// sprig-common/src/model/recipe.rs
// This module defines the recipe: the declarative description of one
// installable unit, validated once at load time and immutable afterwards.

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::manpage::ManPage;
use super::step::{InstallStep, PostInstallStep, TestAssertion};
use crate::error::{Result, SprigError};

/// Operating systems a recipe may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "darwin", alias = "mac")]
    Macos,
    Linux,
    Freebsd,
    Windows,
}

impl Platform {
    pub fn from_os(os: &str) -> Option<Self> {
        match os {
            "macos" => Some(Platform::Macos),
            "linux" => Some(Platform::Linux),
            "freebsd" => Some(Platform::Freebsd),
            "windows" => Some(Platform::Windows),
            _ => None,
        }
    }

    /// The platform this binary was built for, if it is one recipes can name.
    pub fn current() -> Option<Self> {
        Self::from_os(std::env::consts::OS)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::Macos => "macos",
            Platform::Linux => "linux",
            Platform::Freebsd => "freebsd",
            Platform::Windows => "windows",
        };
        f.write_str(s)
    }
}

/// Where the artifact comes from and which version it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub url: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    url: String,
    #[serde(default)]
    version: Option<String>,
}

// Unknown fields are ignored; the non-defaulted ones are required.
#[derive(Debug, Deserialize)]
struct RawRecipe {
    name: String,
    #[serde(default, alias = "desc")]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(alias = "source_location")]
    source: RawSource,
    #[serde(alias = "sha256")]
    integrity_digest: String,
    #[serde(default)]
    platform_constraint: Vec<Platform>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    program: Option<String>,
    #[serde(default)]
    install_steps: Vec<InstallStep>,
    #[serde(default)]
    post_install_steps: Vec<PostInstallStep>,
    #[serde(default)]
    manpage: Option<ManPage>,
    #[serde(default, alias = "caveats")]
    caveats_template: Option<String>,
    #[serde(default, alias = "test")]
    test_spec: Vec<TestAssertion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawRecipe")]
pub struct Recipe {
    pub name: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub license: Option<String>,
    pub source: SourceLocation,
    /// Lower-case hex SHA-256 of the artifact.
    pub integrity_digest: String,
    /// Empty means every platform.
    pub platform_constraint: Vec<Platform>,
    pub dependencies: Vec<String>,
    pub program: String,
    pub install_steps: Vec<InstallStep>,
    pub post_install_steps: Vec<PostInstallStep>,
    pub manpage: Option<ManPage>,
    pub caveats_template: Option<String>,
    pub test_spec: Vec<TestAssertion>,
}

impl TryFrom<RawRecipe> for Recipe {
    type Error = String;

    fn try_from(raw: RawRecipe) -> std::result::Result<Self, Self::Error> {
        validate_name(&raw.name).map_err(|e| format!("name: {e}"))?;
        for dep in &raw.dependencies {
            validate_name(dep).map_err(|e| format!("dependency: {e}"))?;
        }

        let url = raw.source.url.trim().to_string();
        if url.is_empty() {
            return Err("source.url must not be empty".to_string());
        }

        let digest = raw.integrity_digest.trim().to_ascii_lowercase();
        if digest.is_empty() {
            return Err("integrity_digest must not be empty".to_string());
        }
        if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!(
                "integrity_digest '{}' is not a hex digest",
                raw.integrity_digest
            ));
        }

        let version = match raw.source.version.filter(|v| !v.trim().is_empty()) {
            Some(v) => v.trim().to_string(),
            None => version_from_url(&url)
                .ok_or_else(|| format!("cannot determine version from url '{url}'"))?,
        };

        let program = match raw.program {
            Some(p) => {
                validate_name(&p).map_err(|e| format!("program: {e}"))?;
                p
            }
            None => raw
                .install_steps
                .iter()
                .find_map(InstallStep::bin_target)
                .unwrap_or_else(|| raw.name.clone()),
        };

        Ok(Recipe {
            name: raw.name,
            description: raw.description,
            homepage: raw.homepage,
            license: raw.license,
            source: SourceLocation { url, version },
            integrity_digest: digest,
            platform_constraint: raw.platform_constraint,
            dependencies: raw.dependencies,
            program,
            install_steps: raw.install_steps,
            post_install_steps: raw.post_install_steps,
            manpage: raw.manpage,
            caveats_template: raw.caveats_template,
            test_spec: raw.test_spec,
        })
    }
}

impl Recipe {
    pub fn from_toml_str(origin: &str, text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SprigError::RecipeLoad(origin.to_string(), e.to_string()))
    }

    pub fn from_json_str(origin: &str, text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| SprigError::RecipeLoad(origin.to_string(), e.to_string()))
    }

    /// Loads a recipe file; the format follows the extension (`.toml` or `.json`).
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading recipe from {}", path.display());
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SprigError::RecipeLoad(origin.clone(), e.to_string()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&origin, &text),
            Some("json") => Self::from_json_str(&origin, &text),
            other => Err(SprigError::RecipeLoad(
                origin,
                format!("unsupported recipe format {:?}", other.unwrap_or("")),
            )),
        }
    }

    pub fn version(&self) -> &str {
        &self.source.version
    }

    pub fn supports(&self, platform: Option<Platform>) -> bool {
        if self.platform_constraint.is_empty() {
            return true;
        }
        platform.is_some_and(|p| self.platform_constraint.contains(&p))
    }

    pub fn platforms_display(&self) -> String {
        if self.platform_constraint.is_empty() {
            return "any".to_string();
        }
        self.platform_constraint
            .iter()
            .map(Platform::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn validate_name(name: &str) -> std::result::Result<(), String> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
        && !name.contains("..");
    if valid {
        Ok(())
    } else {
        Err(format!("'{name}' is not a valid identifier"))
    }
}

const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".tbz2", ".tbz", ".txz", ".tar", ".zip",
];

/// Reads a version out of the last URL segment: `archive/v1.0.0.tar.gz` gives
/// `1.0.0`, `tool-2.3.1.zip` gives `2.3.1`.
pub fn version_from_url(url: &str) -> Option<String> {
    let trimmed = url.split(['?', '#']).next()?;
    let segment = trimmed.trim_end_matches('/').rsplit('/').next()?;
    let stem = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| segment.strip_suffix(suffix))
        .unwrap_or(segment);
    let re = Regex::new(r"(?:^|[^0-9A-Za-z])v?(\d+(?:\.\d+)+(?:[-_.]?(?:alpha|beta|rc)\d*)?)$")
        .ok()?;
    re.captures(stem)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            // Bare versions such as "v1.0.0" or "1.0" as the whole stem.
            let bare = stem.strip_prefix('v').unwrap_or(stem);
            let ok = !bare.is_empty()
                && bare.contains('.')
                && bare.chars().all(|c| c.is_ascii_digit() || c == '.');
            ok.then(|| bare.to_string())
        })
}
