use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::config::Config;
use super::error::{Result, SprigError};
use super::model::Recipe;

const RECIPE_EXTENSIONS: &[&str] = &["toml", "json"];

/// Looks recipes up by name in the recipes directory and memoizes parsed ones.
#[derive(Debug)]
pub struct Formulary {
    recipes_dir: PathBuf,
    parsed_cache: Mutex<HashMap<String, Arc<Recipe>>>,
}

impl Formulary {
    pub fn new(config: &Config) -> Self {
        Self::in_dir(&config.recipes_dir)
    }

    pub fn in_dir(recipes_dir: &Path) -> Self {
        Self {
            recipes_dir: recipes_dir.to_path_buf(),
            parsed_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn recipe_path(&self, name: &str) -> Option<PathBuf> {
        RECIPE_EXTENSIONS
            .iter()
            .map(|ext| self.recipes_dir.join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
    }

    pub fn load_recipe(&self, name: &str) -> Result<Arc<Recipe>> {
        if name.contains('/') || name.contains("..") {
            return Err(SprigError::NotFound(format!(
                "Invalid recipe name '{name}' contains disallowed characters"
            )));
        }
        {
            let guard = self.parsed_cache.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(recipe) = guard.get(name) {
                debug!("Loaded recipe '{}' from parsed cache.", name);
                return Ok(Arc::clone(recipe));
            }
        }

        let path = self.recipe_path(name).ok_or_else(|| {
            SprigError::NotFound(format!(
                "Recipe '{name}' not found in {}",
                self.recipes_dir.display()
            ))
        })?;
        let recipe = Recipe::load(&path)?;
        if recipe.name != name {
            return Err(SprigError::RecipeLoad(
                path.display().to_string(),
                format!("declares name '{}' but was looked up as '{name}'", recipe.name),
            ));
        }
        debug!(
            "Successfully loaded recipe '{}' version {}",
            recipe.name,
            recipe.version()
        );

        let recipe = Arc::new(recipe);
        self.parsed_cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(name.to_string(), Arc::clone(&recipe));
        Ok(recipe)
    }

    /// Names of every recipe file in the directory, sorted.
    pub fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.recipes_dir.is_dir() {
            return Ok(names);
        }
        for entry in std::fs::read_dir(&self.recipes_dir)? {
            let path = entry?.path();
            let is_recipe = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| RECIPE_EXTENSIONS.contains(&e));
            if let (true, Some(stem)) = (is_recipe, path.file_stem().and_then(|s| s.to_str())) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPE: &str = r#"
        name = "netty"
        sha256 = "7e2ad93c7eec4301352cddbd0c99e4d983a2096794b3ea782dd17ef7c166cc70"
        [source]
        url = "https://github.com/jmeiracorbal/netty/archive/refs/tags/v1.0.0.tar.gz"
    "#;

    #[test]
    fn loads_and_memoizes_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("netty.toml"), RECIPE).unwrap();
        let formulary = Formulary::in_dir(dir.path());

        let first = formulary.load_recipe("netty").unwrap();
        std::fs::remove_file(dir.path().join("netty.toml")).unwrap();
        let second = formulary.load_recipe("netty").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(formulary.list_names().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn unknown_and_mismatched_names_fail() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("other.toml"), RECIPE).unwrap();
        let formulary = Formulary::in_dir(dir.path());

        assert!(matches!(
            formulary.load_recipe("missing"),
            Err(SprigError::NotFound(_))
        ));
        assert!(matches!(
            formulary.load_recipe("other"),
            Err(SprigError::RecipeLoad(..))
        ));
        assert!(formulary.load_recipe("../other").is_err());
        assert_eq!(formulary.list_names().unwrap(), vec!["other".to_string()]);
    }
}
