//! `{{variable}}` substitution for recipe text: man pages, seeded files,
//! generated files, test patterns and caveats.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sprig_common::config::Config;
use sprig_common::model::Recipe;

/// Substitute `{{variable}}` patterns in a string with provided values.
/// Unresolved variables are left as-is.
pub fn substitute_vars(text: &str, vars: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let name_len = after
            .char_indices()
            .find(|&(i, c)| !(is_var_char(c) && (i > 0 || !c.is_ascii_digit())))
            .map_or(after.len(), |(i, _)| i);
        let name = &after[..name_len];
        if name_len > 0 && after[name_len..].starts_with("}}") {
            match vars.get(name) {
                Some(value) => result.push_str(value),
                None => result.push_str(&rest[open..open + 2 + name_len + 2]),
            }
            rest = &after[name_len + 2..];
        } else {
            result.push('{');
            rest = &rest[open + 1..];
        }
    }
    result.push_str(rest);
    result
}

fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// The variable set a recipe's text is rendered with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    vars: HashMap<String, String>,
}

impl TemplateVars {
    /// Variables that depend only on the recipe and the render time, so text
    /// rendered from them is deterministic.
    pub fn for_recipe(recipe: &Recipe, render_time: DateTime<Utc>) -> Self {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), recipe.name.clone());
        vars.insert("program".to_string(), recipe.program.clone());
        vars.insert("version".to_string(), recipe.version().to_string());
        vars.insert(
            "description".to_string(),
            recipe.description.clone().unwrap_or_default(),
        );
        vars.insert(
            "homepage".to_string(),
            recipe.homepage.clone().unwrap_or_default(),
        );
        vars.insert(
            "license".to_string(),
            recipe.license.clone().unwrap_or_default(),
        );
        vars.insert("date".to_string(), render_time.format("%B %Y").to_string());
        vars.insert("year".to_string(), render_time.format("%Y").to_string());
        vars.insert(
            "timestamp".to_string(),
            render_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        Self { vars }
    }

    /// Adds the install locations (`prefix`, `bin`, `share`, `man`, `home`).
    pub fn with_locations(mut self, config: &Config) -> Self {
        let locations = [
            ("prefix", config.prefix().to_path_buf()),
            ("bin", config.bin_dir()),
            ("share", config.share_dir()),
            ("man", config.man_base_dir()),
            ("home", config.home_dir().to_path_buf()),
        ];
        for (key, path) in locations {
            self.vars
                .insert(key.to_string(), path.display().to_string());
        }
        self
    }

    pub fn render(&self, text: &str) -> String {
        substitute_vars(text, &self.vars)
    }
}
