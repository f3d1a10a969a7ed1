// sprig-core/src/caveats.rs
use sprig_common::model::Recipe;

use crate::template::TemplateVars;

/// Renders the recipe's post-install advisory text, or `None` when it has none.
///
/// Pure substitution: nothing is written anywhere.
pub fn render_caveats(recipe: &Recipe, vars: &TemplateVars) -> Option<String> {
    let template = recipe.caveats_template.as_deref()?;
    let rendered = vars.render(template);
    let trimmed = rendered.trim_end();
    if trimmed.trim().is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
