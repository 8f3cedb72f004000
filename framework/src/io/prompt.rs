//! User-facing prompts rendered from bundled templates.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::outcome::CrashInfo;

const RECOVERY_TEMPLATE: &str = include_str!("prompts/recovery.md");

/// Prompt shown when the previous session never closed.
pub fn render_recovery_prompt(crash: &CrashInfo) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("recovery", RECOVERY_TEMPLATE)
        .context("load recovery template")?;
    let rendered = env
        .get_template("recovery")?
        .render(context! {
            task => crash.task.as_str(),
            timestamp => crash.timestamp.as_str(),
        })
        .context("render recovery prompt")?;
    Ok(rendered)
}
