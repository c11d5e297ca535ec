//! Embedded configuration and unit templates
//!
//! Templates use `${name}` placeholders. Rendering fails on a placeholder
//! with no matching parameter instead of leaving it in the output.
//! Placeholders in the TOML templates sit inside basic strings, so string
//! values are escaped for that context.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::fs::write_file;

const ENGINE_CONFIG: &str = include_str!("../templates/tendermint.config.toml");
const APP_CONFIG: &str = include_str!("../templates/glitter.config.toml");
const ENGINE_UNIT: &str = include_str!("../templates/tendermint.service");
const APP_UNIT: &str = include_str!("../templates/glitter.service");

/// Template parameters by placeholder name
pub type TemplateParams = HashMap<String, Value>;

/// Files glitter-boot knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    /// Consensus engine `config.toml`
    EngineConfig,
    /// Application `config.toml`
    AppConfig,
    /// Consensus engine systemd unit
    EngineUnit,
    /// Application systemd unit
    AppUnit,
}

impl Template {
    pub fn name(&self) -> &'static str {
        match self {
            Template::EngineConfig => "tendermint.config.toml",
            Template::AppConfig => "glitter.config.toml",
            Template::EngineUnit => "tendermint.service",
            Template::AppUnit => "glitter.service",
        }
    }

    /// Whether placeholders land inside TOML basic strings
    pub fn is_toml(&self) -> bool {
        matches!(self, Template::EngineConfig | Template::AppConfig)
    }

    fn source(&self) -> &'static str {
        match self {
            Template::EngineConfig => ENGINE_CONFIG,
            Template::AppConfig => APP_CONFIG,
            Template::EngineUnit => ENGINE_UNIT,
            Template::AppUnit => APP_UNIT,
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Renders the embedded templates, optionally with replacements
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    overrides: HashMap<Template, String>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the embedded text of `template`.
    pub fn with_override(mut self, template: Template, text: impl Into<String>) -> Self {
        self.overrides.insert(template, text.into());
        self
    }

    pub fn render(&self, template: Template, params: &TemplateParams) -> Result<String> {
        let text = self
            .overrides
            .get(&template)
            .map(String::as_str)
            .unwrap_or_else(|| template.source());
        let rendered = if template.is_toml() {
            substitute(text, params, toml_escape)
        } else {
            render_str(text, params)
        };
        rendered.with_context(|| format!("Failed to render {}", template))
    }

    /// Render `template` into `dest` with mode 0644.
    pub fn render_to_file(
        &self,
        template: Template,
        params: &TemplateParams,
        dest: &Path,
    ) -> Result<()> {
        let rendered = self.render(template, params)?;
        write_file(dest, rendered.as_bytes(), 0o644)?;
        debug!("Rendered {} -> {}", template, dest.display());
        Ok(())
    }
}

/// Substitute every `${name}` in `text`, values inserted verbatim.
pub fn render_str(text: &str, params: &TemplateParams) -> Result<String> {
    substitute(text, params, verbatim)
}

fn verbatim(s: &str) -> Cow<'_, str> {
    Cow::Borrowed(s)
}

fn substitute(
    text: &str,
    params: &TemplateParams,
    escape: fn(&str) -> Cow<'_, str>,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| anyhow!("unterminated placeholder at `{}`", truncate(&rest[start..])))?;
        let name = after[..end].trim();

        let value = params
            .get(name)
            .ok_or_else(|| anyhow!("missing template parameter `{}`", name))?;
        match value {
            Value::String(s) => out.push_str(&escape(s)),
            other => out.push_str(&other.to_string()),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Escape `s` for use inside a TOML basic string.
pub fn toml_escape(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| matches!(c, '"' | '\\') || c.is_control()) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(24) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
