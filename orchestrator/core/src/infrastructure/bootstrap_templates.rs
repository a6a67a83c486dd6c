// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bootstrap Script Templates
//!
//! Renders first-boot scripts for the studio hosts from Handlebars templates
//! embedded in the crate. Scripts are static per deployment: every input is
//! interpolated when the deployment is assembled, never at boot.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Turn a template plus a [`ScriptContext`] into a deferred [`Value`]
//! - **Integration:** component builders -> `InstanceSpec.user_data` / `LaunchTemplateSpec.user_data`
//!
//! # Deferred References
//!
//! Bucket names, secret ARNs and the region are only known once the stack is
//! provisioned. [`ScriptContext::reference`] stores such a value and exposes a
//! `${Token[N]}` placeholder to the template; after rendering, the text is split
//! on those placeholders and reassembled as a [`Value::Join`].
//!
//! ```ignore
//! let engine = ScriptTemplateEngine::new()?;
//! let ctx = ScriptContext::new()
//!     .var("repo_url", "https://pkg.jenkins.io/redhat-stable/jenkins.repo")
//!     .reference("backup_bucket", Value::reference(&bucket));
//! let user_data = engine.render(templates::JENKINS, &ctx)?;
//! ```

use anyhow::{Context, Result};
use handlebars::Handlebars;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::resource::Value;

/// Names of the embedded templates
pub mod templates {
    pub const SVN: &str = "svn.sh";
    pub const PERFORCE_BASE: &str = "perforce-base.sh";
    pub const PERFORCE_SAMPLE_DATA: &str = "perforce-sample-data.sh";
    pub const JENKINS: &str = "jenkins.sh";
    pub const BUILD_WORKER: &str = "build-worker.ps1";
    pub const WORKSTATION: &str = "workstation.ps1";
}

const EMBEDDED: [(&str, &str); 6] = [
    (templates::SVN, include_str!("../../assets/bootstrap/svn.sh.hbs")),
    (templates::PERFORCE_BASE, include_str!("../../assets/bootstrap/perforce-base.sh.hbs")),
    (
        templates::PERFORCE_SAMPLE_DATA,
        include_str!("../../assets/bootstrap/perforce-sample-data.sh.hbs"),
    ),
    (templates::JENKINS, include_str!("../../assets/bootstrap/jenkins.sh.hbs")),
    (templates::BUILD_WORKER, include_str!("../../assets/bootstrap/build-worker.ps1.hbs")),
    (templates::WORKSTATION, include_str!("../../assets/bootstrap/workstation.ps1.hbs")),
];

const TOKEN_PATTERN: &str = r"\$\{Token\[(\d+)\]\}";

// ============================================================================
// Script Context
// ============================================================================

/// Variables handed to a bootstrap template
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptContext {
    #[serde(flatten)]
    vars: HashMap<String, serde_json::Value>,

    #[serde(skip)]
    references: Vec<Value>,
}

impl ScriptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain text variable
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), serde_json::Value::String(value.into()));
        self
    }

    /// Boolean usable in `{{#if}}` blocks
    pub fn flag(mut self, key: impl Into<String>, value: bool) -> Self {
        self.vars.insert(key.into(), serde_json::Value::Bool(value));
        self
    }

    /// Structured value, e.g. a list iterated with `{{#each}}`
    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.vars.insert(key.into(), value);
        self
    }

    /// Value that may only resolve at provisioning time. Literals are inlined.
    pub fn reference(mut self, key: impl Into<String>, value: Value) -> Self {
        let rendered = match value {
            Value::Literal(s) => s,
            other => {
                let token = format!("${{Token[{}]}}", self.references.len());
                self.references.push(other);
                token
            }
        };
        self.vars.insert(key.into(), serde_json::Value::String(rendered));
        self
    }

    pub fn references(&self) -> &[Value] {
        &self.references
    }
}

// ============================================================================
// Template Engine
// ============================================================================

pub struct ScriptTemplateEngine {
    handlebars: Handlebars<'static>,
    tokens: Regex,
}

impl ScriptTemplateEngine {
    /// Create an engine with every embedded template registered
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Scripts are shell text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, source) in EMBEDDED {
            handlebars
                .register_template_string(name, source)
                .with_context(|| format!("Invalid bootstrap template '{}'", name))?;
        }

        let tokens = Regex::new(TOKEN_PATTERN).context("Invalid script token pattern")?;

        Ok(Self { handlebars, tokens })
    }

    pub fn template_names(&self) -> Vec<&'static str> {
        EMBEDDED.iter().map(|(name, _)| *name).collect()
    }

    /// Render a registered template
    pub fn render(&self, name: &str, context: &ScriptContext) -> Result<Value> {
        let text = self
            .handlebars
            .render(name, context)
            .with_context(|| format!("Failed to render bootstrap template '{}'", name))?;
        self.reassemble(&text, context.references())
    }

    /// Render an ad-hoc template string
    pub fn render_str(&self, template: &str, context: &ScriptContext) -> Result<Value> {
        let text = self
            .handlebars
            .render_template(template, context)
            .context("Failed to render bootstrap template")?;
        self.reassemble(&text, context.references())
    }

    /// Split rendered text on `${Token[N]}` placeholders and rebuild the deferred value.
    fn reassemble(&self, text: &str, references: &[Value]) -> Result<Value> {
        let mut parts = Vec::new();
        let mut cursor = 0;

        for caps in self.tokens.captures_iter(text) {
            let (Some(whole), Some(index)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let index: usize = index.as_str().parse().context("Malformed script token")?;
            let value = references
                .get(index)
                .with_context(|| format!("Script token {} has no bound reference", index))?;

            parts.push(Value::literal(&text[cursor..whole.start()]));
            parts.push(value.clone());
            cursor = whole.end();
        }
        parts.push(Value::literal(&text[cursor..]));

        Ok(Value::join(parts))
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::template::Template::compile(template)
            .map(|_| ())
            .context("Invalid Handlebars template syntax")
    }
}

/// Concatenate script bodies, one per line block.
pub fn concat_scripts(scripts: impl IntoIterator<Item = Value>) -> Value {
    let mut parts = Vec::new();
    for (i, script) in scripts.into_iter().enumerate() {
        if i > 0 {
            parts.push(Value::literal("\n"));
        }
        parts.push(script);
    }
    Value::join(parts)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{LogicalId, ResourceId, StackName};

    fn secret() -> ResourceId {
        ResourceId::new(StackName::new("VCSStack"), LogicalId("SvnSecret".into()))
    }

    #[test]
    fn test_all_embedded_templates_register() {
        let engine = ScriptTemplateEngine::new().unwrap();
        assert_eq!(engine.template_names().len(), 6);
    }

    #[test]
    fn test_literal_only_render_is_literal() {
        let engine = ScriptTemplateEngine::new().unwrap();
        let ctx = ScriptContext::new().var("name", "studio").reference("zone", Value::literal("a.b"));
        let value = engine.render_str("hello {{name}} in {{zone}}", &ctx).unwrap();
        assert_eq!(value, Value::literal("hello studio in a.b"));
    }

    #[test]
    fn test_references_split_into_join() {
        let engine = ScriptTemplateEngine::new().unwrap();
        let ctx = ScriptContext::new()
            .reference("arn", Value::reference(&secret()))
            .reference("region", Value::Region);
        let value = engine
            .render_str("get --secret-id {{arn}} --region {{region}} | jq", &ctx)
            .unwrap();

        assert_eq!(
            value,
            Value::Join(vec![
                Value::literal("get --secret-id "),
                Value::reference(&secret()),
                Value::literal(" --region "),
                Value::Region,
                Value::literal(" | jq"),
            ])
        );
    }

    #[test]
    fn test_no_html_escaping() {
        let engine = ScriptTemplateEngine::new().unwrap();
        let ctx = ScriptContext::new().var("url", "https://x/?a=1&b=<2>");
        let value = engine.render_str("curl '{{url}}'", &ctx).unwrap();
        assert_eq!(value, Value::literal("curl 'https://x/?a=1&b=<2>'"));
    }

    #[test]
    fn test_shell_variables_survive() {
        let engine = ScriptTemplateEngine::new().unwrap();
        let value = engine
            .render_str("tar -cvf ${BACKUP_FILE} -C $HOME .", &ScriptContext::new())
            .unwrap();
        assert_eq!(value, Value::literal("tar -cvf ${BACKUP_FILE} -C $HOME ."));
    }

    #[test]
    fn test_conditional_blocks() {
        let engine = ScriptTemplateEngine::new().unwrap();
        let template = "base{{#if extra}}\nextra{{/if}}";
        let on = engine.render_str(template, &ScriptContext::new().flag("extra", true)).unwrap();
        let off = engine.render_str(template, &ScriptContext::new().flag("extra", false)).unwrap();
        assert_eq!(on, Value::literal("base\nextra"));
        assert_eq!(off, Value::literal("base"));
    }

    #[test]
    fn test_concat_scripts() {
        let joined = concat_scripts(vec![Value::literal("a"), Value::Region, Value::literal("b")]);
        assert_eq!(
            joined,
            Value::Join(vec![Value::literal("a\n"), Value::Region, Value::literal("\nb")])
        );
    }

    #[test]
    fn test_validate_template() {
        let engine = ScriptTemplateEngine::new().unwrap();
        assert!(engine.validate_template("{{name}}").is_ok());
        assert!(engine.validate_template("{{name").is_err());
    }
}
