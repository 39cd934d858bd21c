//! Prompt rendering for every model interaction.
//!
//! Templates are embedded at compile time and rendered through minijinja.
//! The engine is cheap to construct; callers typically build one per run.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const CHECK_TEMPLATE: &str = include_str!("prompts/check.md");
const FIX_TEMPLATE: &str = include_str!("prompts/fix.md");
const INTERPRET_TEMPLATE: &str = include_str!("prompts/interpret.md");
const WRITE_CODE_TEMPLATE: &str = include_str!("prompts/write_code.md");
const WRITE_TEXT_TEMPLATE: &str = include_str!("prompts/write_text.md");
const RESEARCH_TEMPLATE: &str = include_str!("prompts/research.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("plan", PLAN_TEMPLATE),
            ("check", CHECK_TEMPLATE),
            ("fix", FIX_TEMPLATE),
            ("interpret", INTERPRET_TEMPLATE),
            ("write_code", WRITE_CODE_TEMPLATE),
            ("write_text", WRITE_TEXT_TEMPLATE),
            ("research", RESEARCH_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("embedded template should be valid");
        }
        Self { env }
    }

    /// Planning prompt: decompose the objective into an action list.
    pub fn plan(&self, objective: &str) -> Result<String> {
        self.render("plan", context! { objective })
    }

    /// Verification-plan prompt built from the objective and the raw text
    /// of the tasks that were executed.
    pub fn check(&self, objective: &str, executed_tasks: &str) -> Result<String> {
        self.render("check", context! { objective, executed_tasks })
    }

    /// Remedial-action prompt built from the failure reasoning.
    pub fn fix(&self, objective: &str, reason: &str) -> Result<String> {
        self.render("fix", context! { objective, reason })
    }

    /// Yes/no judgment prompt over the cycle's accumulated memory.
    pub fn interpret(&self, objective: &str, memory: &str) -> Result<String> {
        self.render("interpret", context! { objective, memory })
    }

    /// Content prompt for code-type files.
    pub fn write_code(&self, request: &str, memory: &str) -> Result<String> {
        self.render("write_code", context! { request, memory })
    }

    /// Content prompt for text-type files.
    pub fn write_text(&self, request: &str, memory: &str) -> Result<String> {
        self.render("write_text", context! { request, memory })
    }

    /// Question-answering prompt with the task list as context.
    pub fn research(&self, question: &str, task_context: &str) -> Result<String> {
        self.render("research", context! { question, context => task_context })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .with_context(|| format!("get template {name}"))?;
        template
            .render(ctx)
            .with_context(|| format!("render template {name}"))
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}
