//! `chainloom render`: fill in a prompt template from `--var` pairs.

use anyhow::Context;
use chainloom_pipeline::PromptTemplate;
use serde_json::{Map, Value};

pub fn run(template: &str, vars: Vec<(String, String)>) -> anyhow::Result<()> {
    let template = PromptTemplate::new(template).context("invalid template")?;
    let vars: Map<String, Value> = vars
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    let rendered = template.format(&vars).with_context(|| {
        format!("template expects: {}", template.input_variables().join(", "))
    })?;
    println!("{rendered}");
    Ok(())
}
