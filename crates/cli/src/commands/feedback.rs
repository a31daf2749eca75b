//! `chainloom feedback`: run the triage pipeline on one piece of feedback.

use chainloom::{render_report, triage};

pub async fn run(text: &str, json: bool) -> anyhow::Result<()> {
    // No hosted model is wired into the binary, so the reply comes from
    // the template.
    let report = triage(text, None).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_report(&report));
    }
    Ok(())
}
