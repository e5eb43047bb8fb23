//! Selenium IDE (.side) export strategy.
//!
//! Emits the IDE interchange envelope: one project with one test, one
//! command object per recorded step, and a default suite referencing the
//! test. Command and test ids derive from the script id and step index so
//! repeated exports are byte-identical.

use crate::error::Result;
use crate::recording::{Action, Step};
use crate::script::Script;
use serde::Serialize;

#[derive(Serialize)]
struct SideProject<'a> {
    id: String,
    version: &'static str,
    name: &'a str,
    url: &'a str,
    tests: Vec<SideTest<'a>>,
    suites: Vec<SideSuite>,
    urls: Vec<&'a str>,
    plugins: Vec<String>,
}

#[derive(Serialize)]
struct SideTest<'a> {
    id: String,
    name: &'a str,
    commands: Vec<SideCommand>,
}

#[derive(Serialize)]
struct SideCommand {
    id: String,
    comment: String,
    command: &'static str,
    target: String,
    targets: Vec<String>,
    value: String,
}

#[derive(Serialize)]
struct SideSuite {
    id: String,
    name: &'static str,
    #[serde(rename = "persistSession")]
    persist_session: bool,
    parallel: bool,
    timeout: u32,
    tests: Vec<String>,
}

pub fn render(script: &Script) -> Result<String> {
    super::check_supported(&script.steps)?;

    let test_id = format!("{}-test", script.id);
    let url = super::base_url(script);

    let commands = script
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| command_for(script, index, step))
        .collect();

    let project = SideProject {
        id: script.id.clone(),
        version: "2.0",
        name: &script.name,
        url,
        tests: vec![SideTest {
            id: test_id.clone(),
            name: &script.name,
            commands,
        }],
        suites: vec![SideSuite {
            id: format!("{}-suite", script.id),
            name: "Default Suite",
            persist_session: false,
            parallel: false,
            timeout: 300,
            tests: vec![test_id],
        }],
        urls: if url.is_empty() { vec![] } else { vec![url] },
        plugins: vec![],
    };

    Ok(serde_json::to_string_pretty(&project)?)
}

fn command_for(script: &Script, index: usize, step: &Step) -> SideCommand {
    let (command, target, value) = match &step.action {
        Action::Navigate => (
            "open",
            step.url.clone().unwrap_or_default(),
            String::new(),
        ),
        Action::Click => (
            "click",
            css_target(step),
            String::new(),
        ),
        Action::Type => (
            "type",
            css_target(step),
            step.value.clone().unwrap_or_default(),
        ),
        // The IDE has no scroll command; replay it as script execution,
        // matching the java/python strategies.
        Action::Scroll => (
            "executeScript",
            scroll_js(step.selector.as_deref().unwrap_or_default()),
            String::new(),
        ),
        // check_supported already rejected these.
        Action::Other(_) => unreachable!("unsupported action reached side renderer"),
    };

    SideCommand {
        id: format!("{}-cmd-{}", script.id, index),
        comment: String::new(),
        command,
        target,
        targets: vec![],
        value,
    }
}

fn css_target(step: &Step) -> String {
    format!("css={}", step.selector.as_deref().unwrap_or_default())
}

fn scroll_js(selector: &str) -> String {
    format!(
        "document.querySelector({}).scrollIntoView();",
        serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
    )
}
