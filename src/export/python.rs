//! selenium-python export strategy: one runnable test module, one WebDriver
//! statement per recorded step, in original order.

use crate::error::Result;
use crate::recording::{Action, Step};
use crate::script::Script;
use std::fmt::Write;

pub fn render(script: &Script) -> Result<String> {
    super::check_supported(&script.steps)?;

    let function_name = format!("test_{}", super::snake_identifier(&script.name));

    let mut out = String::new();
    let _ = writeln!(out, "#!/usr/bin/env python3");
    let _ = writeln!(out, "\"\"\"Automated test generated from recording '{}'.\"\"\"", script.name);
    out.push('\n');
    let _ = writeln!(out, "from selenium import webdriver");
    let _ = writeln!(out, "from selenium.webdriver.common.by import By");
    let _ = writeln!(out, "import sys");
    out.push('\n');
    out.push('\n');
    let _ = writeln!(out, "def {}():", function_name);
    let _ = writeln!(out, "    driver = webdriver.Chrome()");
    let _ = writeln!(out, "    try:");

    for step in &script.steps {
        let _ = writeln!(out, "        {}", statement_for(step));
    }

    let _ = writeln!(out, "        return 0");
    let _ = writeln!(out, "    except Exception as e:");
    let _ = writeln!(out, "        print(f\"[ERROR] Test failed: {{e}}\")");
    let _ = writeln!(out, "        return 1");
    let _ = writeln!(out, "    finally:");
    let _ = writeln!(out, "        driver.quit()");
    out.push('\n');
    out.push('\n');
    let _ = writeln!(out, "if __name__ == \"__main__\":");
    let _ = writeln!(out, "    sys.exit({}())", function_name);

    Ok(out)
}

fn statement_for(step: &Step) -> String {
    let selector = step.selector.as_deref().unwrap_or_default();
    match &step.action {
        Action::Navigate => format!(
            "driver.get(\"{}\")",
            escape(step.url.as_deref().unwrap_or_default())
        ),
        Action::Click => format!(
            "driver.find_element(By.CSS_SELECTOR, \"{}\").click()",
            escape(selector)
        ),
        Action::Type => format!(
            "driver.find_element(By.CSS_SELECTOR, \"{}\").send_keys(\"{}\")",
            escape(selector),
            escape(step.value.as_deref().unwrap_or_default())
        ),
        Action::Scroll => format!(
            "driver.execute_script(\"{}\")",
            escape(&scroll_js(selector))
        ),
        Action::Other(_) => unreachable!("unsupported action reached python renderer"),
    }
}

fn scroll_js(selector: &str) -> String {
    format!(
        "document.querySelector({}).scrollIntoView();",
        serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
    )
}

/// Escape a string for inclusion in a Python double-quoted literal.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
