//! selenium-java export strategy: one test class, one WebDriver statement
//! per recorded step, steps in original order inside a single test method.

use crate::error::Result;
use crate::recording::{Action, Step};
use crate::script::Script;
use std::fmt::Write;

pub fn render(script: &Script) -> Result<String> {
    super::check_supported(&script.steps)?;

    let class_name = format!("{}Test", super::pascal_identifier(&script.name));
    let method_name = super::camel_identifier(&script.name);

    let mut out = String::new();
    let _ = writeln!(out, "import org.junit.Test;");
    let _ = writeln!(out, "import org.openqa.selenium.By;");
    let _ = writeln!(out, "import org.openqa.selenium.JavascriptExecutor;");
    let _ = writeln!(out, "import org.openqa.selenium.WebDriver;");
    let _ = writeln!(out, "import org.openqa.selenium.chrome.ChromeDriver;");
    out.push('\n');
    let _ = writeln!(out, "public class {} {{", class_name);
    out.push('\n');
    let _ = writeln!(out, "    @Test");
    let _ = writeln!(out, "    public void {}() {{", method_name);
    let _ = writeln!(out, "        WebDriver driver = new ChromeDriver();");
    let _ = writeln!(out, "        try {{");

    for step in &script.steps {
        let _ = writeln!(out, "            {}", statement_for(step));
    }

    let _ = writeln!(out, "        }} finally {{");
    let _ = writeln!(out, "            driver.quit();");
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");

    Ok(out)
}

fn statement_for(step: &Step) -> String {
    let selector = step.selector.as_deref().unwrap_or_default();
    match &step.action {
        Action::Navigate => format!(
            "driver.get(\"{}\");",
            escape(step.url.as_deref().unwrap_or_default())
        ),
        Action::Click => format!(
            "driver.findElement(By.cssSelector(\"{}\")).click();",
            escape(selector)
        ),
        Action::Type => format!(
            "driver.findElement(By.cssSelector(\"{}\")).sendKeys(\"{}\");",
            escape(selector),
            escape(step.value.as_deref().unwrap_or_default())
        ),
        Action::Scroll => format!(
            "((JavascriptExecutor) driver).executeScript(\"{}\");",
            escape(&scroll_js(selector))
        ),
        Action::Other(_) => unreachable!("unsupported action reached java renderer"),
    }
}

fn scroll_js(selector: &str) -> String {
    // serde_json renders the selector as a quoted, escaped JS string literal.
    format!(
        "document.querySelector({}).scrollIntoView();",
        serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
    )
}

/// Escape a string for inclusion in a Java double-quoted literal.
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
