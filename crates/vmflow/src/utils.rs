use colored::Colorize;
use std::io::Write;
use vmflow_ansible::VarBag;
use vmflow_pipeline::{Confirm, PipelineError, RunReport, Stage};

/// `[y/N]` prompt on stdin; anything but `y`/`yes` declines
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{} {} [y/N]: ", "?".yellow().bold(), prompt);
        if std::io::stderr().flush().is_err() {
            return false;
        }

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err() {
            return false;
        }
        matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Parse `KEY=VALUE` pairs given with `-e`. Values that parse as JSON keep
/// their type (`true`, `3`, `["a"]`), anything else is a string.
pub fn parse_extra_vars(pairs: &[String]) -> anyhow::Result<VarBag> {
    let mut vars = VarBag::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected KEY=VALUE, got '{}'", pair))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Empty variable name in '{}'", pair);
        }

        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        vars.insert(key.to_string(), value);
    }
    Ok(vars)
}

/// Summary printed after a pipeline run
pub fn print_report(report: &RunReport) {
    eprintln!();
    if let Some((stage, error)) = report.error() {
        eprintln!(
            "{} {} failed: {}",
            "Error:".red().bold(),
            stage.to_string().bold(),
            error
        );
        print_remediation(error);
    } else if let Some(failure) = report.verification_failure() {
        eprintln!("{} {}", "Error:".red().bold(), failure);
        print_remediation(&failure);
    } else if report.entered(Stage::Done) {
        eprintln!("{}", "✓ Done".green().bold());
    } else {
        eprintln!("{}", "Cancelled, nothing was changed".yellow());
    }
}

fn print_remediation(error: &PipelineError) {
    if let Some(hint) = error.remediation() {
        eprintln!("  {} {}", "→".cyan(), hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_extra_vars() {
        let vars = parse_extra_vars(&[
            "app_replicas=3".to_string(),
            "debug=true".to_string(),
            "greeting=hello world".to_string(),
            "empty=".to_string(),
        ])
        .unwrap();

        assert_eq!(vars["app_replicas"], json!(3));
        assert_eq!(vars["debug"], json!(true));
        assert_eq!(vars["greeting"], json!("hello world"));
        assert_eq!(vars["empty"], json!(""));
    }

    #[test]
    fn test_parse_extra_vars_rejects_bare_words() {
        assert!(parse_extra_vars(&["nope".to_string()]).is_err());
        assert!(parse_extra_vars(&["=value".to_string()]).is_err());
    }
}
