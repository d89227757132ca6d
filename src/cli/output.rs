//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::application::ApplyOutcome;
use crate::stack::{Component, Environment};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Stack output row for table display.
#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Output")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of an apply run.
    #[must_use]
    pub fn format_apply(&self, outcomes: &[ApplyOutcome]) -> String {
        match self.format {
            OutputFormat::Json => to_json(&outcomes),
            OutputFormat::Text => {
                let mut output = String::new();
                for outcome in outcomes {
                    match outcome {
                        ApplyOutcome::DryRun {
                            instance_name,
                            template_path,
                            ..
                        } => {
                            let _ = writeln!(
                                output,
                                "{} Template for component instance {} written to {}",
                                "✓".green(),
                                instance_name.bold(),
                                template_path.display()
                            );
                        }
                        ApplyOutcome::Deployed {
                            instance_name,
                            stack_name,
                            stack_outputs,
                        } => {
                            let _ = writeln!(
                                output,
                                "{} Component instance {} deployed (stack {stack_name})",
                                "✓".green(),
                                instance_name.bold()
                            );
                            output.push_str(&Self::outputs_table(stack_outputs));
                        }
                    }
                }
                output
            }
        }
    }

    /// Formats described or deleted component stacks.
    #[must_use]
    pub fn format_components(&self, verb: &str, components: &[Component]) -> String {
        match self.format {
            OutputFormat::Json => to_json(&components),
            OutputFormat::Text => {
                let mut output = String::new();
                for component in components {
                    let _ = writeln!(
                        output,
                        "{} Stack {} {verb}",
                        "✓".green(),
                        component.stack_name.bold()
                    );
                    output.push_str(&Self::outputs_table(&component.stack_outputs));
                }
                if components.is_empty() {
                    output.push_str("   No component instances.\n");
                }
                output
            }
        }
    }

    /// Formats the environment.
    #[must_use]
    pub fn format_environment(&self, verb: &str, environment: &Environment) -> String {
        match self.format {
            OutputFormat::Json => to_json(environment),
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Environment {} {verb}\n",
                    "✓".green(),
                    environment.stack_name.bold()
                );
                output.push_str(&Self::outputs_table(&environment.stack_outputs));
                output
            }
        }
    }

    /// Formats an error.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "status": "error",
                "message": message,
            })),
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Renders stack outputs as a table with readable names.
    fn outputs_table(outputs: &BTreeMap<String, String>) -> String {
        if outputs.is_empty() {
            return String::new();
        }

        let rows: Vec<OutputRow> = outputs
            .iter()
            .map(|(name, value)| OutputRow {
                name: humanize(name),
                value: value.clone(),
            })
            .collect();

        let mut table = Table::new(rows).to_string();
        table.push('\n');
        table
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Splits a `PascalCase` output name into words, keeping known acronyms.
///
/// `CloudFormationStackConsole` becomes `CloudFormation Stack Console` and
/// `EcsTaskDefinition` becomes `ECS Task Definition`.
#[must_use]
pub fn humanize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words = String::with_capacity(name.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            let boundary = (c.is_ascii_uppercase()
                && (prev.is_ascii_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_ascii_uppercase() && next_is_lower)))
                || (c.is_ascii_digit() && prev.is_ascii_alphabetic());
            if boundary {
                words.push(' ');
            }
        }
        words.push(c);
    }

    words
        .split(' ')
        .map(|word| match word {
            "Ecs" => "ECS",
            "Id" => "ID",
            "Vpc" => "VPC",
            "Url" => "URL",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
        .replace("Cloud Formation", "CloudFormation")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_humanize_output_names() {
        assert_eq!(
            humanize("CloudFormationStackConsole"),
            "CloudFormation Stack Console"
        );
        assert_eq!(humanize("EcsTaskDefinition"), "ECS Task Definition");
        assert_eq!(humanize("Port80Endpoint"), "Port 80 Endpoint");
        assert_eq!(humanize("PublicSubnet1Id"), "Public Subnet 1 ID");
        assert_eq!(humanize("VpcId"), "VPC ID");
        assert_eq!(humanize("ClusterName"), "Cluster Name");
    }

    #[test]
    fn test_text_lists_outputs() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let component = Component {
            stack_name: String::from("oam-ecs-shop-shop-web"),
            stack_outputs: BTreeMap::from([(
                String::from("EcsServiceConsole"),
                String::from("https://console.aws.amazon.com/ecs"),
            )]),
        };

        let text = formatter.format_components("found", &[component]);
        assert!(text.contains("Stack oam-ecs-shop-shop-web found"));
        assert!(text.contains("ECS Service Console"));
        assert!(text.contains("https://console.aws.amazon.com/ecs"));
    }

    #[test]
    fn test_json_apply() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let outcomes = vec![ApplyOutcome::DryRun {
            instance_name: String::from("shop-web"),
            stack_name: String::from("oam-ecs-shop-shop-web"),
            template_path: PathBuf::from("/tmp/oam-ecs-shop-shop-web-template.yaml"),
        }];

        let json: serde_json::Value = serde_json::from_str(&formatter.format_apply(&outcomes)).unwrap();
        assert_eq!(json[0]["mode"], "dryRun");
        assert_eq!(json[0]["stackName"], "oam-ecs-shop-shop-web");
    }

    #[test]
    fn test_json_error() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_error("boom")).unwrap();
        assert_eq!(json["status"], "error");
    }
}
