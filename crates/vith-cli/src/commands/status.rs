//! Status command

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use vith_lifecycle::{ContainerReport, Lifecycle};

/// Render a report as aligned text lines.
pub fn format_report(report: &ContainerReport) -> String {
    let mut out = String::new();
    let status = report
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "not created".to_string());
    let address = report
        .address
        .map(|a| a.to_string())
        .unwrap_or_else(|| "-".to_string());

    out.push_str(&format!("{:<14} {}\n", "Container:", report.name));
    out.push_str(&format!("{:<14} {}\n", "Status:", status));
    out.push_str(&format!("{:<14} {}\n", "Address:", address));
    out.push_str(&format!(
        "{:<14} {}\n",
        "Provisioned:",
        if report.provisioned { "yes" } else { "no" }
    ));

    if report.host_bindings.is_empty() {
        out.push_str(&format!("{:<14} -\n", "Host names:"));
    } else {
        out.push_str("Host names:\n");
        for (hostname, address) in &report.host_bindings {
            out.push_str(&format!("  {:<30} {}\n", hostname, address));
        }
    }
    out
}

pub fn report_json(report: &ContainerReport) -> serde_json::Value {
    json!({
        "name": report.name,
        "exists": report.status.is_some(),
        "status": report.status.map(|s| s.to_string()),
        "status_code": report.status.map(|s| s.code()),
        "address": report.address.map(|a| a.to_string()),
        "provisioned": report.provisioned,
        "hosts": report
            .host_bindings
            .iter()
            .map(|(hostname, address)| json!({"hostname": hostname, "address": address}))
            .collect::<Vec<_>>(),
    })
}

/// Status command implementation
pub struct StatusCommand {
    lifecycle: Arc<Lifecycle>,
}

impl StatusCommand {
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Print the container report as text or JSON.
    pub async fn execute(&self, format: &str) -> Result<()> {
        let report = self
            .lifecycle
            .report()
            .await
            .context("Failed to query container status")?;

        match format {
            "json" => println!("{}", serde_json::to_string_pretty(&report_json(&report))?),
            "text" => print!("{}", format_report(&report)),
            other => anyhow::bail!("Unsupported output format: {}", other),
        }
        Ok(())
    }
}
