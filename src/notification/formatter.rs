//! Renders notification payloads as operator-facing text.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use super::NotificationPayload;
use crate::models::{AggregationRecord, ErrorReport, error_report::scalar_to_string};

/// Number of stack lines kept in a message.
const STACK_LINES: usize = 5;

/// Context fields rendered in their own slots rather than in the context
/// section.
const RESERVED_FIELDS: &[&str] = &["endpoint", "webhook", "stack"];

/// Formats a payload, dispatching on its kind.
pub fn format_payload(payload: &NotificationPayload) -> String {
    match payload {
        NotificationPayload::Single { error_type, report } => format_single(error_type, report),
        NotificationPayload::Aggregated(record) => format_aggregated(record),
    }
}

/// Formats the immediate notification for a single occurrence.
pub fn format_single(error_type: &str, report: &ErrorReport) -> String {
    let client = report.client_id.as_deref().unwrap_or("N/A");
    let endpoint = report
        .context_str("endpoint")
        .or_else(|| report.context_str("webhook"))
        .unwrap_or_else(|| "N/A".to_string());

    let mut message = String::from("🚨 *Server Error* 🚨\n\n");
    let _ = writeln!(message, "*Type:* {error_type}");
    let _ = writeln!(message, "*Client:* {client}");
    let _ = writeln!(message, "*Endpoint:* {endpoint}");
    let _ = writeln!(message, "*Error:* {}\n", report.message);

    let context: Vec<(&String, String)> = report
        .context
        .iter()
        .filter(|(field, _)| !RESERVED_FIELDS.contains(&field.as_str()))
        .filter(|(field, _)| report.client_id.is_none() || !is_client_field(report, field))
        .filter_map(|(field, value)| scalar_to_string(value).map(|v| (field, v)))
        .collect();
    if !context.is_empty() {
        message.push_str("*Context:*\n");
        for (field, value) in context {
            let _ = writeln!(message, "• {field}: {value}");
        }
        message.push('\n');
    }

    if let Some(stack) = report.context_str("stack") {
        let _ = write!(message, "*Stack:*\n```\n{}\n```\n\n", format_stack(&stack));
    }

    let _ = write!(message, "*Timestamp:* {}", format_date(&report.timestamp));
    message
}

/// Formats the summary of a window with repeated occurrences.
pub fn format_aggregated(record: &AggregationRecord) -> String {
    let clients = record.client_breakdown();

    let mut message = format!("🚨 *Aggregated Error* (x{}) 🚨\n\n", record.count);
    let _ = writeln!(message, "*Type:* {}", record.error_type);
    let _ = writeln!(message, "*Message:* {}\n", record.message());

    message.push_str("*Statistics:*\n");
    let _ = writeln!(message, "• Occurrences: {}", record.count);
    let _ = writeln!(message, "• First: {}", format_date(&record.first_seen_at));
    let _ = writeln!(message, "• Last: {}", format_date(&record.last_seen_at));
    let _ = writeln!(message, "• Affected clients: {}\n", clients.len());

    message.push_str("*Per-client details:*\n");
    for (client, count) in &clients {
        let _ = writeln!(message, "- {client} ({count}x)");
    }

    if let Some(stack) = record.latest().and_then(|r| r.context_str("stack")) {
        let _ = write!(message, "\n*Latest stack:*\n```\n{}\n```", format_stack(&stack));
    }

    message
}

/// Formats a timestamp as `DD/MM/YYYY HH:MM:SS`.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%d/%m/%Y %H:%M:%S").to_string()
}

/// Keeps the first few lines of a stack trace, trimmed.
pub fn format_stack(stack: &str) -> String {
    stack.lines().take(STACK_LINES).map(str::trim).collect::<Vec<_>>().join("\n")
}

// The client id already has its own line.
fn is_client_field(report: &ErrorReport, field: &str) -> bool {
    report.context_str(field).as_deref() == report.client_id.as_deref()
}
