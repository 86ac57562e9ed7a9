//! Audit trail export.

use serde::Deserialize;

use super::entry::AuditLogEntry;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

pub fn export(entries: &[AuditLogEntry], format: ExportFormat) -> Result<String, serde_json::Error> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(entries),
        ExportFormat::Csv => Ok(to_csv(entries)),
    }
}

/// Quote a CSV field if it contains a comma, quote, or newline; embedded
/// quotes are doubled per RFC 4180.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn to_csv(entries: &[AuditLogEntry]) -> String {
    let mut out = String::from(
        "id,type,event,user_id,client_ip,user_agent,severity,timestamp,details\n",
    );
    for entry in entries {
        let row = [
            entry.id.to_string(),
            entry.entry_type.as_str().to_string(),
            entry.event.clone(),
            entry.user_id.clone().unwrap_or_default(),
            entry.client_ip.clone(),
            entry.user_agent.clone(),
            entry.severity.as_str().to_string(),
            entry.timestamp.to_rfc3339(),
            entry.details.to_string(),
        ];
        let line: Vec<String> = row.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{EntryType, Severity};
    use serde_json::json;

    #[test]
    fn csv_escapes_quotes_and_commas() {
        let entry = AuditLogEntry::new(
            EntryType::RequestLog,
            "request",
            "10.0.0.1",
            r#"Mozilla/5.0 (Windows, NT "10.0")"#,
            json!({"note": "a,b"}),
            Severity::Low,
        );
        let csv = export(&[entry], ExportFormat::Csv).unwrap();
        assert!(csv.contains(r#""Mozilla/5.0 (Windows, NT ""10.0"")""#));
        assert!(csv.lines().count() == 2);
    }

    #[test]
    fn json_export_round_trips() {
        let entry = AuditLogEntry::new(
            EntryType::UserAction,
            "profile_update",
            "10.0.0.1",
            "curl/8",
            json!({}),
            Severity::Low,
        );
        let out = export(&[entry.clone()], ExportFormat::Json).unwrap();
        let parsed: Vec<AuditLogEntry> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0].id, entry.id);
    }
}
