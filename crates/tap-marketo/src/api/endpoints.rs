//! Marketo endpoint URL builders

use super::types::ExportKind;

/// Identity service token URL
pub fn token_url(identity_url: &str) -> String {
    format!("{}/oauth/token", identity_url)
}

/// Daily API usage URL
pub fn usage_url(base_url: &str) -> String {
    format!("{}/rest/v1/stats/usage.json", base_url)
}

/// Bulk export creation URL
pub fn export_create_url(base_url: &str, kind: ExportKind) -> String {
    format!("{}/bulk/v1/{}/export/create.json", base_url, kind)
}

fn export_action_url(base_url: &str, kind: ExportKind, export_id: &str, action: &str) -> String {
    format!("{}/bulk/v1/{}/export/{}/{}.json", base_url, kind, export_id, action)
}

pub fn export_enqueue_url(base_url: &str, kind: ExportKind, export_id: &str) -> String {
    export_action_url(base_url, kind, export_id, "enqueue")
}

pub fn export_status_url(base_url: &str, kind: ExportKind, export_id: &str) -> String {
    export_action_url(base_url, kind, export_id, "status")
}

pub fn export_file_url(base_url: &str, kind: ExportKind, export_id: &str) -> String {
    export_action_url(base_url, kind, export_id, "file")
}

pub fn export_cancel_url(base_url: &str, kind: ExportKind, export_id: &str) -> String {
    export_action_url(base_url, kind, export_id, "cancel")
}

/// URL of a REST path relative to the instance, e.g. `rest/v1/lists.json`
pub fn rest_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url, path.trim_start_matches('/'))
}
