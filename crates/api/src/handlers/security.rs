//! Handlers for `/security`: the audit trail and the settings document.

use axum::extract::{Query, State};
use axum::Json;
use gatehouse_core::audit::{verify_chain, AuditAction, AuditResource, ChainVerification};
use gatehouse_core::security::{SecuritySettings, SettingsSection};
use gatehouse_core::types::{DbId, Timestamp};
use gatehouse_db::models::audit::{AuditLog, AuditQuery};
use gatehouse_db::repositories::{AuditLogRepo, SecuritySettingsRepo};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::audit;
use crate::error::{AppError, AppResult};
use crate::handlers::bulk::{parse_operation, ManageRequest, ManageResponse, OperationResult};
use crate::middleware::rbac::{Permit, SecurityRead, SecurityUpdate};
use crate::query::PageParams;
use crate::response::{DataResponse, PagedResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /security/logs`.
///
/// Fields are listed flat; `serde(flatten)` does not mix with
/// urlencoded numbers.
#[derive(Debug, Default, Deserialize)]
pub struct LogsParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub user_id: Option<DbId>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub ip_address: Option<String>,
}

impl LogsParams {
    fn into_parts(self) -> AppResult<(PageParams, AuditQuery)> {
        // Unknown verbs and resources would only ever match nothing.
        if let Some(action) = self.action.as_deref() {
            action.parse::<AuditAction>()?;
        }
        if let Some(resource) = self.resource.as_deref() {
            resource.parse::<AuditResource>()?;
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(AppError::BadRequest(
                    "'from' must not be later than 'to'".to_string(),
                ));
            }
        }
        Ok((
            PageParams {
                page: self.page,
                limit: self.limit,
            },
            AuditQuery {
                from: self.from,
                to: self.to,
                user_id: self.user_id,
                action: self.action,
                resource: self.resource,
                ip_address: self.ip_address,
            },
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsAction {
    Update,
    Reset,
}

/// One operation of `POST /security/settings/manage`.
#[derive(Debug, Deserialize)]
pub struct SettingsOperation {
    pub action: SettingsAction,
    pub section: String,
    #[serde(default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

/// GET /api/v1/security/logs
///
/// Newest first, filtered by any combination of date range, user, action,
/// resource and IP address.
pub async fn list_logs(
    State(state): State<AppState>,
    Permit(_user, _): Permit<SecurityRead>,
    Query(params): Query<LogsParams>,
) -> AppResult<Json<PagedResponse<AuditLog>>> {
    let (page, filter) = params.into_parts()?;
    let window = page.window();
    let logs = AuditLogRepo::query(&state.pool, &filter, window.limit, window.offset()).await?;
    let total = AuditLogRepo::count(&state.pool, &filter).await?;
    Ok(Json(PagedResponse::new(logs, window, total)))
}

/// GET /api/v1/security/logs/verify
///
/// Recompute the hash chain from the first entry and report the first
/// entry whose stored hash does not match.
pub async fn verify_logs(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<SecurityRead>,
) -> AppResult<Json<DataResponse<ChainVerification>>> {
    let entries = AuditLogRepo::fetch_chain(&state.pool).await?;
    let result = verify_chain(entries.iter().map(AuditLog::to_chain_link));

    if result.chain_valid {
        tracing::info!(entries = result.verified_entries, "Audit chain verified");
    } else {
        tracing::error!(
            user_id = auth_user.user_id,
            first_break = ?result.first_break,
            verified = result.verified_entries,
            "Audit chain integrity check failed",
        );
    }
    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// GET /api/v1/security/settings
///
/// Defaults are returned until the document is first saved.
pub async fn get_settings(
    State(state): State<AppState>,
    Permit(_user, _): Permit<SecurityRead>,
) -> AppResult<Json<DataResponse<SecuritySettings>>> {
    let settings = SecuritySettingsRepo::get(&state.pool).await?;
    Ok(Json(DataResponse { data: settings }))
}

/// PUT /api/v1/security/settings
///
/// Body maps section names to partial updates. All sections are applied or
/// none are.
pub async fn update_settings(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<SecurityUpdate>,
    Json(updates): Json<Map<String, Value>>,
) -> AppResult<Json<DataResponse<SecuritySettings>>> {
    if updates.is_empty() {
        return Err(AppError::BadRequest(
            "At least one settings section is required".to_string(),
        ));
    }
    let sections = updates.keys().cloned().collect::<Vec<_>>().join(", ");

    let mut settings = SecuritySettingsRepo::get(&state.pool).await?;
    settings.apply_all(updates)?;
    let row = SecuritySettingsRepo::save(&state.pool, &settings, auth_user.user_id).await?;

    tracing::info!(user_id = auth_user.user_id, %sections, "Security settings updated");
    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Update,
        AuditResource::Security,
        format!("Security settings updated: {sections}"),
    )
    .await;
    Ok(Json(DataResponse { data: row.settings.0 }))
}

/// POST /api/v1/security/settings/manage
///
/// Each operation updates or resets one section. Operations apply in order
/// to a working copy that is saved once at the end if any succeeded.
pub async fn manage_settings(
    State(state): State<AppState>,
    Permit(auth_user, _): Permit<SecurityUpdate>,
    Json(input): Json<ManageRequest>,
) -> AppResult<Json<DataResponse<ManageResponse>>> {
    let operations = input.into_operations()?;
    let count = operations.len();

    let mut settings = SecuritySettingsRepo::get(&state.pool).await?;
    let mut changed = false;
    let mut results = Vec::with_capacity(count);

    for raw in operations {
        let result = match parse_operation::<SettingsOperation>(raw) {
            Ok(op) => {
                let action = match op.action {
                    SettingsAction::Update => "update",
                    SettingsAction::Reset => "reset",
                };
                match apply_operation(&mut settings, op) {
                    Ok(section) => {
                        changed = true;
                        OperationResult::succeeded(action)
                            .with("section", section.as_str())
                            .with("settings", settings.section_json(section))
                    }
                    Err(e) => OperationResult::failed(action, &e),
                }
            }
            Err(rejected) => rejected,
        };
        results.push(result);
    }

    if changed {
        SecuritySettingsRepo::save(&state.pool, &settings, auth_user.user_id).await?;
    }

    audit::record(
        &state.pool,
        &auth_user.actor(),
        AuditAction::Manage,
        AuditResource::Security,
        format!("Bulk security settings operations performed: {count} operations"),
    )
    .await;

    Ok(Json(DataResponse {
        data: ManageResponse::new(results),
    }))
}

fn apply_operation(
    settings: &mut SecuritySettings,
    op: SettingsOperation,
) -> AppResult<SettingsSection> {
    let section: SettingsSection = op.section.parse()?;
    match op.action {
        SettingsAction::Update => settings.apply_update(section, op.data)?,
        SettingsAction::Reset => settings.reset(section),
    }
    Ok(section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use gatehouse_core::error::CoreError;
    use serde_json::json;

    fn op(value: Value) -> SettingsOperation {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn update_operation_merges_section() {
        let mut settings = SecuritySettings::default();
        let section = apply_operation(
            &mut settings,
            op(json!({
                "action": "update",
                "section": "mfa_policy",
                "data": { "enabled": true }
            })),
        )
        .unwrap();
        assert_eq!(section, SettingsSection::MfaPolicy);
        assert!(settings.mfa_policy.enabled);
    }

    #[test]
    fn reset_operation_restores_defaults() {
        let mut settings = SecuritySettings::default();
        settings.ip_whitelist.enabled = true;
        apply_operation(
            &mut settings,
            op(json!({ "action": "reset", "section": "ip_whitelist" })),
        )
        .unwrap();
        assert_eq!(settings.ip_whitelist, Default::default());
    }

    #[test]
    fn unknown_section_is_rejected() {
        let mut settings = SecuritySettings::default();
        let result = apply_operation(
            &mut settings,
            op(json!({ "action": "reset", "section": "firewall" })),
        );
        assert_matches!(result, Err(AppError::Core(CoreError::Validation(msg))) if msg.contains("firewall"));
    }

    #[test]
    fn unknown_action_reports_invalid_action() {
        let rejected = parse_operation::<SettingsOperation>(json!({
            "action": "wipe",
            "section": "mfa_policy"
        }))
        .unwrap_err();
        assert_eq!(rejected.action, "wipe");
        assert_eq!(rejected.message.as_deref(), Some("Invalid action"));
    }

    #[test]
    fn logs_params_reject_unknown_action() {
        let params = LogsParams {
            action: Some("explode".to_string()),
            ..Default::default()
        };
        assert_matches!(
            params.into_parts(),
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }

    #[test]
    fn logs_params_reject_inverted_range() {
        let now = chrono::Utc::now();
        let params = LogsParams {
            from: Some(now),
            to: Some(now - chrono::Duration::days(1)),
            ..Default::default()
        };
        assert_matches!(params.into_parts(), Err(AppError::BadRequest(_)));
    }
}
