//! Platform security settings: password, session, MFA and IP allow-list
//! policies.
//!
//! Settings are stored as a single JSON document. Updates arrive one section
//! at a time as partial objects that are validated and merged onto the
//! current values.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

pub const MIN_PASSWORD_LENGTH_FLOOR: u32 = 6;
pub const MIN_PASSWORD_MAX_AGE_DAYS: u32 = 30;
pub const MIN_CONCURRENT_SESSIONS: u32 = 1;
pub const MIN_SESSION_TIMEOUT_MINS: u32 = 5;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: u32,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_special_chars: bool,
    pub max_age_days: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_special_chars: true,
            max_age_days: 90,
        }
    }
}

impl PasswordPolicy {
    /// Check a candidate password against the policy.
    ///
    /// All unmet requirements are reported together.
    pub fn check(&self, password: &str) -> Result<(), CoreError> {
        let mut unmet = Vec::new();
        if password.chars().count() < self.min_length as usize {
            unmet.push(format!("at least {} characters", self.min_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            unmet.push("an uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            unmet.push("a lowercase letter".to_string());
        }
        if self.require_numbers && !password.chars().any(|c| c.is_ascii_digit()) {
            unmet.push("a number".to_string());
        }
        if self.require_special_chars && !password.chars().any(|c| !c.is_alphanumeric()) {
            unmet.push("a special character".to_string());
        }

        if unmet.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Password must contain {}",
                unmet.join(", ")
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    pub max_concurrent_sessions: u32,
    pub session_timeout_mins: u32,
    pub require_reauth: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 1,
            session_timeout_mins: 30,
            require_reauth: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaPolicy {
    pub enabled: bool,
    pub methods: Vec<String>,
    pub required: bool,
}

impl Default for MfaPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            methods: vec!["email".to_string(), "authenticator".to_string()],
            required: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpWhitelist {
    pub enabled: bool,
    pub ips: Vec<String>,
}

/// The full settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySettings {
    #[serde(default)]
    pub password_policy: PasswordPolicy,
    #[serde(default)]
    pub session_policy: SessionPolicy,
    #[serde(default)]
    pub mfa_policy: MfaPolicy,
    #[serde(default)]
    pub ip_whitelist: IpWhitelist,
}

/// Names one section of [`SecuritySettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsSection {
    PasswordPolicy,
    SessionPolicy,
    MfaPolicy,
    IpWhitelist,
}

impl SettingsSection {
    pub const ALL: [SettingsSection; 4] = [
        SettingsSection::PasswordPolicy,
        SettingsSection::SessionPolicy,
        SettingsSection::MfaPolicy,
        SettingsSection::IpWhitelist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingsSection::PasswordPolicy => "password_policy",
            SettingsSection::SessionPolicy => "session_policy",
            SettingsSection::MfaPolicy => "mfa_policy",
            SettingsSection::IpWhitelist => "ip_whitelist",
        }
    }
}

impl fmt::Display for SettingsSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingsSection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingsSection::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Invalid section '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PasswordPolicyPatch {
    min_length: Option<u32>,
    require_uppercase: Option<bool>,
    require_lowercase: Option<bool>,
    require_numbers: Option<bool>,
    require_special_chars: Option<bool>,
    max_age_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionPolicyPatch {
    max_concurrent_sessions: Option<u32>,
    session_timeout_mins: Option<u32>,
    require_reauth: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MfaPolicyPatch {
    enabled: Option<bool>,
    methods: Option<Vec<String>>,
    required: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct IpWhitelistPatch {
    enabled: Option<bool>,
    ips: Option<Vec<String>>,
}

fn parse_patch<T: serde::de::DeserializeOwned>(
    section: SettingsSection,
    data: Value,
) -> Result<T, CoreError> {
    serde_json::from_value(data)
        .map_err(|e| CoreError::Validation(format!("Invalid {section} update: {e}")))
}

impl SecuritySettings {
    /// Validate a partial section update and merge it in.
    ///
    /// On error nothing is changed.
    pub fn apply_update(&mut self, section: SettingsSection, data: Value) -> Result<(), CoreError> {
        match section {
            SettingsSection::PasswordPolicy => {
                let patch: PasswordPolicyPatch = parse_patch(section, data)?;
                if patch.min_length.is_some_and(|v| v < MIN_PASSWORD_LENGTH_FLOOR) {
                    return Err(CoreError::Validation(format!(
                        "Minimum password length must be at least {MIN_PASSWORD_LENGTH_FLOOR}"
                    )));
                }
                if patch.max_age_days.is_some_and(|v| v < MIN_PASSWORD_MAX_AGE_DAYS) {
                    return Err(CoreError::Validation(format!(
                        "Maximum password age must be at least {MIN_PASSWORD_MAX_AGE_DAYS} days"
                    )));
                }
                let policy = &mut self.password_policy;
                merge(&mut policy.min_length, patch.min_length);
                merge(&mut policy.require_uppercase, patch.require_uppercase);
                merge(&mut policy.require_lowercase, patch.require_lowercase);
                merge(&mut policy.require_numbers, patch.require_numbers);
                merge(&mut policy.require_special_chars, patch.require_special_chars);
                merge(&mut policy.max_age_days, patch.max_age_days);
            }
            SettingsSection::SessionPolicy => {
                let patch: SessionPolicyPatch = parse_patch(section, data)?;
                if patch
                    .max_concurrent_sessions
                    .is_some_and(|v| v < MIN_CONCURRENT_SESSIONS)
                {
                    return Err(CoreError::Validation(format!(
                        "Maximum concurrent sessions must be at least {MIN_CONCURRENT_SESSIONS}"
                    )));
                }
                if patch
                    .session_timeout_mins
                    .is_some_and(|v| v < MIN_SESSION_TIMEOUT_MINS)
                {
                    return Err(CoreError::Validation(format!(
                        "Session timeout must be at least {MIN_SESSION_TIMEOUT_MINS} minutes"
                    )));
                }
                let policy = &mut self.session_policy;
                merge(&mut policy.max_concurrent_sessions, patch.max_concurrent_sessions);
                merge(&mut policy.session_timeout_mins, patch.session_timeout_mins);
                merge(&mut policy.require_reauth, patch.require_reauth);
            }
            SettingsSection::MfaPolicy => {
                let patch: MfaPolicyPatch = parse_patch(section, data)?;
                let policy = &mut self.mfa_policy;
                merge(&mut policy.enabled, patch.enabled);
                merge(&mut policy.methods, patch.methods);
                merge(&mut policy.required, patch.required);
            }
            SettingsSection::IpWhitelist => {
                let patch: IpWhitelistPatch = parse_patch(section, data)?;
                if let Some(ips) = &patch.ips {
                    for ip in ips {
                        if ip.trim().parse::<IpAddr>().is_err() {
                            return Err(CoreError::Validation(format!(
                                "Invalid IP address '{ip}' in whitelist"
                            )));
                        }
                    }
                }
                let list = &mut self.ip_whitelist;
                merge(&mut list.enabled, patch.enabled);
                merge(
                    &mut list.ips,
                    patch
                        .ips
                        .map(|ips| ips.into_iter().map(|ip| ip.trim().to_string()).collect()),
                );
            }
        }
        Ok(())
    }

    /// Restore one section to its default values.
    pub fn reset(&mut self, section: SettingsSection) {
        match section {
            SettingsSection::PasswordPolicy => self.password_policy = PasswordPolicy::default(),
            SettingsSection::SessionPolicy => self.session_policy = SessionPolicy::default(),
            SettingsSection::MfaPolicy => self.mfa_policy = MfaPolicy::default(),
            SettingsSection::IpWhitelist => self.ip_whitelist = IpWhitelist::default(),
        }
    }

    /// JSON view of one section.
    pub fn section_json(&self, section: SettingsSection) -> Value {
        let value = match section {
            SettingsSection::PasswordPolicy => serde_json::to_value(&self.password_policy),
            SettingsSection::SessionPolicy => serde_json::to_value(&self.session_policy),
            SettingsSection::MfaPolicy => serde_json::to_value(&self.mfa_policy),
            SettingsSection::IpWhitelist => serde_json::to_value(&self.ip_whitelist),
        };
        value.unwrap_or(Value::Null)
    }

    /// Apply updates for several sections at once, all or nothing.
    pub fn apply_all(&mut self, updates: serde_json::Map<String, Value>) -> Result<(), CoreError> {
        let mut next = self.clone();
        for (key, data) in updates {
            let section: SettingsSection = key.parse()?;
            next.apply_update(section, data)?;
        }
        *self = next;
        Ok(())
    }
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let settings = SecuritySettings::default();
        assert_eq!(settings.password_policy.min_length, 8);
        assert_eq!(settings.password_policy.max_age_days, 90);
        assert_eq!(settings.session_policy.max_concurrent_sessions, 1);
        assert_eq!(settings.session_policy.session_timeout_mins, 30);
        assert!(!settings.mfa_policy.enabled);
        assert_eq!(settings.mfa_policy.methods, vec!["email", "authenticator"]);
        assert!(!settings.ip_whitelist.enabled);
        assert!(settings.ip_whitelist.ips.is_empty());
    }

    #[test]
    fn password_policy_reports_all_gaps() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("Str0ng!pass").is_ok());
        let err = policy.check("weak").unwrap_err().to_string();
        assert!(err.contains("at least 8 characters"));
        assert!(err.contains("uppercase"));
        assert!(err.contains("number"));
        assert!(err.contains("special"));
        assert!(!err.contains("lowercase"));
    }

    #[test]
    fn relaxed_policy_accepts_plain_passwords() {
        let policy = PasswordPolicy {
            min_length: 6,
            require_uppercase: false,
            require_lowercase: false,
            require_numbers: false,
            require_special_chars: false,
            max_age_days: 90,
        };
        assert!(policy.check("simple").is_ok());
        assert!(policy.check("short").is_err());
    }

    #[test]
    fn partial_update_merges() {
        let mut settings = SecuritySettings::default();
        settings
            .apply_update(
                SettingsSection::PasswordPolicy,
                json!({ "min_length": 12, "require_special_chars": false }),
            )
            .unwrap();
        assert_eq!(settings.password_policy.min_length, 12);
        assert!(!settings.password_policy.require_special_chars);
        assert!(settings.password_policy.require_uppercase);
    }

    #[test]
    fn update_enforces_minimums() {
        let mut settings = SecuritySettings::default();
        assert_matches!(
            settings.apply_update(SettingsSection::PasswordPolicy, json!({ "min_length": 4 })),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            settings.apply_update(SettingsSection::PasswordPolicy, json!({ "max_age_days": 10 })),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            settings.apply_update(
                SettingsSection::SessionPolicy,
                json!({ "max_concurrent_sessions": 0 })
            ),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            settings.apply_update(SettingsSection::SessionPolicy, json!({ "session_timeout_mins": 2 })),
            Err(CoreError::Validation(_))
        );
        assert_eq!(settings, SecuritySettings::default());
    }

    #[test]
    fn ip_whitelist_requires_addresses() {
        let mut settings = SecuritySettings::default();
        settings
            .apply_update(
                SettingsSection::IpWhitelist,
                json!({ "enabled": true, "ips": ["10.0.0.1", " ::1 "] }),
            )
            .unwrap();
        assert_eq!(settings.ip_whitelist.ips, vec!["10.0.0.1", "::1"]);
        assert_matches!(
            settings.apply_update(SettingsSection::IpWhitelist, json!({ "ips": ["not-an-ip"] })),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            settings.apply_update(SettingsSection::IpWhitelist, json!({ "ips": "10.0.0.1" })),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn reset_restores_one_section() {
        let mut settings = SecuritySettings::default();
        settings
            .apply_update(SettingsSection::MfaPolicy, json!({ "enabled": true }))
            .unwrap();
        settings
            .apply_update(SettingsSection::SessionPolicy, json!({ "session_timeout_mins": 60 }))
            .unwrap();
        settings.reset(SettingsSection::MfaPolicy);
        assert!(!settings.mfa_policy.enabled);
        assert_eq!(settings.session_policy.session_timeout_mins, 60);
    }

    #[test]
    fn apply_all_is_atomic() {
        let mut settings = SecuritySettings::default();
        let updates = json!({
            "mfa_policy": { "enabled": true },
            "session_policy": { "session_timeout_mins": 1 }
        });
        let Value::Object(map) = updates else { unreachable!() };
        assert!(settings.apply_all(map).is_err());
        assert!(!settings.mfa_policy.enabled);
    }

    #[test]
    fn section_names_parse() {
        assert_eq!(
            "ip_whitelist".parse::<SettingsSection>().unwrap(),
            SettingsSection::IpWhitelist
        );
        assert_matches!("firewall".parse::<SettingsSection>(), Err(CoreError::Validation(_)));
        assert_eq!(
            SecuritySettings::default().section_json(SettingsSection::IpWhitelist),
            json!({ "enabled": false, "ips": [] })
        );
    }
}
