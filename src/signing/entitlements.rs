//! Entitlements templates and provisioning profile contents

use serde::Deserialize;

/// Fill in the `$(...)` placeholders of an entitlements template
pub fn substitute_entitlements(template: &str, team_id: &str, bundle_id: &str, app_id: &str) -> String {
    template
        .replace("$(TeamIdentifier)", team_id)
        .replace("$(BundleIdentifier)", bundle_id)
        .replace("$(AppIdentifier)", app_id)
}

/// The part of a decoded provisioning profile we read
#[derive(Debug, Default, Deserialize)]
struct Profile {
    #[serde(rename = "Entitlements", default)]
    entitlements: ProfileEntitlements,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileEntitlements {
    #[serde(rename = "application-identifier")]
    application_identifier: Option<String>,
}

/// Prefix of the `application-identifier` entitlement in a decoded profile
///
/// The entitlement value is `<prefix>.<bundle id>`; only the prefix is kept.
/// Returns `None` for anything that is not a property list with that entry.
pub fn application_identifier_prefix(plist: &str) -> Option<String> {
    let profile: Profile = match plist::from_bytes(plist.trim_start().as_bytes()) {
        Ok(profile) => profile,
        Err(e) => {
            tracing::debug!("unreadable provisioning profile: {e}");
            return None;
        }
    };
    let value = profile.entitlements.application_identifier?;
    let prefix = value.trim().split('.').next()?;
    (!prefix.is_empty()).then(|| prefix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#;

    #[test]
    fn test_all_placeholders_substituted() {
        let out = substitute_entitlements(
            "$(AppIdentifier).$(BundleIdentifier) $(TeamIdentifier) $(TeamIdentifier)",
            "T",
            "com.b",
            "A",
        );
        assert_eq!(out, "A.com.b T T");
    }

    #[test]
    fn test_prefix_from_decoded_profile() {
        let plist = format!(
            r#"{HEADER}
<plist version="1.0">
<dict>
    <key>Entitlements</key>
    <dict>
        <key>application-identifier</key>
        <string>AB12CD34EF.com.example.*</string>
    </dict>
</dict>
</plist>"#
        );
        assert_eq!(application_identifier_prefix(&plist), Some("AB12CD34EF".to_string()));
    }

    #[test]
    fn test_only_entitlements_dict_is_consulted() {
        // A lookalike entry outside Entitlements, comments and values split
        // across lines must not confuse the lookup.
        let plist = format!(
            r#"{HEADER}
<plist version="1.0">
<dict>
    <key>Extras</key>
    <dict>
        <key>application-identifier</key>
        <string>DECOY.com.example</string>
    </dict>
    <key>CreationDate</key>
    <date>2020-01-02T03:04:05Z</date>
    <key>DeveloperCertificates</key>
    <array>
        <data>AAEC</data>
    </array>
    <key>Entitlements</key>
    <dict>
        <key>keychain-access-groups</key>
        <array><string>AB12CD34EF.*</string></array>
        <key>application-identifier</key>
        <!-- wildcard profile -->
        <string>
            XY98ZW76VU.com.example.*
        </string>
        <key>get-task-allow</key>
        <true/>
    </dict>
</dict>
</plist>"#
        );
        assert_eq!(application_identifier_prefix(&plist), Some("XY98ZW76VU".to_string()));
    }

    #[test]
    fn test_profile_without_entitlement() {
        assert_eq!(
            application_identifier_prefix(r#"<plist version="1.0"><dict/></plist>"#),
            None
        );
        assert_eq!(application_identifier_prefix("security: not a profile"), None);
    }
}
