//! Device description attached to every analytics event.

use serde::Serialize;

/// Operating system and model derived from the navigator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub os_type: String,
    pub os_version: String,
    pub device_model: String,
    pub user_agent: String,
}

impl DeviceInfo {
    /// Classify a user agent. iOS and Android are recognised, everything else is
    /// reported as `other` with an `unknown` version.
    pub fn from_user_agent(user_agent: &str, platform: &str) -> Self {
        let (os_type, os_version) = if ["iPad", "iPhone", "iPod"]
            .iter()
            .any(|device| user_agent.contains(device))
        {
            ("iOS", ios_version(user_agent))
        } else if user_agent.contains("Android") {
            ("Android", android_version(user_agent))
        } else {
            ("other", None)
        };

        Self {
            os_type: os_type.to_string(),
            os_version: os_version.unwrap_or_else(|| "unknown".to_string()),
            device_model: platform.to_string(),
            user_agent: user_agent.to_string(),
        }
    }
}

/// `... OS 17_2_1 like Mac OS X` → `17.2`
fn ios_version(user_agent: &str) -> Option<String> {
    user_agent.match_indices("OS ").find_map(|(at, marker)| {
        let rest = &user_agent[at + marker.len()..];
        let major = leading_digits(rest)?;
        let rest = rest[major.len()..].strip_prefix('_')?;
        let minor = leading_digits(rest)?;
        Some(format!("{}.{}", major, minor))
    })
}

/// `Android 14;` → `14`, `Android 8.1.0;` → `8.1`
fn android_version(user_agent: &str) -> Option<String> {
    let (at, marker) = user_agent.match_indices("Android ").next()?;
    let rest = &user_agent[at + marker.len()..];
    let major = leading_digits(rest)?;
    let rest = &rest[major.len()..];
    match rest.strip_prefix('.') {
        Some(after_dot) => {
            let minor = leading_digits(after_dot).unwrap_or("");
            Some(format!("{}.{}", major, minor))
        }
        None => Some(major.to_string()),
    }
}

fn leading_digits(s: &str) -> Option<&str> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    (end > 0).then(|| &s[..end])
}
