//! Project details shown in the viewer's info panel.

use ar_scene::project::Project;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPanel {
    pub name: String,
    pub description: Option<String>,
    pub content_type: String,
    pub tracking_quality: String,
    /// View count with thousands separators
    pub views: String,
}

impl InfoPanel {
    pub fn for_project(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            description: project
                .description
                .clone()
                .filter(|d| !d.trim().is_empty()),
            content_type: project.content_type.label(),
            tracking_quality: project.tracking_quality.to_string(),
            views: group_thousands(project.view_count),
        }
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
