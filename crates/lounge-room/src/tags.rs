//! Keyword tags attached to a newly created room.

use crate::protocol::Role;

/// Keyword → tag table, checked in order against `"{title} {role}"`.
const TAG_KEYWORDS: &[(&str, &str)] = &[
    ("prayer", "prayer"),
    ("worship", "worship"),
    ("bible", "bible"),
    ("healing", "healing"),
    ("host", "leadership"),
    ("guest", "guest"),
];

/// Derive discovery tags from a room title and the creator's role.
/// Listeners count as "guest", the name rooms were tagged with originally.
pub fn generate_tags(title: &str, role: Role) -> Vec<String> {
    let role = match role {
        Role::Listener => "guest",
        other => other.as_str(),
    };
    let keywords = format!("{title} {role}").to_lowercase();
    let mut tags: Vec<String> = Vec::new();
    for (keyword, tag) in TAG_KEYWORDS {
        if keywords.contains(keyword) && !tags.iter().any(|t| t == tag) {
            tags.push((*tag).to_string());
        }
    }
    tags
}
