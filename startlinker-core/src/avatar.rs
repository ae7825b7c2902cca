//! Fallbacks for authors with a missing or broken avatar.

use url::form_urlencoded;

use crate::{model::Author, util::is_blank};

const AVATAR_SERVICE: &str = "https://ui-avatars.com/api/";

const PALETTE: [&str; 10] = [
    "3b82f6", // blue
    "8b5cf6", // purple
    "ef4444", // red
    "10b981", // green
    "f59e0b", // yellow
    "06b6d4", // cyan
    "ec4899", // pink
    "84cc16", // lime
    "f97316", // orange
    "6366f1", // indigo
];

/// Name to show for `author`: the display name, the username, or "User".
pub fn display_name(author: &Author) -> &str {
    author
        .display_name
        .as_deref()
        .filter(|name| !is_blank(name))
        .or_else(|| Some(author.username.as_str()).filter(|name| !is_blank(name)))
        .unwrap_or("User")
}

/// Up to two uppercase letters from the first word of the author's name.
pub fn initials(author: &Author) -> String {
    let first_word = author
        .display_name
        .as_deref()
        .filter(|name| !is_blank(name))
        .and_then(|name| name.split_whitespace().next())
        .or_else(|| Some(author.username.trim()).filter(|name| !name.is_empty()));
    match first_word {
        Some(word) => word.chars().take(2).flat_map(char::to_uppercase).collect(),
        None => "U".to_owned(),
    }
}

/// The author's avatar URL, or a generated initials image if it is missing.
pub fn avatar_url(author: &Author, size: u32) -> String {
    if let Some(avatar) = author.avatar.as_deref().filter(|a| !is_blank(a)) {
        return avatar.trim().to_owned();
    }
    let name = display_name(author);
    let color = PALETTE[name.chars().count() % PALETTE.len()];
    let initials: String = form_urlencoded::byte_serialize(initials(author).as_bytes()).collect();
    format!("{AVATAR_SERVICE}?name={initials}&background={color}&color=fff&size={size}&bold=true")
}

/// `url` if it points somewhere, `None` for the backend's placeholder values.
pub fn media_url(url: Option<&str>) -> Option<&str> {
    url.map(str::trim).filter(|u| !is_blank(u))
}
