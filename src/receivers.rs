//! Which installed applications can take a given content type.

use serde::{Deserialize, Serialize};

use crate::Result;

/// An application able to receive the shared content.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverCandidate {
    /// Platform identity of the application (desktop file id, package name).
    pub id: String,
    pub label: String,
    pub icon: Option<String>,
    /// How to invoke the application. For desktop entries this is the `Exec`
    /// line with its field codes still in place.
    #[serde(skip)]
    pub invocation: String,
}

pub trait ReceiverResolver: Send + Sync {
    /// Lists receivers for `content_type`. Called fresh for every request.
    fn resolve(&self, content_type: &str) -> Result<Vec<ReceiverCandidate>>;
}

/// Leaves enumeration to the platform's own chooser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemReceivers;

impl ReceiverResolver for SystemReceivers {
    fn resolve(&self, _content_type: &str) -> Result<Vec<ReceiverCandidate>> {
        Ok(Vec::new())
    }
}

/// Lowercases and strips parameters, `Text/Plain; charset=utf-8` becomes
/// `text/plain`.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether a receiver declaring `declared` accepts `requested`. Wildcards
/// (`image/*`, `*/*`) are honored on both sides.
pub fn content_type_matches(declared: &str, requested: &str) -> bool {
    let declared = normalize_content_type(declared);
    let requested = normalize_content_type(requested);
    let (Some((d_type, d_sub)), Some((r_type, r_sub))) =
        (declared.split_once('/'), requested.split_once('/'))
    else {
        return false;
    };

    let type_ok = d_type == "*" || r_type == "*" || d_type == r_type;
    let sub_ok = d_sub == "*" || r_sub == "*" || d_sub == r_sub;
    type_ok && sub_ok
}

/// The parts of a freedesktop desktop entry we care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub struct DesktopEntry {
    pub name: String,
    pub icon: Option<String>,
    pub exec: String,
    pub mime_types: Vec<String>,
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
impl DesktopEntry {
    /// Parses the `[Desktop Entry]` group. Returns `None` for entries that are
    /// not launchable applications or that ask to stay hidden.
    pub fn parse(contents: &str) -> Option<Self> {
        let mut in_main_group = false;
        let mut is_application = false;
        let mut hidden = false;
        let mut entry = DesktopEntry::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_main_group = line == "[Desktop Entry]";
                continue;
            }
            if !in_main_group {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Type" => is_application = value == "Application",
                "Name" => entry.name = value.to_string(),
                "Icon" => entry.icon = Some(value.to_string()).filter(|v| !v.is_empty()),
                "Exec" => entry.exec = value.to_string(),
                "MimeType" => {
                    entry.mime_types = value
                        .split(';')
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                "Hidden" | "NoDisplay" => hidden |= value == "true",
                _ => {}
            }
        }

        if !is_application || hidden || entry.exec.is_empty() || entry.name.is_empty() {
            return None;
        }
        Some(entry)
    }

    pub fn accepts(&self, content_type: &str) -> bool {
        self.mime_types
            .iter()
            .any(|declared| content_type_matches(declared, content_type))
    }

    pub fn into_candidate(self, id: String) -> ReceiverCandidate {
        ReceiverCandidate {
            id,
            label: self.name,
            icon: self.icon,
            invocation: self.exec,
        }
    }
}

/// Splits an `Exec` line into arguments and substitutes the file field codes.
///
/// `%f`/`%u` take the first file, `%F`/`%U` all of them, `%%` is a literal
/// percent and every other code is dropped. `paths` feed `%f`/`%F`, `urls`
/// feed `%u`/`%U`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub fn expand_exec(exec: &str, paths: &[String], urls: &[String]) -> Vec<String> {
    let mut args = Vec::new();
    for token in split_exec(exec) {
        match token.as_str() {
            "%F" => args.extend(paths.iter().cloned()),
            "%U" => args.extend(urls.iter().cloned()),
            _ => {
                let mut arg = String::new();
                let mut chars = token.chars();
                while let Some(c) = chars.next() {
                    if c != '%' {
                        arg.push(c);
                        continue;
                    }
                    match chars.next() {
                        Some('%') => arg.push('%'),
                        Some('f') => arg.push_str(paths.first().map(String::as_str).unwrap_or("")),
                        Some('u') => arg.push_str(urls.first().map(String::as_str).unwrap_or("")),
                        _ => {}
                    }
                }
                if !arg.is_empty() {
                    args.push(arg);
                }
            }
        }
    }
    args
}

/// Whitespace separated, double quotes group, backslash escapes inside quotes.
fn split_exec(exec: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    let mut chars = exec.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWER: &str = "\
[Desktop Entry]
Type=Application
Name=Image Viewer
Name[de]=Bildbetrachter
Icon=viewer
Exec=viewer --open %U
MimeType=image/png;image/jpeg;

[Desktop Action new-window]
Name=New Window
Exec=viewer --new
";

    #[test]
    fn normalizes_content_types() {
        assert_eq!(normalize_content_type("Text/Plain; charset=UTF-8"), "text/plain");
        assert_eq!(normalize_content_type(" image/PNG "), "image/png");
    }

    #[test]
    fn matches_with_wildcards() {
        assert!(content_type_matches("image/png", "image/png"));
        assert!(content_type_matches("image/*", "image/jpeg"));
        assert!(content_type_matches("image/png", "image/*"));
        assert!(content_type_matches("*/*", "application/pdf"));
        assert!(content_type_matches("application/pdf", "*/*"));
        assert!(!content_type_matches("image/png", "image/jpeg"));
        assert!(!content_type_matches("text/*", "image/png"));
        assert!(!content_type_matches("garbage", "image/png"));
    }

    #[test]
    fn parses_desktop_entry() {
        let entry = DesktopEntry::parse(VIEWER).unwrap();
        assert_eq!(entry.name, "Image Viewer");
        assert_eq!(entry.icon.as_deref(), Some("viewer"));
        assert_eq!(entry.exec, "viewer --open %U");
        assert_eq!(entry.mime_types, vec!["image/png", "image/jpeg"]);
        assert!(entry.accepts("image/jpeg"));
        assert!(entry.accepts("image/*"));
        assert!(!entry.accepts("application/pdf"));
    }

    #[test]
    fn skips_hidden_and_non_application_entries() {
        let hidden = VIEWER.replace("Type=Application", "Type=Application\nNoDisplay=true");
        assert!(DesktopEntry::parse(&hidden).is_none());

        let link = VIEWER.replace("Type=Application", "Type=Link");
        assert!(DesktopEntry::parse(&link).is_none());

        let no_exec = "[Desktop Entry]\nType=Application\nName=Broken\n";
        assert!(DesktopEntry::parse(no_exec).is_none());
    }

    #[test]
    fn expands_field_codes() {
        let paths = vec!["/tmp/a b.png".to_string(), "/tmp/c.png".to_string()];
        let urls = vec![
            "file:///tmp/a%20b.png".to_string(),
            "file:///tmp/c.png".to_string(),
        ];

        assert_eq!(
            expand_exec("viewer --open %U", &paths, &urls),
            vec!["viewer", "--open", "file:///tmp/a%20b.png", "file:///tmp/c.png"]
        );
        assert_eq!(
            expand_exec("gimp-2.10 %f", &paths, &urls),
            vec!["gimp-2.10", "/tmp/a b.png"]
        );
        assert_eq!(
            expand_exec("mailer %i --attach=%f --rate=100%%", &paths, &urls),
            vec!["mailer", "--attach=/tmp/a b.png", "--rate=100%"]
        );
        assert_eq!(
            expand_exec("\"/opt/My App/bin/app\" %F", &paths, &urls),
            vec!["/opt/My App/bin/app", "/tmp/a b.png", "/tmp/c.png"]
        );
    }

    #[test]
    fn system_receivers_leave_listing_to_platform() {
        assert!(SystemReceivers.resolve("image/png").unwrap().is_empty());
    }

    #[test]
    fn native_listing_carries_icons() {
        let candidate: ReceiverCandidate = serde_json::from_str(
            r#"{
                "id": "com.example.mail/.ComposeActivity",
                "label": "Mail",
                "icon": "android.resource://com.example.mail/2131165270"
            }"#,
        )
        .unwrap();
        assert_eq!(
            candidate.icon.as_deref(),
            Some("android.resource://com.example.mail/2131165270")
        );
        assert!(candidate.invocation.is_empty());
    }
}
