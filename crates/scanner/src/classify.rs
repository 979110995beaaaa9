pub const MEDIA_EXTENSIONS: [&str; 3] = ["mp4", "mkv", "avi"];

const TARGET_SUFFIX: &str = "_progress_target.txt";
const PROGRESS_SUFFIX: &str = "_progress.txt";

/// What an entry is, keyed by its base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind<'a> {
    Media { base: &'a str },
    Progress { base: &'a str },
    Target { base: &'a str },
    Other,
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(cut) {
        return None;
    }
    let (base, tail) = name.split_at(cut);
    tail.eq_ignore_ascii_case(suffix).then_some(base)
}

/// Classify a filename by suffix, case-insensitively.
pub fn classify(name: &str) -> EntryKind<'_> {
    if let Some(base) = strip_suffix_ignore_case(name, TARGET_SUFFIX) {
        return EntryKind::Target { base };
    }
    if let Some(base) = strip_suffix_ignore_case(name, PROGRESS_SUFFIX) {
        return EntryKind::Progress { base };
    }
    if let Some((base, ext)) = name.rsplit_once('.') {
        if MEDIA_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)) {
            return EntryKind::Media { base };
        }
    }
    EntryKind::Other
}

pub fn mime_type_for(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
