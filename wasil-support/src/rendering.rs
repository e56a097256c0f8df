//! Text rendering utilities for human-friendly diagnostics.
//!
//! Every error the container reports names services by type. Full
//! `std::any::type_name` output is noisy (`my_app::infra::db::Pool`), so the
//! helpers here shorten names, draw resolution chains and propose
//! near-misses for unregistered services.

/// Renders a resolution chain on one line.
///
/// # Examples
/// ```
/// use wasil_support::rendering::render_chain;
///
/// let chain = vec!["Service", "Repo", "Service"];
/// assert_eq!(render_chain(&chain), "Service -> Repo -> Service");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// One hop of a lifetime path, rendered by [`render_lifetime_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// Short type name of the service.
    pub type_name: String,
    /// Lifetime label (e.g. "Singleton").
    pub lifetime: String,
}

impl PathEntry {
    pub fn new(type_name: impl Into<String>, lifetime: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            lifetime: lifetime.into(),
        }
    }
}

/// Renders a consumer-to-dependency path with lifetime labels, one hop per
/// line:
///
/// ```text
/// [Singleton] Cache
///      |
/// [Transient] Clock
/// ```
pub fn render_lifetime_path(entries: &[PathEntry]) -> String {
    let width = entries.iter().map(|e| e.lifetime.len()).max().unwrap_or(0);
    let mut out = String::new();

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(&" ".repeat(width / 2 + 1));
            out.push_str("|\n");
        }
        out.push_str(&format!(
            "[{:<width$}] {}\n",
            entry.lifetime,
            entry.type_name,
            width = width,
        ));
    }

    out
}

/// Shortens a fully qualified type name for display.
///
/// Only the last path segment of every component survives, generic
/// arguments included.
///
/// ```
/// use wasil_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::services::user::UserService"), "UserService");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Clock>"),
///     "Arc<dyn Clock>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(&segment);
                out.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    out.push_str(&segment);
    out
}

/// Returns `true` when `query` names the type `full_name`, either by its
/// full path or by its short form.
///
/// ```
/// use wasil_support::rendering::type_name_matches;
///
/// assert!(type_name_matches("app::db::Pool", "Pool"));
/// assert!(type_name_matches("app::db::Pool", "app::db::Pool"));
/// assert!(!type_name_matches("app::db::Pool", "PoolConfig"));
/// ```
pub fn type_name_matches(full_name: &str, query: &str) -> bool {
    let query = query.trim();
    full_name == query || shorten_type_name(full_name) == query
}

/// Proposes registered type names close to `requested`.
///
/// Substring hits on the full name score highest, then hits on the short
/// name, then a shared prefix of three or more characters.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_full = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let full = name.to_lowercase();
            let short = shorten_type_name(name).to_lowercase();

            if full.contains(&requested_full) || requested_full.contains(&full) {
                return Some((name, 100));
            }
            if short.contains(&requested_short) || requested_short.contains(&short) {
                return Some((name, 80));
            }

            let prefix = short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();
            (prefix >= 3).then_some((name, prefix * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_rendering() {
        assert_eq!(render_chain(&["A", "B", "A"]), "A -> B -> A");
        assert_eq!(render_chain(&["Solo"]), "Solo");
        let empty: [&str; 0] = [];
        assert_eq!(render_chain(&empty), "");
    }

    #[test]
    fn shorten_simple_and_generic() {
        assert_eq!(shorten_type_name("Config"), "Config");
        assert_eq!(shorten_type_name("a::b::Config"), "Config");
        assert_eq!(
            shorten_type_name("std::collections::HashMap<alloc::string::String, app::Repo>"),
            "HashMap<String, Repo>"
        );
        assert_eq!(shorten_type_name("&app::Repo"), "&Repo");
    }

    #[test]
    fn name_matching() {
        assert!(type_name_matches("app::Config", " Config "));
        assert!(!type_name_matches("app::Config", "app::Conf"));
    }

    #[test]
    fn suggest_finds_close_names() {
        let available = ["app::UserService", "app::UserRepository", "app::Mailer"];
        let suggestions = suggest_similar("UserServise", &available, 3);
        assert!(!suggestions.is_empty());
        assert!(suggestions.iter().all(|s| s.contains("User")));
    }

    #[test]
    fn suggest_no_match() {
        let suggestions = suggest_similar("Zzz", &["app::Database"], 3);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn suggest_skips_exact_request() {
        let suggestions = suggest_similar("app::Mailer", &["app::Mailer"], 3);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn lifetime_path_rendering() {
        let rendered = render_lifetime_path(&[
            PathEntry::new("Cache", "Singleton"),
            PathEntry::new("Clock", "Transient"),
        ]);
        assert!(rendered.contains("[Singleton] Cache"));
        assert!(rendered.contains("[Transient] Clock"));
        assert!(rendered.contains('|'));
    }
}
