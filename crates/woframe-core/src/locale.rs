#![forbid(unsafe_code)]

//! Language tag helpers.
//!
//! Languages arrive from `Accept-Language`, from form values and from
//! session preferences in every imaginable spelling (`de_DE.UTF-8`,
//! `EN-us`, `fr`). Everything is normalized to `ll` / `ll-CC` before it is
//! stored or compared.

/// A normalized language tag such as `en` or `de-AT`.
pub type Locale = String;

/// Normalize a raw tag; `None` for empty input.
///
/// Encoding (`.UTF-8`) and modifier (`@euro`) suffixes are dropped, `_` is
/// replaced with `-`, the language part is lowercased and a two-letter
/// region is uppercased. `C` and `POSIX` map to `en`.
pub fn normalize_locale(raw: &str) -> Option<Locale> {
    let raw = raw.trim();
    let raw = raw.split('@').next().unwrap_or(raw);
    let raw = raw.split('.').next().unwrap_or(raw).trim();
    if raw.is_empty() {
        return None;
    }
    if raw.eq_ignore_ascii_case("c") || raw.eq_ignore_ascii_case("posix") {
        return Some("en".to_owned());
    }

    let normalized = raw.replace('_', "-");
    let mut parts = normalized.split('-');
    let language = parts.next().unwrap_or_default().to_ascii_lowercase();
    if language.is_empty() {
        return None;
    }
    let mut out = language;
    for part in parts.filter(|p| !p.is_empty()) {
        out.push('-');
        if part.len() == 2 {
            out.push_str(&part.to_ascii_uppercase());
        } else {
            out.push_str(part);
        }
    }
    Some(out)
}

/// The language part of a tag (`de-AT` → `de`).
pub fn primary_language(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

/// Parse an `Accept-Language` header into normalized tags, best first.
///
/// Entries with `q=0` and the `*` wildcard are dropped; equal weights keep
/// header order.
pub fn parse_accept_language(header: &str) -> Vec<Locale> {
    let mut weighted: Vec<(u32, usize, Locale)> = header
        .split(',')
        .enumerate()
        .filter_map(|(position, entry)| {
            let mut pieces = entry.split(';');
            let tag = pieces.next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }
            let quality = pieces
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);
            if quality <= 0.0 {
                return None;
            }
            let millis = (quality * 1000.0).round() as u32;
            normalize_locale(tag).map(|locale| (millis, position, locale))
        })
        .collect();

    weighted.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut out: Vec<Locale> = Vec::with_capacity(weighted.len());
    for (_, _, locale) in weighted {
        if !out.contains(&locale) {
            out.push(locale);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_posix_style_tags() {
        assert_eq!(normalize_locale("fr_FR.UTF-8").as_deref(), Some("fr-FR"));
        assert_eq!(normalize_locale("EN-us").as_deref(), Some("en-US"));
        assert_eq!(normalize_locale("de_DE@euro").as_deref(), Some("de-DE"));
        assert_eq!(normalize_locale("POSIX").as_deref(), Some("en"));
        assert_eq!(normalize_locale("zh-Hant-TW").as_deref(), Some("zh-Hant-TW"));
        assert_eq!(normalize_locale("  "), None);
    }

    #[test]
    fn accept_language_is_quality_sorted() {
        let langs = parse_accept_language("da, en-gb;q=0.8, en;q=0.7, fr;q=0, *;q=0.1");
        assert_eq!(langs, vec!["da", "en-GB", "en"]);
    }

    #[test]
    fn accept_language_keeps_order_for_equal_weights() {
        let langs = parse_accept_language("de-AT;q=0.9,de;q=0.9,en");
        assert_eq!(langs, vec!["en", "de-AT", "de"]);
        assert!(parse_accept_language("").is_empty());
    }

    #[test]
    fn primary_language_strips_region() {
        assert_eq!(primary_language("de-AT"), "de");
        assert_eq!(primary_language("en"), "en");
    }
}
