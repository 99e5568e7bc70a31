use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Trailing legal-form tokens stripped in step 4. Local-language equivalents
/// of "Inc."/"Ltd.", loaded here as a fixed list; larger deployments can
/// extend this via `pipeline-config`'s known-mappings table path, but the
/// baseline set always applies.
const LEGAL_FORM_TOKENS: &[&str] = &[
    "inc", "ltd", "llc", "gmbh", "sro", "s.r.o", "as", "a.s", "spol", "kg", "ag", "sa", "plc",
];

/// Trailing service tokens stripped in step 5.
const SERVICE_TOKENS: &[&str] = &["newsletter", "alerts", "support", "noreply", "no-reply", "info", "notifications"];

/// Domain suffixes stripped in step 6.
const DOMAIN_SUFFIXES: &[&str] = &[".cz", ".com", ".sk", ".eu", ".net", ".org", ".de", ".co.uk"];

static DISPLAY_ADDR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?P<display>[^<]*)<(?P<addr>[^>]+)>\s*$"#).expect("static regex is valid")
});

static NON_ALNUM_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static regex is valid"));

/// The eight-step, order-sensitive correspondent normalization pipeline.
/// Idempotent: `normalize(normalize(x)) == normalize(x)` for all `x`
/// (verified by a property test below).
#[must_use]
pub fn normalize(raw: &str) -> String {
    // 1. lowercase
    let mut s = raw.to_lowercase();

    // 2. strip surrounding whitespace
    s = s.trim().to_string();

    // 3. extract name from "Display <addr>" shape if present
    if let Some(caps) = DISPLAY_ADDR_RE.captures(&s) {
        let display = caps.name("display").map(|m| m.as_str().trim()).unwrap_or("");
        s = if display.is_empty() {
            caps.name("addr").map(|m| m.as_str().to_string()).unwrap_or(s.clone())
        } else {
            display.to_string()
        };
    }

    // 4. remove trailing legal-form tokens
    s = strip_trailing_tokens(&s, LEGAL_FORM_TOKENS);

    // 5. remove trailing service tokens
    s = strip_trailing_tokens(&s, SERVICE_TOKENS);

    // 6. strip domain suffixes
    for suffix in DOMAIN_SUFFIXES {
        if s.ends_with(suffix) {
            s.truncate(s.len() - suffix.len());
        }
    }

    // 7. NFKD-decompose and drop non-letter/digit runs
    let decomposed: String = s.nfkd().collect();
    let stripped = NON_ALNUM_RUN_RE.replace_all(&decomposed, " ").to_string();

    // 8. collapse whitespace
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_trailing_tokens(input: &str, tokens: &[&str]) -> String {
    let trimmed = input.trim_end_matches(|c: char| c.is_whitespace() || c == '.' || c == ',');
    for token in tokens {
        let candidate = trimmed.strip_suffix(token);
        if let Some(rest) = candidate {
            // only strip if it's a whole trailing word, not a substring of one
            if rest.is_empty() || rest.ends_with(char::is_whitespace) || rest.ends_with('.') {
                return rest.trim_end().trim_end_matches('.').trim_end().to_string();
            }
        }
    }
    input.to_string()
}

/// Title-cases a normalized key for use as a fallback display name when no
/// `KNOWN_MAPPINGS` entry exists.
#[must_use]
pub fn title_case(normalized_key: &str) -> String {
    normalized_key
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extracts_display_name_from_angle_bracket_form() {
        assert_eq!(normalize("Aukro s.r.o. <noreply@aukro.cz>"), "aukro");
    }

    #[test]
    fn email_only_sender_normalizes_to_local_part_like_key() {
        let key = normalize("aukro.cz");
        assert_eq!(key, "aukro");
    }

    #[test]
    fn strips_legal_form_and_service_tokens() {
        assert_eq!(normalize("AUKRO s.r.o."), "aukro");
        assert_eq!(normalize("Aukro Newsletter"), "aukro");
    }

    #[test]
    fn unicode_names_fold_consistently() {
        // NFKD decomposes accented letters; combining marks are dropped as
        // non-letter runs, leaving the base letters.
        let a = normalize("Novák a.s.");
        let b = normalize("novak");
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in "[\\PC]{0,40}") {
            let once = normalize(&raw);
            let twice = normalize(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
