/// Sanitizes a single keyword: trim, collapse internal whitespace, strip
/// characters outside `[alnum, space, '-', '.', '_']`, lowercase, cap at 100 chars.
fn sanitize_keyword(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let filtered: String = collapsed
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '.' || *c == '_')
        .collect();
    filtered.trim().to_lowercase().chars().take(100).collect()
}

/// Sanitizes and dedupes a keyword list, case-insensitively, preserving the
/// order of first occurrence.
pub fn sanitize(keywords: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for kw in keywords {
        let clean = sanitize_keyword(kw);
        if clean.is_empty() {
            continue;
        }
        let key = clean.to_lowercase();
        if seen.insert(key) {
            out.push(clean);
        }
    }
    out
}

/// Builds the advanced query string: a single term, or an OR-group of terms,
/// followed by `-"exclude"` clauses. Empty keywords yield an empty string.
pub fn build_advanced(keywords: &[String], excludes: &[String]) -> String {
    let kws = sanitize(keywords);
    if kws.is_empty() {
        return String::new();
    }
    let exs = sanitize(excludes);

    let mut query = if kws.len() == 1 {
        format!("\"{}\"", kws[0])
    } else {
        format!(
            "({})",
            kws.iter()
                .map(|k| format!("\"{k}\""))
                .collect::<Vec<_>>()
                .join(" OR ")
        )
    };

    for ex in &exs {
        query.push_str(&format!(" -\"{ex}\""));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_keyword_is_quoted() {
        assert_eq!(build_advanced(&["bitcoin".to_string()], &[]), "\"bitcoin\"");
    }

    #[test]
    fn duplicate_case_insensitive_keywords_collapse_to_one_term() {
        let kws = vec!["Python".to_string(), "python".to_string(), "PYTHON".to_string()];
        assert_eq!(build_advanced(&kws, &[]), "\"python\"");
    }

    #[test]
    fn multiple_keywords_build_or_group_with_excludes() {
        let kws = vec!["bitcoin".to_string(), "ethereum".to_string()];
        let exs = vec!["scam".to_string()];
        assert_eq!(
            build_advanced(&kws, &exs),
            "(\"bitcoin\" OR \"ethereum\") -\"scam\""
        );
    }

    #[test]
    fn empty_keywords_yield_empty_query() {
        assert_eq!(build_advanced(&[], &[]), "");
    }

    #[test]
    fn strips_disallowed_characters_and_caps_length() {
        let long = "a".repeat(150);
        let kws = vec![format!("weird!@# {long}")];
        let sanitized = sanitize(&kws);
        assert_eq!(sanitized.len(), 1);
        assert!(sanitized[0].len() <= 100);
        assert!(!sanitized[0].contains('!'));
    }
}
