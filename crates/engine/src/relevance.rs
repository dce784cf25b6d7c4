use newsdesk_core::{Article, Category};

/// Scores `article` against `category`'s keywords/excludes and returns the
/// clamped `[0, 1]` relevance score alongside the keywords that matched.
///
/// For each keyword: `+0.7` if it appears in the title, `+0.3` if it appears
/// in the content, plus a frequency bonus capped at `0.3`, with the whole
/// per-keyword contribution capped at `1.0`. The base score averages the
/// per-keyword contributions with keyword coverage, then each matched
/// exclude keyword subtracts a flat `0.2`.
pub fn score(article: &Article, category: &Category) -> (f64, Vec<String>) {
    if category.keywords.is_empty() {
        return (0.0, Vec::new());
    }

    let title_lower = article.title.to_lowercase();
    let content_lower = article.content.as_deref().unwrap_or("").to_lowercase();
    let full_text = format!("{title_lower} {content_lower}");

    let mut keyword_scores = Vec::with_capacity(category.keywords.len());
    let mut matched = Vec::new();

    for kw in &category.keywords {
        let kw_lower = kw.to_lowercase();
        if kw_lower.is_empty() {
            keyword_scores.push(0.0);
            continue;
        }

        let freq = full_text.matches(&kw_lower).count();
        if freq == 0 {
            keyword_scores.push(0.0);
            continue;
        }

        let mut contribution = 0.0;
        if title_lower.contains(&kw_lower) {
            contribution += 0.7;
        }
        if content_lower.contains(&kw_lower) {
            contribution += 0.3;
        }
        contribution += (0.1 * freq as f64).min(0.3);
        keyword_scores.push(contribution.min(1.0));
        matched.push(kw.clone());
    }

    let total = category.keywords.len() as f64;
    let avg = keyword_scores.iter().sum::<f64>() / total;
    let coverage = matched.len() as f64 / total;
    let mut base = (avg + coverage) / 2.0;

    for exclude in &category.exclude_keywords {
        let exclude_lower = exclude.to_lowercase();
        if !exclude_lower.is_empty() && full_text.contains(&exclude_lower) {
            base -= 0.2;
        }
    }

    (base.clamp(0.0, 1.0), matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsdesk_core::Category;

    fn category(keywords: &[&str], excludes: &[&str]) -> Category {
        Category {
            id: 1,
            name: "test".to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            exclude_keywords: excludes.iter().map(|s| s.to_string()).collect(),
            language: "vi".to_string(),
            country: "VN".to_string(),
            is_active: true,
            schedule_enabled: false,
            schedule_interval_minutes: None,
            crawl_period: None,
            last_scheduled_run_at: None,
            next_scheduled_run_at: None,
            disabled_until: None,
        }
    }

    fn article(title: &str, content: Option<&str>) -> Article {
        Article {
            id: None,
            title: title.to_string(),
            content: content.map(|s| s.to_string()),
            author: None,
            publish_date: None,
            source_url: "https://example.com/a".to_string(),
            image_url: None,
            url_hash: Article::url_hash_for("https://example.com/a"),
            content_hash: None,
            first_seen: None,
            last_seen: None,
            keywords_matched: Vec::new(),
            relevance_score: 0.0,
        }
    }

    #[test]
    fn title_match_outscores_content_only_match() {
        let cat = category(&["bitcoin"], &[]);
        let title_hit = article("Bitcoin surges past record high", None);
        let content_hit = article("Markets rally", Some("bitcoin gains continue"));
        let (title_score, _) = score(&title_hit, &cat);
        let (content_score, _) = score(&content_hit, &cat);
        assert!(title_score > content_score);
    }

    #[test]
    fn exclude_keyword_penalizes_score() {
        let cat = category(&["bitcoin"], &["scam"]);
        let clean = article("Bitcoin price update", Some("bitcoin steady this week"));
        let tainted = article("Bitcoin price update", Some("bitcoin scam warning issued"));
        let (clean_score, _) = score(&clean, &cat);
        let (tainted_score, _) = score(&tainted, &cat);
        assert!(tainted_score < clean_score);
    }

    #[test]
    fn score_is_clamped_and_no_keywords_yields_zero() {
        let cat = category(&[], &[]);
        let a = article("Anything", None);
        assert_eq!(score(&a, &cat), (0.0, Vec::new()));
    }

    #[test]
    fn matched_keywords_lists_only_present_terms() {
        let cat = category(&["bitcoin", "ethereum"], &[]);
        let a = article("Bitcoin rally continues", Some("no mention of the other coin"));
        let (_, matched) = score(&a, &cat);
        assert_eq!(matched, vec!["bitcoin".to_string()]);
    }
}
