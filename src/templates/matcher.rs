use super::catalog::{CATALOG, Category, SmartTemplate};

pub const DEFAULT_SUGGESTIONS: usize = 5;

const EXACT_KEYWORD_SCORE: u32 = 2;
const PARTIAL_WORD_SCORE: u32 = 1;

/// Ranks the built-in catalog against a chunk of editor content.
pub fn suggest(content: &str, limit: usize) -> Vec<&'static SmartTemplate> {
    suggest_from(CATALOG, content, limit)
}

pub fn suggest_from<'a>(
    catalog: &'a [SmartTemplate],
    content: &str,
    limit: usize,
) -> Vec<&'a SmartTemplate> {
    let lowered = content.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(u32, &SmartTemplate)> = catalog
        .iter()
        .map(|template| (score(template, &lowered, &words), template))
        .filter(|(score, _)| *score > 0)
        .collect();

    // sort_by is stable, equal scores keep catalog order
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(limit);
    scored.into_iter().map(|(_, template)| template).collect()
}

fn score(template: &SmartTemplate, lowered: &str, words: &[&str]) -> u32 {
    let mut total = 0;
    for keyword in template.keywords {
        if lowered.contains(keyword) {
            total += EXACT_KEYWORD_SCORE;
        }
        for word in words {
            if word.contains(keyword) || keyword.contains(word) {
                total += PARTIAL_WORD_SCORE;
            }
        }
    }
    total
}

pub fn by_category(category: Category) -> Vec<&'static SmartTemplate> {
    CATALOG.iter().filter(|t| t.category == category).collect()
}

pub fn search(query: &str) -> Vec<&'static SmartTemplate> {
    let query = query.trim().to_lowercase();
    CATALOG
        .iter()
        .filter(|t| {
            t.name.to_lowercase().contains(&query)
                || t.description.to_lowercase().contains(&query)
                || t.keywords.iter().any(|k| k.contains(query.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(templates: &[&SmartTemplate]) -> Vec<&'static str> {
        templates.iter().map(|t| t.id).collect()
    }

    #[test]
    fn empty_content_suggests_nothing() {
        assert!(suggest("", 5).is_empty());
        assert!(suggest("   \n\t", 5).is_empty());
    }

    #[test]
    fn verbatim_keyword_outranks_unmatched_template() {
        let suggestions = suggest("Call the practice for any emergency", 20);
        let ids = ids(&suggestions);
        assert!(ids.contains(&"emergency-alert"));
        // bmi calculator has no keyword in this text and must never appear
        assert!(!ids.contains(&"bmi-calculator"));
    }

    #[test]
    fn cost_content_ranks_cost_templates_first() {
        let suggestions = suggest("What is the NHS cost and private fee for a crown?", 3);
        let ids = ids(&suggestions);
        assert_eq!(ids.len(), 3);
        assert!(ids[..2].contains(&"cost-breakdown"));
        assert!(ids[..2].contains(&"enhanced-cost-table"));
    }

    #[test]
    fn ties_keep_catalog_order() {
        let catalog = [
            SmartTemplate {
                id: "first",
                keywords: &["alpha"],
                ..CATALOG[0]
            },
            SmartTemplate {
                id: "second",
                keywords: &["alpha"],
                ..CATALOG[0]
            },
            SmartTemplate {
                id: "none",
                keywords: &["omega"],
                ..CATALOG[0]
            },
        ];
        let out = suggest_from(&catalog, "alpha", 5);
        assert_eq!(ids(&out), vec!["first", "second"]);
    }

    #[test]
    fn word_and_keyword_containment_both_count() {
        let catalog = [SmartTemplate {
            id: "t",
            keywords: &["tooth"],
            ..CATALOG[0]
        }];
        // "toothbrush" contains "tooth": +2 for substring, +1 for the word pair
        let long = suggest_from(&catalog, "toothbrush", 5);
        assert_eq!(ids(&long), vec!["t"]);
        // "too" is contained in "tooth": +1 only
        let short = suggest_from(&catalog, "too", 5);
        assert_eq!(ids(&short), vec!["t"]);
        assert_eq!(score(&catalog[0], "toothbrush", &["toothbrush"]), 3);
        assert_eq!(score(&catalog[0], "too", &["too"]), 1);
    }

    #[test]
    fn suggestions_are_deterministic_and_limited() {
        let content = "steps for the procedure timeline and treatment options, pain assessment";
        let first = ids(&suggest(content, DEFAULT_SUGGESTIONS));
        let second = ids(&suggest(content, DEFAULT_SUGGESTIONS));
        assert_eq!(first, second);
        assert!(first.len() <= DEFAULT_SUGGESTIONS);
        assert!(suggest(content, 0).is_empty());
    }

    #[test]
    fn category_and_search() {
        let clinical = by_category(Category::Clinical);
        assert!(clinical.iter().all(|t| t.category == Category::Clinical));
        assert!(ids(&clinical).contains(&"dmft-calculator"));

        let found = ids(&search("Dosage"));
        assert!(found.contains(&"fluoride-calculator"));
        assert!(found.contains(&"anesthetic-calculator"));
        assert!(found.contains(&"medication-card"));
        assert!(!found.contains(&"tooth-diagram"));
    }
}
