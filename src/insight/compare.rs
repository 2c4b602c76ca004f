//! Pairwise-and-more page comparison.

use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::models::AnalyzedPage;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedPage {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageComparison {
    pub pages: Vec<ComparedPage>,
    pub common_entities: Vec<String>,
    pub common_topics: Vec<String>,
    pub summary: String,
}

/// Compare two or more resolved pages. Fewer than two is a user-visible
/// input error, not a degraded result.
pub fn compare_pages(pages: &[AnalyzedPage]) -> EngineResult<PageComparison> {
    if pages.len() < 2 {
        return Err(EngineError::ComparisonInput);
    }

    let common_entities = intersect(
        pages
            .iter()
            .map(|page| page.entities.iter().map(|m| m.entity.clone()).collect()),
    );
    let common_topics = intersect(pages.iter().map(|page| page.topics.clone()));

    let summary = if common_entities.is_empty() && common_topics.is_empty() {
        format!("These {} pages have no obvious overlap.", pages.len())
    } else {
        format!(
            "These {} pages share: {}",
            pages.len(),
            common_entities
                .iter()
                .chain(common_topics.iter())
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    Ok(PageComparison {
        pages: pages
            .iter()
            .map(|page| ComparedPage {
                title: page.title.clone(),
                url: page.url.clone(),
            })
            .collect(),
        common_entities,
        common_topics,
        summary,
    })
}

/// Set intersection across all lists, keeping the first list's order.
fn intersect(mut lists: impl Iterator<Item = Vec<String>>) -> Vec<String> {
    let Some(first) = lists.next() else {
        return Vec::new();
    };
    let rest: Vec<Vec<String>> = lists.collect();

    let mut seen = std::collections::HashSet::new();
    first
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .filter(|item| rest.iter().all(|list| list.contains(item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{EntityMention, PageAnalysis, PageInput};

    fn page(url: &str, entities: &[&str], topics: &[&str]) -> AnalyzedPage {
        let mut page = AnalyzedPage::from_analysis(
            PageInput {
                title: url.to_string(),
                url: url.to_string(),
                raw_content: String::new(),
            },
            PageAnalysis::empty(),
            Utc::now(),
        );
        page.entities = entities
            .iter()
            .map(|e| EntityMention {
                entity: e.to_string(),
                count: 1,
            })
            .collect();
        page.topics = topics.iter().map(|t| t.to_string()).collect();
        page
    }

    #[test]
    fn fewer_than_two_pages_is_an_input_error() {
        let single = [page("https://a.com", &["rust"], &[])];
        assert!(matches!(
            compare_pages(&single),
            Err(EngineError::ComparisonInput)
        ));
        assert!(matches!(compare_pages(&[]), Err(EngineError::ComparisonInput)));
    }

    #[test]
    fn common_entities_are_the_set_intersection() {
        let pages = [
            page("https://a.com", &["rust", "tokio", "serde"], &["async"]),
            page("https://b.com", &["tokio", "rust"], &["async", "io"]),
        ];
        let comparison = compare_pages(&pages).expect("comparison");
        assert_eq!(comparison.common_entities, vec!["rust", "tokio"]);
        assert_eq!(comparison.common_topics, vec!["async"]);
    }

    #[test]
    fn disjoint_pages_compare_to_empty_overlap() {
        let pages = [
            page("https://a.com", &["rust"], &[]),
            page("https://b.com", &["knitting"], &[]),
        ];
        let comparison = compare_pages(&pages).expect("comparison");
        assert!(comparison.common_entities.is_empty());
        assert!(comparison.summary.contains("no obvious overlap"));
    }
}
