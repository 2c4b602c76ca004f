//! Keyword/regex page analyzer used when the remote provider is down or
//! returns garbage. Deterministic apart from claim scores, whose random
//! source is injectable so tests can seed it.

use std::sync::{Mutex, OnceLock};

use rand::{rngs::StdRng, Rng, SeedableRng};
use regex::Regex;
use uuid::Uuid;

use crate::models::{Claim, ContentType, EntityMention, Intent, PageAnalysis, PageInput, Stance};

const MAX_ENTITIES: usize = 5;
const MAX_CLAIMS: usize = 3;
const MIN_ENTITY_LEN: usize = 4;
const MIN_CLAIM_LEN: usize = 21;
const MAX_TOPICS: usize = 3;

const STUDYING_WORDS: &[&str] = &["tutorial", "learn", "course", "guide", "lesson", "how to"];
const SHOPPING_WORDS: &[&str] = &["buy", "price", "cart", "deal", "order", "shipping"];
const RESEARCHING_WORDS: &[&str] = &[
    "research",
    "paper",
    "study",
    "analysis",
    "documentation",
    "reference",
];

const VIDEO_URL_HINTS: &[&str] = &["youtube.", "vimeo.", "/watch", "/video"];
const DOCS_URL_HINTS: &[&str] = &["docs.", "/docs", "readthedocs", "wiki", "reference"];
const PRODUCT_URL_HINTS: &[&str] = &["amazon.", "ebay.", "/product", "/shop", "/store", "/cart"];

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[A-Z][a-z]+\b").expect("entity pattern is valid"))
}

pub struct HeuristicAnalyzer {
    rng: Mutex<StdRng>,
}

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeded constructor for deterministic claim scores in tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn analyze(&self, input: &PageInput) -> PageAnalysis {
        if input.raw_content.trim().is_empty() {
            return PageAnalysis::empty();
        }

        let entities = extract_entities(&input.raw_content);
        let topics = entities
            .iter()
            .take(MAX_TOPICS)
            .map(|mention| mention.entity.clone())
            .collect();
        let claims = self.extract_claims(&input.raw_content);
        let haystack = format!("{} {}", input.title, input.raw_content).to_lowercase();

        PageAnalysis {
            entities,
            topics,
            intent: classify_intent(&haystack),
            content_type: classify_content_type(&input.url),
            claims,
        }
    }

    /// First few substantial sentences, scored with placeholder confidence
    /// in [0.6, 1.0) and a coin-flip stance.
    fn extract_claims(&self, content: &str) -> Vec<Claim> {
        let mut rng = self.rng.lock().expect("claim rng poisoned");
        content
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|sentence| sentence.len() >= MIN_CLAIM_LEN)
            .take(MAX_CLAIMS)
            .map(|sentence| Claim {
                id: Uuid::new_v4().to_string(),
                claim: sentence.to_string(),
                confidence: 0.6 + rng.gen::<f64>() * 0.4,
                stance: if rng.gen_bool(0.5) {
                    Stance::Positive
                } else {
                    Stance::Neutral
                },
            })
            .collect()
    }
}

impl Default for HeuristicAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Capitalized words longer than three letters, lower-cased and counted.
/// Top five by frequency; ties keep first-encountered order.
pub fn extract_entities(content: &str) -> Vec<EntityMention> {
    let mut mentions: Vec<EntityMention> = Vec::new();

    for word in entity_pattern().find_iter(content) {
        if word.as_str().len() < MIN_ENTITY_LEN {
            continue;
        }
        let lowered = word.as_str().to_lowercase();
        match mentions.iter_mut().find(|m| m.entity == lowered) {
            Some(existing) => existing.count += 1,
            None => mentions.push(EntityMention {
                entity: lowered,
                count: 1,
            }),
        }
    }

    // Stable sort preserves encounter order among equal counts.
    mentions.sort_by(|a, b| b.count.cmp(&a.count));
    mentions.truncate(MAX_ENTITIES);
    mentions
}

fn classify_intent(haystack: &str) -> Intent {
    let hit = |words: &[&str]| words.iter().any(|word| haystack.contains(word));

    if hit(STUDYING_WORDS) {
        Intent::Studying
    } else if hit(SHOPPING_WORDS) {
        Intent::Shopping
    } else if hit(RESEARCHING_WORDS) {
        Intent::Researching
    } else {
        Intent::Browsing
    }
}

fn classify_content_type(url: &str) -> ContentType {
    let url = url.to_lowercase();
    let hit = |hints: &[&str]| hints.iter().any(|hint| url.contains(hint));

    if hit(VIDEO_URL_HINTS) {
        ContentType::Video
    } else if hit(DOCS_URL_HINTS) {
        ContentType::Documentation
    } else if hit(PRODUCT_URL_HINTS) {
        ContentType::Product
    } else {
        ContentType::Article
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(url: &str, content: &str) -> PageInput {
        PageInput {
            title: "A page".to_string(),
            url: url.to_string(),
            raw_content: content.to_string(),
        }
    }

    #[test]
    fn counts_and_ranks_repeated_entities() {
        let entities = extract_entities("Paris is beautiful. London is bigger than Paris.");
        assert_eq!(entities[0].entity, "paris");
        assert_eq!(entities[0].count, 2);
        assert_eq!(entities[1].entity, "london");
        assert_eq!(entities[1].count, 1);
    }

    #[test]
    fn short_capitalized_words_are_not_entities() {
        let entities = extract_entities("Bob met Ada near the Thames.");
        assert_eq!(
            entities.iter().map(|m| m.entity.as_str()).collect::<Vec<_>>(),
            vec!["thames"]
        );
    }

    #[test]
    fn frequency_ties_keep_first_encountered_order() {
        let entities = extract_entities("Tokyo then Osaka then Tokyo then Osaka.");
        assert_eq!(entities[0].entity, "tokyo");
        assert_eq!(entities[1].entity, "osaka");
    }

    #[test]
    fn claims_take_first_three_substantial_sentences() {
        let analyzer = HeuristicAnalyzer::with_seed(7);
        let content = "Short one. This sentence is clearly long enough to count. \
                       Another sentence that also exceeds the length bar easily! \
                       A third substantial sentence shows up here as well? \
                       And a fourth one that should be cut by the cap.";
        let analysis = analyzer.analyze(&input("https://example.com/a", content));

        assert_eq!(analysis.claims.len(), 3);
        for claim in &analysis.claims {
            assert!(claim.claim.len() > 20);
            assert!((0.6..1.0).contains(&claim.confidence));
            assert!(matches!(claim.stance, Stance::Positive | Stance::Neutral));
        }
    }

    #[test]
    fn seeded_scores_are_reproducible() {
        let content = "This sentence is clearly long enough to count.";
        let first = HeuristicAnalyzer::with_seed(42).analyze(&input("https://e.com", content));
        let second = HeuristicAnalyzer::with_seed(42).analyze(&input("https://e.com", content));
        assert_eq!(first.claims[0].confidence, second.claims[0].confidence);
        assert_eq!(first.claims[0].stance, second.claims[0].stance);
    }

    #[test]
    fn intent_falls_back_to_browsing() {
        let analyzer = HeuristicAnalyzer::with_seed(1);
        let studying = analyzer.analyze(&input("https://e.com", "A tutorial about borrowing"));
        assert_eq!(studying.intent, Intent::Studying);

        let shopping = analyzer.analyze(&input("https://e.com", "Add to cart before the deal ends"));
        assert_eq!(shopping.intent, Intent::Shopping);

        let idle = analyzer.analyze(&input("https://e.com", "Some plain text with nothing"));
        assert_eq!(idle.intent, Intent::Browsing);
    }

    #[test]
    fn content_type_classifies_from_url() {
        let analyzer = HeuristicAnalyzer::with_seed(1);
        let video = analyzer.analyze(&input("https://youtube.com/watch?v=x", "text"));
        assert_eq!(video.content_type, ContentType::Video);

        let docs = analyzer.analyze(&input("https://docs.rs/tokio", "text"));
        assert_eq!(docs.content_type, ContentType::Documentation);

        let article = analyzer.analyze(&input("https://blog.example.com/post", "text"));
        assert_eq!(article.content_type, ContentType::Article);
    }

    #[test]
    fn empty_content_degrades_to_empty_analysis() {
        let analyzer = HeuristicAnalyzer::with_seed(1);
        let analysis = analyzer.analyze(&input("https://e.com", "   "));
        assert!(analysis.entities.is_empty());
        assert!(analysis.claims.is_empty());
        assert!(analysis.topics.is_empty());
    }
}
