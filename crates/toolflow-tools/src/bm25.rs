//! BM25 relevance filter over tool descriptors.
//!
//! Each tool is indexed as a small document built from its name, description,
//! category (the `category__tool` prefix) and keywords pulled from parameter
//! descriptions. A query is scored with Okapi BM25 plus name and category
//! boosts; the result is thresholded, floored and capped with per-category
//! diversity.

use std::collections::HashMap;

use toolflow_types::ToolDescriptor;

const K1: f64 = 1.5;
const B: f64 = 0.75;

const BM25_SCALE: f64 = 10.0;
const FULL_NAME_BOOST: f64 = 50.0;
const TOKEN_NAME_BOOST: f64 = 20.0;
const CATEGORY_BOOST: f64 = 30.0;

/// Results kept even when they fall under `min_score`.
const MIN_RESULTS: usize = 3;
const MAX_KEYWORDS: usize = 20;
const MAX_DESCRIPTION_KEYWORDS: usize = 10;

const COMMON_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "will", "can", "are", "was", "were",
    "been", "have", "has", "had", "does", "did", "not", "but", "what", "when", "where", "which",
    "who", "how", "why", "all", "would", "there", "their", "your", "more", "other", "some",
    "into", "only", "also", "than", "many", "must", "should", "could",
];

/// Limits applied when narrowing remote tools to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub max_tools: usize,
    pub min_score: f64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            max_tools: 20,
            min_score: 8.0,
        }
    }
}

/// A tool with its relevance to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTool {
    pub tool: ToolDescriptor,
    pub score: f64,
    pub categories: Vec<String>,
}

struct IndexedTool {
    tool: ToolDescriptor,
    categories: Vec<String>,
    term_freq: HashMap<String, usize>,
    len: usize,
}

/// Index over a fixed set of tools.
pub struct Bm25Filter {
    docs: Vec<IndexedTool>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
}

impl Bm25Filter {
    pub fn new(tools: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        let docs: Vec<IndexedTool> = tools.into_iter().map(index_tool).collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in &docs {
            for term in doc.term_freq.keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
        }
        let total: usize = docs.iter().map(|d| d.len).sum();
        let avg_len = if docs.is_empty() {
            0.0
        } else {
            total as f64 / docs.len() as f64
        };

        tracing::debug!("BM25 index built over {} tools", docs.len());
        Self {
            docs,
            doc_freq,
            avg_len,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Every tool with a positive score, best first. Ties keep index order.
    pub fn score(&self, query: &str) -> Vec<ScoredTool> {
        let query_lower = query.to_lowercase();
        let terms = tokenize(&query_lower);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredTool> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let score = self.bm25(doc, &terms) * BM25_SCALE
                    + name_boost(&doc.tool.name, &query_lower, &terms)
                    + category_boost(&doc.categories, &query_lower);
                (score > 0.0).then(|| ScoredTool {
                    tool: doc.tool.clone(),
                    score,
                    categories: doc.categories.clone(),
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    /// The tools relevant to `query`, at most `options.max_tools` of them.
    pub fn filter(&self, query: &str, options: &FilterOptions) -> Vec<ToolDescriptor> {
        let scored = self.score(query);
        let total = scored.len();

        let mut kept: Vec<ScoredTool> = scored
            .iter()
            .filter(|s| s.score >= options.min_score)
            .cloned()
            .collect();
        if kept.len() < MIN_RESULTS && total >= MIN_RESULTS {
            kept = scored.into_iter().take(MIN_RESULTS).collect();
        }

        let selected = if kept.len() > options.max_tools {
            diversify(kept, options.max_tools)
        } else {
            kept
        };
        tracing::debug!(
            query,
            matched = total,
            selected = selected.len(),
            "BM25 filter applied"
        );
        selected.into_iter().map(|s| s.tool).collect()
    }

    fn bm25(&self, doc: &IndexedTool, terms: &[String]) -> f64 {
        if doc.len == 0 || self.avg_len == 0.0 {
            return 0.0;
        }
        let n = self.docs.len() as f64;
        let norm = K1 * (1.0 - B + B * doc.len as f64 / self.avg_len);
        terms
            .iter()
            .filter_map(|term| {
                let tf = *doc.term_freq.get(term)? as f64;
                let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                Some(idf * tf * (K1 + 1.0) / (tf + norm))
            })
            .sum()
    }
}

fn name_boost(name: &str, query_lower: &str, terms: &[String]) -> f64 {
    let name = name.to_lowercase();
    if name.contains(query_lower) {
        FULL_NAME_BOOST
    } else if terms.iter().any(|t| name.contains(t.as_str())) {
        TOKEN_NAME_BOOST
    } else {
        0.0
    }
}

fn category_boost(categories: &[String], query_lower: &str) -> f64 {
    if categories.iter().any(|c| query_lower.contains(c.as_str())) {
        CATEGORY_BOOST
    } else {
        0.0
    }
}

/// Take tools best first, allowing at most `max(2, max_tools / 3)` per category.
fn diversify(scored: Vec<ScoredTool>, max_tools: usize) -> Vec<ScoredTool> {
    let per_category = (max_tools / 3).max(2);
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut selected = Vec::with_capacity(max_tools);

    for tool in scored {
        if selected.len() >= max_tools {
            break;
        }
        let categories = if tool.categories.is_empty() {
            vec!["default".to_string()]
        } else {
            tool.categories.clone()
        };
        if categories
            .iter()
            .all(|c| counts.get(c).copied().unwrap_or(0) < per_category)
        {
            for c in categories {
                *counts.entry(c).or_default() += 1;
            }
            selected.push(tool);
        }
    }
    selected
}

fn index_tool(tool: ToolDescriptor) -> IndexedTool {
    let categories = categories_of(&tool.name);
    let keywords = keywords_of(&tool, &categories);

    let mut document = vec![
        tool.name.clone(),
        tool.name.replace('_', " "),
        tool.description.clone(),
    ];
    for category in &categories {
        document.push(category.clone());
        document.push(category.clone());
    }
    document.extend(keywords.into_iter().take(MAX_KEYWORDS));

    let tokens = tokenize(&document.join(" ").to_lowercase());
    let mut term_freq: HashMap<String, usize> = HashMap::new();
    for token in &tokens {
        *term_freq.entry(token.clone()).or_default() += 1;
    }

    IndexedTool {
        tool,
        categories,
        term_freq,
        len: tokens.len(),
    }
}

/// `gmail__send_email` belongs to category `gmail`.
fn categories_of(name: &str) -> Vec<String> {
    match name.split_once("__") {
        Some((prefix, _)) if !prefix.is_empty() => vec![prefix.to_lowercase()],
        _ => Vec::new(),
    }
}

fn keywords_of(tool: &ToolDescriptor, categories: &[String]) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut add = |word: String| {
        if !word.is_empty() && !keywords.contains(&word) {
            keywords.push(word);
        }
    };

    for part in tool
        .name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
    {
        add(part.to_string());
    }
    for category in categories {
        add(category.clone());
    }
    for word in tokenize(&tool.description.to_lowercase())
        .into_iter()
        .filter(|w| w.len() > 3)
        .take(MAX_DESCRIPTION_KEYWORDS)
    {
        add(word);
    }

    let mut params = Vec::new();
    collect_parameter_words(&tool.parameters, &mut params);
    for word in params {
        add(word);
    }
    keywords
}

/// Names of documented properties and the longer words of their descriptions,
/// recursing into nested objects.
fn collect_parameter_words(schema: &serde_json::Value, out: &mut Vec<String>) {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return;
    };
    for (name, prop) in properties {
        if let Some(description) = prop.get("description").and_then(|d| d.as_str()) {
            out.push(name.to_lowercase());
            out.extend(
                tokenize(&description.to_lowercase())
                    .into_iter()
                    .filter(|w| w.len() > 3),
            );
        }
        collect_parameter_words(prop, out);
    }
}

/// Runs of ASCII letters, minus stop words and tokens of two letters or fewer.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_lowercase())
        .filter(|w| w.len() > 2 && !COMMON_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}
