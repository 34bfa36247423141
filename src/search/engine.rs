//! Relevance scoring engine / 相关性评分引擎
//!
//! Weighted substring + fuzzy scoring of one product against a query.
//! Weight table / 权重表：
//! - whole query in name +100, in id +90, in description +80
//! - per word: name +50, tag +30 (fuzzy tag +15, per tag), category +40,
//!   domain +35, description +25, spec key +20 / spec value +15 (per
//!   entry), feature +20 (per feature), fuzzy name +10, fuzzy description +5
//! - popularity (once, only for products that already matched):
//!   rating >= 4.5 → +10, "In Stock" → +5
//!
//! 纯函数，无随机性：相同输入必得相同输出。

use crate::models::Product;

use super::schema::ScoredResult;

/// Lower-case and trim a raw query / 规范化查询
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Top-level search entry point / 搜索入口
///
/// Empty (or whitespace-only) query is browse mode: the whole catalog is
/// returned unscored, in catalog order. Otherwise every product is scored,
/// zero-score entries are dropped and the rest sorted by descending score.
/// The sort is stable, so equal scores keep catalog insertion order.
pub fn search(catalog: &[Product], raw_query: &str) -> Vec<ScoredResult> {
    let query = normalize_query(raw_query);

    if query.is_empty() {
        return catalog
            .iter()
            .map(|product| ScoredResult {
                product: product.clone(),
                relevance_score: 0,
                matched_fields: Vec::new(),
            })
            .collect();
    }

    let mut results: Vec<ScoredResult> = catalog
        .iter()
        .filter_map(|product| {
            let score = relevance_score(product, &query);
            if score > 0 {
                Some(ScoredResult {
                    product: product.clone(),
                    relevance_score: score,
                    matched_fields: matched_fields(product, &query),
                })
            } else {
                None
            }
        })
        .collect();

    results.sort_by_key(|result| std::cmp::Reverse(result.relevance_score));
    results
}

/// Score one product against a normalized (lower-cased, trimmed, non-empty)
/// query / 对单个产品评分
///
/// Absent optional fields count as empty collections, never as errors.
pub fn relevance_score(product: &Product, query: &str) -> i64 {
    let name = product.name.to_lowercase();
    let id = product.id.to_string();
    let description = product.description.to_lowercase();
    let category = product.category.as_deref().unwrap_or_default().to_lowercase();
    let domain = product.domain.as_deref().unwrap_or_default().to_lowercase();
    let tags: Vec<String> = product.tags.iter().map(|tag| tag.to_lowercase()).collect();
    let specifications: Vec<(String, String)> = product
        .specifications
        .iter()
        .map(|spec| (spec.name.to_lowercase(), spec.value.to_lowercase()))
        .collect();
    let features: Vec<String> = product
        .features
        .iter()
        .map(|feature| feature.to_lowercase())
        .collect();

    let mut score: i64 = 0;

    // 整句匹配得分最高 / whole-query substring bonuses
    if name.contains(query) {
        score += 100;
    }
    if id.contains(query) {
        score += 90;
    }
    if description.contains(query) {
        score += 80;
    }

    // 逐词匹配 / word-by-word matching
    for word in query.split_whitespace() {
        if name.contains(word) {
            score += 50;
        }

        for tag in &tags {
            if tag.contains(word) {
                score += 30;
            }
            if fuzzy_match(tag, word) {
                score += 15;
            }
        }

        if !category.is_empty() && category.contains(word) {
            score += 40;
        }
        if !domain.is_empty() && domain.contains(word) {
            score += 35;
        }
        if description.contains(word) {
            score += 25;
        }

        // 每条规格独立计分 / every spec entry contributes independently
        for (key, value) in &specifications {
            if key.contains(word) {
                score += 20;
            }
            if value.contains(word) {
                score += 15;
            }
        }

        for feature in &features {
            if feature.contains(word) {
                score += 20;
            }
        }

        // 容错匹配 / typo-tolerant fallback
        if fuzzy_match(&name, word) {
            score += 10;
        }
        if fuzzy_match(&description, word) {
            score += 5;
        }
    }

    // Zero means no match of any kind; popularity alone never puts a
    // product into the result set. / 零分产品不参与热度加分
    if score == 0 {
        return 0;
    }

    if product.rating.unwrap_or(0.0) >= 4.5 {
        score += 10;
    }
    if product.availability.as_deref() == Some("In Stock") {
        score += 5;
    }

    score
}

/// Fields containing at least one query word verbatim, in first-match
/// order / 命中字段集合
///
/// Substring containment only (no fuzzy); display metadata, not ranking
/// input.
pub fn matched_fields(product: &Product, query: &str) -> Vec<String> {
    let name = product.name.to_lowercase();
    let description = product.description.to_lowercase();
    let category = product.category.as_deref().unwrap_or_default().to_lowercase();
    let tags: Vec<String> = product.tags.iter().map(|tag| tag.to_lowercase()).collect();

    let mut matched: Vec<&str> = Vec::new();
    for word in query.split_whitespace() {
        if name.contains(word) && !matched.contains(&"name") {
            matched.push("name");
        }
        if description.contains(word) && !matched.contains(&"description") {
            matched.push("description");
        }
        if tags.iter().any(|tag| tag.contains(word)) && !matched.contains(&"tags") {
            matched.push("tags");
        }
        if !category.is_empty() && category.contains(word) && !matched.contains(&"category") {
            matched.push("category");
        }
    }

    matched.into_iter().map(String::from).collect()
}

/// Typo-tolerant match of `pattern` against any whitespace-delimited word
/// of `text` / 容错匹配
///
/// Patterns shorter than 3 characters never fuzzy-match; the allowed edit
/// distance is `pattern_len / 3`. Inputs must already be lower-cased.
pub fn fuzzy_match(text: &str, pattern: &str) -> bool {
    let pattern_len = pattern.chars().count();
    if pattern_len < 3 {
        return false;
    }

    let max_distance = pattern_len / 3;
    text.split_whitespace()
        .any(|word| levenshtein_distance(word, pattern) <= max_distance)
}

/// Levenshtein 编辑距离（插入/删除/替换各记 1）
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    // 滚动两行即可，无需完整矩阵
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr: Vec<usize> = vec![0; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Specification;

    fn product(id: i64, name: &str, description: &str) -> Product {
        Product {
            id,
            name: name.to_string(),
            description: description.to_string(),
            price: None,
            currency: None,
            image_data: None,
            gallery_images: Vec::new(),
            product_url: None,
            rating: None,
            availability: None,
            category: None,
            domain: None,
            tags: Vec::new(),
            specifications: Vec::new(),
            features: Vec::new(),
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            updated_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn smart_rack() -> Product {
        let mut p = product(1, "SR-42U Smart Rack", "Intelligent enclosure with advanced monitoring");
        p.category = Some("enclosures".to_string());
        p.domain = Some("it-infrastructure".to_string());
        p.tags = vec!["smart".to_string(), "42u".to_string()];
        p.rating = Some(4.8);
        p.availability = Some("In Stock".to_string());
        p
    }

    fn network_cabinet() -> Product {
        let mut p = product(2, "Network Cabinet", "Compact cabinet for small offices");
        p.category = Some("enclosures".to_string());
        p.domain = Some("it-infrastructure".to_string());
        p.tags = vec!["network".to_string()];
        p.rating = Some(4.5);
        p.availability = Some("In Stock".to_string());
        p
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("abc", "abcd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
    }

    #[test]
    fn test_fuzzy_threshold() {
        // 编辑距离1，允许 5/3=1
        assert!(fuzzy_match("server", "servr"));
        // 模式太短，禁用模糊匹配
        assert!(!fuzzy_match("server", "xy"));
        // 多词文本中任一词命中即可
        assert!(fuzzy_match("universal search", "serch"));
        // 超出允许距离
        assert!(!fuzzy_match("server", "rack"));
    }

    #[test]
    fn test_name_substring_scores_at_least_50() {
        let p = product(1, "Alpha Beta", "Unrelated text");
        assert!(relevance_score(&p, "alpha") >= 50);
    }

    #[test]
    fn test_whole_query_bonuses() {
        // 整句命中名称:100 + 逐词(name 50+50, fuzzy name 10+10) = 220
        let p = product(1, "Smart Rack", "Thermal management unit");
        assert_eq!(relevance_score(&p, "smart rack"), 220);

        // id 整句命中
        let p = product(7, "Widget", "A thing");
        assert_eq!(relevance_score(&p, "7"), 90);
    }

    #[test]
    fn test_spec_entries_accumulate() {
        let mut p = product(1, "Duct Pipe", "Underground cable protection");
        p.specifications = vec![
            Specification {
                name: "diameter".to_string(),
                value: "32mm".to_string(),
            },
            Specification {
                name: "inner diameter".to_string(),
                value: "26mm".to_string(),
            },
        ];
        // 两条规格的 key 各得 20
        assert_eq!(relevance_score(&p, "diameter"), 40);
        // 规格值命中得 15
        assert_eq!(relevance_score(&p, "32mm"), 15);
    }

    #[test]
    fn test_feature_matches() {
        let mut p = product(1, "Duct Pipe", "Underground protection");
        p.features = vec!["Smart monitoring".to_string(), "Cable management".to_string()];
        assert_eq!(relevance_score(&p, "management"), 20);
    }

    #[test]
    fn test_missing_optional_fields_are_tolerated() {
        // 无 tags/specs/features/rating/availability：
        // 整句 name 100 + word name 50 + fuzzy name 10
        let p = product(3, "Gamma Unit", "Basic description");
        assert_eq!(relevance_score(&p, "gamma"), 160);
    }

    #[test]
    fn test_popularity_boost_requires_a_match() {
        // 高评分 + 有货，但与查询毫无交集 → 0 分，不得靠热度进入结果
        let p = network_cabinet();
        assert_eq!(relevance_score(&p, "smart rack"), 0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let p = smart_rack();
        assert_eq!(
            relevance_score(&p, "smart rack"),
            relevance_score(&p, "smart rack")
        );
        assert_eq!(
            matched_fields(&p, "smart rack"),
            matched_fields(&p, "smart rack")
        );
    }

    #[test]
    fn test_matched_fields_are_substring_only() {
        let p = smart_rack();
        // "smart" 命中 name+tags，"rack" 只再命中 name（已记录）
        assert_eq!(matched_fields(&p, "smart rack"), vec!["name", "tags"]);
        // 模糊命中（servr→无子串）不计入 matched_fields
        let p = product(1, "Server Rack", "Rack for servers");
        assert!(matched_fields(&p, "servr").is_empty());
    }

    #[test]
    fn test_smart_rack_scenario() {
        let catalog = vec![smart_rack(), network_cabinet()];
        let results = search(&catalog, "smart rack");

        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.product.id, 1);
        // 整句 name 100；"smart": name 50 + tag 30 + fuzzy tag 15 + fuzzy name 10;
        // "rack": name 50 + fuzzy name 10；热度 10 + 5 → 280
        assert_eq!(hit.relevance_score, 280);
        assert_eq!(hit.matched_fields, vec!["name", "tags"]);
    }

    #[test]
    fn test_empty_query_passthrough() {
        let catalog = vec![smart_rack(), network_cabinet(), product(3, "Gamma", "x")];
        let results = search(&catalog, "   ");

        assert_eq!(results.len(), 3);
        for (result, original) in results.iter().zip(&catalog) {
            assert_eq!(result.product.id, original.id);
            assert_eq!(result.relevance_score, 0);
            assert!(result.matched_fields.is_empty());
        }
    }

    #[test]
    fn test_zero_score_products_are_excluded() {
        let catalog = vec![smart_rack(), network_cabinet()];
        let results = search(&catalog, "smart");
        assert!(results.iter().all(|r| r.product.id != 2));
        assert!(results.iter().all(|r| r.relevance_score > 0));
    }

    #[test]
    fn test_ordering_is_descending() {
        let mut weak = product(5, "Cabinet", "A smart-ish box");
        weak.tags = vec!["smart".to_string()];
        let catalog = vec![weak, smart_rack()];

        let results = search(&catalog, "smart");
        for pair in results.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
        // 名称整句命中的产品应排在仅标签命中的前面
        assert_eq!(results[0].product.id, 1);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let mut a = product(10, "Alpha Duct", "First duct");
        a.tags = vec!["duct".to_string()];
        let mut b = product(11, "Alpha Duct", "First duct");
        b.tags = vec!["duct".to_string()];

        let results = search(&[a, b], "duct");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].relevance_score, results[1].relevance_score);
        assert_eq!(results[0].product.id, 10);
        assert_eq!(results[1].product.id, 11);
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Smart RACK  "), "smart rack");
        assert_eq!(normalize_query(""), "");
        assert_eq!(normalize_query("   "), "");
    }
}
