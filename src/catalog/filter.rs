use serde::Serialize;

use super::model::PromptTemplate;

/// Page size of the original gallery grid.
pub const PAGE_SIZE: usize = 8;

/// Sentinel category that matches every template.
pub const ALL_CATEGORIES: &str = "All";

/// Filter the catalog by free-text query and category. The query is matched
/// case-insensitively as a substring of the title, the description, or any
/// tag; the category must match exactly unless it is the `All` sentinel.
/// Matches keep catalog order.
pub fn filter_prompts<'a>(
    templates: &'a [PromptTemplate],
    query: &str,
    category: &str,
) -> Vec<&'a PromptTemplate> {
    let needle = query.trim().to_lowercase();
    templates
        .iter()
        .filter(|template| category == ALL_CATEGORIES || template.category == category)
        .filter(|template| {
            if needle.is_empty() {
                return true;
            }
            template.title.to_lowercase().contains(&needle)
                || template.description.to_lowercase().contains(&needle)
                || template
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&needle))
        })
        .collect()
}

/// De-duplicated, lexicographically sorted category universe. The caller
/// prepends the `All` sentinel where it wants one.
pub fn all_categories(templates: &[PromptTemplate]) -> Vec<String> {
    let mut categories: Vec<String> = templates
        .iter()
        .map(|template| template.category.clone())
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Pure 1-indexed slice of a filtered result. A page past the end is not an
/// error, just empty.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = (start + page_size).min(items.len());
    &items[start..end]
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl PageInfo {
    pub fn new(total: usize, page: usize, page_size: usize) -> Self {
        let total_pages = total.div_ceil(page_size.max(1));
        Self {
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn catalog() -> Catalog {
        Catalog::load_embedded().unwrap()
    }

    #[test]
    fn empty_query_and_all_returns_everything_in_order() {
        let catalog = catalog();
        let filtered = filter_prompts(catalog.templates(), "", ALL_CATEGORIES);
        assert_eq!(filtered.len(), catalog.len());
        for (filtered, original) in filtered.iter().zip(catalog.templates()) {
            assert_eq!(filtered.id, original.id);
        }
    }

    #[test]
    fn nonexistent_query_matches_nothing() {
        let catalog = catalog();
        assert!(filter_prompts(catalog.templates(), "nonexistent-zzz", ALL_CATEGORIES).is_empty());
    }

    #[test]
    fn query_is_case_insensitive_and_reaches_tags() {
        let catalog = catalog();
        let by_title = filter_prompts(catalog.templates(), "ISOMETRIC", ALL_CATEGORIES);
        assert!(by_title.iter().any(|t| t.id == "isometric-models"));

        let by_tag = filter_prompts(catalog.templates(), "blender", ALL_CATEGORIES);
        assert!(by_tag.iter().any(|t| t.id == "illustration-to-figure"));
    }

    #[test]
    fn category_must_match_exactly() {
        let catalog = catalog();
        let filtered = filter_prompts(catalog.templates(), "", "Photo Editing");
        assert!(!filtered.is_empty());
        assert!(filtered.iter().all(|t| t.category == "Photo Editing"));

        assert!(filter_prompts(catalog.templates(), "", "photo editing").is_empty());
    }

    #[test]
    fn both_predicates_must_hold() {
        let catalog = catalog();
        let filtered = filter_prompts(catalog.templates(), "vintage", "Photo Editing");
        assert!(filtered.iter().all(|t| t.category == "Photo Editing"));
        assert!(filtered.iter().any(|t| t.id == "photos-in-eras"));

        assert!(filter_prompts(catalog.templates(), "vintage", "Food").is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let catalog = catalog();
        let once: Vec<PromptTemplate> = filter_prompts(catalog.templates(), "photo", ALL_CATEGORIES)
            .into_iter()
            .cloned()
            .collect();
        let twice = filter_prompts(&once, "photo", ALL_CATEGORIES);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice) {
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn categories_are_deduplicated_and_sorted() {
        let catalog = catalog();
        let categories = all_categories(catalog.templates());
        let mut sorted = categories.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(categories, sorted);
        for template in catalog.templates() {
            assert!(categories.contains(&template.category));
        }
    }

    #[test]
    fn pagination_is_one_indexed_and_clamps_to_empty() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(paginate(&items, 1, 4), &[0, 1, 2, 3]);
        assert_eq!(paginate(&items, 2, 4), &[4, 5, 6, 7]);
        assert_eq!(paginate(&items, 3, 4), &[8, 9]);
        assert!(paginate(&items, 4, 4).is_empty());
        assert!(paginate(&items, 0, 4).is_empty());
        assert!(paginate::<u32>(&[], 1, 4).is_empty());
    }

    #[test]
    fn page_info_counts_pages() {
        let info = PageInfo::new(10, 1, 4);
        assert_eq!(info.total_pages, 3);
        assert_eq!(PageInfo::new(0, 1, 4).total_pages, 0);
        assert_eq!(PageInfo::new(8, 1, 8).total_pages, 1);
    }
}
