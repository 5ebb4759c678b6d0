//! Search, sort and paging helpers shared by the repo and commit lists.

/// Lower-cases and drops everything that is not a word character.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Items whose normalized label contains the normalized query.
pub fn search<T: Clone>(items: &[T], query: &str, label: impl Fn(&T) -> String) -> Vec<T> {
    let needle = normalize(query);
    if needle.is_empty() {
        return items.to_vec();
    }

    items
        .iter()
        .filter(|item| normalize(&label(item)).contains(&needle))
        .cloned()
        .collect()
}

/// Stable sort by a string key.
pub fn sort_by_label<T>(items: &mut [T], label: impl Fn(&T) -> String) {
    items.sort_by_cached_key(|item| label(item));
}

/// Leading digits of `raw`, at least 1. Anything unparsable is page 1.
pub fn parse_page(raw: Option<&str>) -> usize {
    let digits = raw
        .unwrap_or_default()
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>();

    digits.parse::<usize>().ok().filter(|page| *page >= 1).unwrap_or(1)
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1))
}

/// One-based page of `items`; out of range pages are empty.
pub fn page_slice<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let page_size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = (start + page_size).min(items.len());
    &items[start..end]
}

/// The slice of a filtered list the front end shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current: usize,
    pub count: usize,
    pub total: usize,
}

pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    Page {
        items: page_slice(items, page, page_size).to_vec(),
        current: page,
        count: page_count(items.len(), page_size),
        total: items.len(),
    }
}
