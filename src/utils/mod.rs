pub mod code_utils;
pub mod str_utils;

/// Trims and lowercases a free-text search term.
pub fn normalize_search(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Case-insensitive substring match; an empty term matches everything.
pub fn matches_search(text: &str, normalized_term: &str) -> bool {
    normalized_term.is_empty() || text.to_lowercase().contains(normalized_term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_case_insensitive_substring() {
        let term = normalize_search("  SHO ");
        assert_eq!(term, "sho");
        assert!(matches_search("Shoes", &term));
        assert!(matches_search("Running shoes", &term));
        assert!(!matches_search("Hats", &term));
        assert!(matches_search("Hats", ""));
    }
}
