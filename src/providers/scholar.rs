use crate::http::encode_url_component;

const SCHOLAR_BASE: &str = "https://scholar.google.com/scholar";

/// Google Scholar has no API; the tool only builds a search link for the user.
pub fn scholar_link(entity: &str, query_terms: &str) -> String {
    let query = format!("{} {}", entity.trim(), query_terms.trim());
    let encoded = query
        .split_whitespace()
        .map(encode_url_component)
        .collect::<Vec<_>>()
        .join("+");
    format!("{SCHOLAR_BASE}?q={encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_become_plus() {
        assert_eq!(
            scholar_link("fatty acid", "placenta human"),
            "https://scholar.google.com/scholar?q=fatty+acid+placenta+human"
        );
    }

    #[test]
    fn reserved_characters_are_encoded() {
        assert_eq!(
            scholar_link("IL-6/IL6R", "placenta human"),
            "https://scholar.google.com/scholar?q=IL-6%2FIL6R+placenta+human"
        );
    }
}
