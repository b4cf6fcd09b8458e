use crate::catalog::enricher::ResolvedAssociation;
use crate::gateway::models::Entry;

/// The two client-controlled inputs of the view derivation. An empty search
/// string and an empty tag set both mean "no constraint".
#[derive(Clone, Debug, Default)]
pub struct CatalogQuery {
    pub search: String,
    pub tag_ids: Vec<String>,
}

impl CatalogQuery {
    pub fn is_unconstrained(&self) -> bool {
        self.search.is_empty() && self.tag_ids.is_empty()
    }
}

/// Pure view derivation. An entry is visible iff its name contains the search
/// text (case-insensitive substring, or the search is empty) and it carries
/// every selected tag (AND across tags, or the selection is empty). Input
/// order is preserved; there is no secondary sort.
pub fn visible_entries<'a>(
    entries: &'a [Entry],
    associations: &[ResolvedAssociation],
    query: &CatalogQuery,
) -> Vec<&'a Entry> {
    let needle = query.search.to_lowercase();
    entries
        .iter()
        .filter(|entry| {
            if !needle.is_empty() && !entry.name.to_lowercase().contains(&needle) {
                return false;
            }
            query.tag_ids.iter().all(|tag_id| {
                associations
                    .iter()
                    .any(|a| a.entry_id == entry.id && a.tag_id == *tag_id)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: &str, name: &str) -> Entry {
        let now = Utc::now();
        Entry {
            id: id.to_string(),
            name: name.to_string(),
            source_url: "https://example.com/src".to_string(),
            demo_url: "https://example.com/demo".to_string(),
            image_url: "https://example.com/img.png".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn link(entry_id: &str, tag_id: &str) -> ResolvedAssociation {
        ResolvedAssociation {
            id: format!("{entry_id}-{tag_id}"),
            entry_id: entry_id.to_string(),
            tag_id: tag_id.to_string(),
            tag_name: tag_id.to_string(),
            tag_color: "#abc".to_string(),
        }
    }

    fn query(search: &str, tag_ids: &[&str]) -> CatalogQuery {
        CatalogQuery {
            search: search.to_string(),
            tag_ids: tag_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn unconstrained_query_returns_everything_in_order() {
        let entries = vec![entry("e1", "Zebra"), entry("e2", "Apple"), entry("e3", "Mango")];
        let visible = visible_entries(&entries, &[], &CatalogQuery::default());
        let ids: Vec<&str> = visible.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3"]);
    }

    #[test]
    fn search_is_case_insensitive_substring_match() {
        let entries = vec![entry("e1", "OrangeSlice"), entry("e2", "Grapefruit")];
        let visible = visible_entries(&entries, &[], &query("orange", &[]));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "e1");

        let visible = visible_entries(&entries, &[], &query("FRUIT", &[]));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "e2");
    }

    #[test]
    fn selected_tags_combine_with_and_semantics() {
        let entries = vec![entry("e1", "one"), entry("e2", "two")];
        let links = vec![link("e1", "web"), link("e1", "cli"), link("e2", "web")];

        let visible = visible_entries(&entries, &links, &query("", &["web", "cli"]));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "e1");

        let visible = visible_entries(&entries, &links, &query("", &["web"]));
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn entry_without_associations_never_matches_a_tag_filter() {
        let entries = vec![entry("e1", "untagged")];
        assert!(visible_entries(&entries, &[], &query("", &["web"])).is_empty());
        assert_eq!(visible_entries(&entries, &[], &query("", &[])).len(), 1);
    }

    #[test]
    fn search_and_tags_must_both_hold() {
        let entries = vec![entry("e1", "Alpha"), entry("e2", "Beta")];
        let links = vec![link("e1", "web"), link("e2", "web")];
        let visible = visible_entries(&entries, &links, &query("beta", &["web"]));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "e2");
    }

    #[test]
    fn output_is_a_subset_and_recomputation_is_stable() {
        let entries = vec![entry("e1", "Orange"), entry("e2", "Pear"), entry("e3", "Orangeade")];
        let links = vec![link("e1", "web"), link("e3", "web")];
        let q = query("orange", &["web"]);

        let first = visible_entries(&entries, &links, &q);
        let second = visible_entries(&entries, &links, &q);
        assert_eq!(first, second);
        assert!(first.iter().all(|v| entries.iter().any(|e| e.id == v.id)));
    }

    #[test]
    fn no_match_is_distinct_from_no_entries() {
        let entries = vec![entry("e1", "Apple")];
        let visible = visible_entries(&entries, &[], &query("Orange", &[]));
        // Zero matches over a non-empty catalog; the serving layer reports the
        // total alongside so clients can show the right empty state.
        assert!(visible.is_empty());
        assert!(!entries.is_empty());
    }
}
