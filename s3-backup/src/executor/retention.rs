//! Retention policy: which snapshots of a job get deleted.

/// Select the keys to delete so that only the newest `retention_count` remain.
///
/// Keys are sorted ascending first; snapshot keys sort chronologically, so the
/// selection is the oldest `len - retention_count` entries. A non-positive
/// count selects nothing.
pub fn select_for_deletion(all_keys: &[String], retention_count: i64) -> Vec<String> {
    let Ok(keep) = usize::try_from(retention_count) else {
        return Vec::new();
    };
    if keep == 0 || all_keys.len() <= keep {
        return Vec::new();
    }

    let mut sorted = all_keys.to_vec();
    sorted.sort();
    sorted.truncate(all_keys.len() - keep);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_nothing_to_prune_under_retention() {
        let all = keys(&["a", "b", "c"]);
        assert!(select_for_deletion(&all, 5).is_empty());
        assert!(select_for_deletion(&all, 3).is_empty());
    }

    #[test]
    fn test_selects_oldest_regardless_of_input_order() {
        let all = keys(&[
            "db/x-2024-01-03T00-00-00-000Z.bak",
            "db/x-2024-01-01T00-00-00-000Z.bak",
            "db/x-2024-01-05T00-00-00-000Z.bak",
            "db/x-2024-01-02T00-00-00-000Z.bak",
            "db/x-2024-01-04T00-00-00-000Z.bak",
        ]);

        let selected = select_for_deletion(&all, 2);
        assert_eq!(
            selected,
            keys(&[
                "db/x-2024-01-01T00-00-00-000Z.bak",
                "db/x-2024-01-02T00-00-00-000Z.bak",
                "db/x-2024-01-03T00-00-00-000Z.bak",
            ])
        );
    }

    #[test]
    fn test_non_positive_retention_prunes_nothing() {
        let all = keys(&["a", "b"]);
        assert!(select_for_deletion(&all, 0).is_empty());
        assert!(select_for_deletion(&all, -3).is_empty());
    }

    #[test]
    fn test_selection_size_and_ordering_hold_for_all_counts() {
        let all = keys(&["k07", "k03", "k10", "k01", "k05", "k02", "k09", "k04", "k08", "k06"]);

        for retention in 1..=12i64 {
            let selected = select_for_deletion(&all, retention);
            let expected_len = all.len().saturating_sub(retention as usize);
            assert_eq!(selected.len(), expected_len, "retention {}", retention);

            let retained: Vec<&String> = all.iter().filter(|k| !selected.contains(*k)).collect();
            for deleted in &selected {
                assert!(retained.iter().all(|kept| deleted < *kept));
            }
        }
    }
}
