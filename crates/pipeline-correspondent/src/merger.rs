use std::collections::HashMap;

use pipeline_types::Correspondent;

/// One planned merge: duplicates reassigned into `primary`, then deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub normalized_key: String,
    pub primary_id: u64,
    pub primary_display_name: String,
    pub merged_document_count: u64,
    pub duplicate_ids: Vec<u64>,
}

/// Groups correspondents by normalized key, picks the highest-doc-count one
/// as primary, and plans reassignment of the rest. Never mutates its input;
/// callers choose whether to apply the plan or just report it
/// (`--dry-run`).
#[must_use]
pub fn plan_merges(correspondents: &[Correspondent]) -> Vec<MergePlan> {
    let mut groups: HashMap<&str, Vec<&Correspondent>> = HashMap::new();
    for c in correspondents {
        groups.entry(c.normalized_key.as_str()).or_default().push(c);
    }

    let mut plans = Vec::new();
    for (key, mut group) in groups {
        if group.len() < 2 {
            continue;
        }
        // Highest document count wins; ties broken by lowest id for determinism.
        group.sort_by(|a, b| b.document_count.cmp(&a.document_count).then(a.id.cmp(&b.id)));
        let primary = group[0];
        let total: u64 = group.iter().map(|c| c.document_count).sum();
        let duplicate_ids = group[1..].iter().map(|c| c.id).collect();

        plans.push(MergePlan {
            normalized_key: key.to_string(),
            primary_id: primary.id,
            primary_display_name: primary.display_name.clone(),
            merged_document_count: total,
            duplicate_ids,
        });
    }
    plans.sort_by(|a, b| a.normalized_key.cmp(&b.normalized_key));
    plans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_the_worked_example_from_the_spec() {
        let correspondents = vec![
            Correspondent {
                id: 1,
                normalized_key: "aukro".to_string(),
                display_name: "Aukro".to_string(),
                document_count: 50,
            },
            Correspondent {
                id: 2,
                normalized_key: "aukro".to_string(),
                display_name: "aukro.cz".to_string(),
                document_count: 30,
            },
            Correspondent {
                id: 3,
                normalized_key: "aukro".to_string(),
                display_name: "AUKRO s.r.o.".to_string(),
                document_count: 14,
            },
        ];

        let plans = plan_merges(&correspondents);
        assert_eq!(plans.len(), 1);
        let plan = &plans[0];
        assert_eq!(plan.primary_id, 1);
        assert_eq!(plan.primary_display_name, "Aukro");
        assert_eq!(plan.merged_document_count, 94);
        assert_eq!(plan.duplicate_ids, vec![2, 3]);
    }

    #[test]
    fn singleton_groups_need_no_merge() {
        let correspondents = vec![Correspondent {
            id: 1,
            normalized_key: "solo".to_string(),
            display_name: "Solo".to_string(),
            document_count: 5,
        }];
        assert!(plan_merges(&correspondents).is_empty());
    }
}
