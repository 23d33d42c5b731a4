//! Branch grouper — partitions rows by exact branch value.

use duemail_core::types::{BranchGroup, OverdueItemRow};
use std::collections::HashMap;

/// Group rows by `branch`. Groups appear in first-occurrence order and
/// rows keep their input order inside each group. No normalization:
/// `"A"` and `"a"` are different branches.
pub fn group_by_branch(rows: Vec<OverdueItemRow>) -> Vec<BranchGroup> {
    let mut groups: Vec<BranchGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let slot = match index.get(&row.branch) {
            Some(&i) => i,
            None => {
                index.insert(row.branch.clone(), groups.len());
                groups.push(BranchGroup::new(row.branch.clone()));
                groups.len() - 1
            }
        };
        groups[slot].rows.push(row);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(branch: &str, topic: &str) -> OverdueItemRow {
        OverdueItemRow::new(topic, branch, "l@x.com", "c@x.com", "2024-01-01")
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_branch(Vec::new()).is_empty());
    }

    #[test]
    fn test_first_occurrence_order() {
        let groups = group_by_branch(vec![
            row("B", "t1"),
            row("A", "t2"),
            row("B", "t3"),
            row("C", "t4"),
            row("A", "t5"),
        ]);
        let names: Vec<_> = groups.iter().map(|g| g.branch.as_str()).collect();
        assert_eq!(names, ["B", "A", "C"]);

        let b_topics: Vec<_> = groups[0].rows.iter().map(|r| r.topic.as_str()).collect();
        assert_eq!(b_topics, ["t1", "t3"]);
        let a_topics: Vec<_> = groups[1].rows.iter().map(|r| r.topic.as_str()).collect();
        assert_eq!(a_topics, ["t2", "t5"]);
    }

    #[test]
    fn test_partition_is_exact() {
        let input = vec![
            row("north", "a"),
            row("south", "b"),
            row("north", "c"),
            row("east", "d"),
            row("south", "e"),
            row("south", "f"),
        ];
        let groups = group_by_branch(input.clone());

        let total: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, input.len());
        for g in &groups {
            assert!(g.rows.iter().all(|r| r.branch == g.branch));
        }
        for r in &input {
            let hits = groups
                .iter()
                .filter(|g| g.rows.contains(r))
                .count();
            assert_eq!(hits, 1, "row {:?} must land in exactly one group", r.topic);
        }
    }

    #[test]
    fn test_no_case_or_whitespace_folding() {
        let groups = group_by_branch(vec![row("A", "1"), row("a", "2"), row("A ", "3")]);
        assert_eq!(groups.len(), 3);
    }
}
