use std::collections::{HashMap, HashSet};

use regex::Regex;

use super::WorkOrder;

/// Work orders split by what should happen to them. Only `valid` rows are
/// dispatched; each reject set gets its own CSV in the run report.
#[derive(Debug, Default)]
pub struct RosterPartition {
    pub valid: Vec<WorkOrder>,
    /// Rows identical to an earlier row. The first copy stays valid.
    pub duplicate_records: Vec<WorkOrder>,
    /// Rows whose target appears again with different parameters. None of
    /// them run; someone has to pick which one was meant.
    pub conflicting_targets: Vec<WorkOrder>,
    /// Rows whose target did not match the `--match` filter.
    pub filtered_out: Vec<WorkOrder>,
}

impl RosterPartition {
    pub fn has_rejects(&self) -> bool {
        !self.duplicate_records.is_empty()
            || !self.conflicting_targets.is_empty()
            || !self.filtered_out.is_empty()
    }

    pub fn rejected(&self) -> usize {
        self.duplicate_records.len() + self.conflicting_targets.len() + self.filtered_out.len()
    }
}

/// Split work orders into dispatchable rows and rejects, preserving input
/// order within every set.
pub fn partition(orders: Vec<WorkOrder>, target_filter: Option<&Regex>) -> RosterPartition {
    let mut result = RosterPartition::default();

    // Exact duplicates first, so a target repeated with identical
    // parameters does not read as a conflict.
    let mut seen_rows: HashSet<Vec<String>> = HashSet::new();
    let mut deduped = Vec::with_capacity(orders.len());
    for order in orders {
        if seen_rows.insert(order.fields().to_vec()) {
            deduped.push(order);
        } else {
            result.duplicate_records.push(order);
        }
    }

    let mut rows_per_target: HashMap<&str, usize> = HashMap::new();
    for order in &deduped {
        *rows_per_target.entry(order.target()).or_insert(0) += 1;
    }
    let conflicted: HashSet<String> = rows_per_target
        .into_iter()
        .filter(|(_, rows)| *rows > 1)
        .map(|(target, _)| target.to_string())
        .collect();

    for order in deduped {
        if conflicted.contains(order.target()) {
            result.conflicting_targets.push(order);
        } else if let Some(filter) = target_filter
            && !filter.is_match(order.target())
        {
            result.filtered_out.push(order);
        } else {
            result.valid.push(order);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(fields: &[&str]) -> WorkOrder {
        WorkOrder::new(fields.iter().map(|field| field.to_string()).collect())
    }

    #[test]
    fn clean_rosters_pass_through_in_order() {
        let result = partition(
            vec![order(&["a@x", "UTC"]), order(&["b@x", "UTC"])],
            None,
        );
        assert_eq!(result.valid.len(), 2);
        assert_eq!(result.valid[0].target(), "a@x");
        assert!(!result.has_rejects());
    }

    #[test]
    fn exact_duplicates_keep_the_first_copy() {
        let result = partition(
            vec![
                order(&["a@x", "UTC"]),
                order(&["b@x", "UTC"]),
                order(&["a@x", "UTC"]),
            ],
            None,
        );
        assert_eq!(result.valid.len(), 2);
        assert_eq!(result.duplicate_records.len(), 1);
        assert_eq!(result.duplicate_records[0].target(), "a@x");
    }

    #[test]
    fn conflicting_parameters_sideline_every_copy() {
        let result = partition(
            vec![
                order(&["a@x", "UTC"]),
                order(&["b@x", "UTC"]),
                order(&["a@x", "US/Eastern"]),
            ],
            None,
        );
        assert_eq!(result.valid.len(), 1);
        assert_eq!(result.valid[0].target(), "b@x");
        assert_eq!(result.conflicting_targets.len(), 2);
    }

    #[test]
    fn filter_rejects_non_matching_targets() {
        let filter = Regex::new("@corp\\.example$").unwrap();
        let result = partition(
            vec![order(&["a@corp.example", "UTC"]), order(&["b@other.example", "UTC"])],
            Some(&filter),
        );
        assert_eq!(result.valid.len(), 1);
        assert_eq!(result.filtered_out.len(), 1);
        assert_eq!(result.filtered_out[0].target(), "b@other.example");
    }

    #[test]
    fn conflicts_are_reported_before_filtering() {
        let filter = Regex::new("^never$").unwrap();
        let result = partition(
            vec![order(&["a@x", "UTC"]), order(&["a@x", "US/Eastern"])],
            Some(&filter),
        );
        assert_eq!(result.conflicting_targets.len(), 2);
        assert!(result.filtered_out.is_empty());
    }
}
