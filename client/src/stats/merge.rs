use super::sample::{
    IdentityKey,
    StatSample,
    Totals,
};
use std::collections::HashMap;

/// Statistics of one call site summed over every server that reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedStat {
    pub key: IdentityKey,
    pub totals: Totals,
}

/// Sums samples sharing an [`IdentityKey`]. Groups are returned in order of first appearance.
pub fn merge(samples: Vec<StatSample>) -> Vec<MergedStat> {
    let mut positions: HashMap<IdentityKey, usize> = HashMap::new();
    let mut merged: Vec<MergedStat> = Vec::new();

    for StatSample { key, totals, .. } in samples {
        match positions.get(&key) {
            Some(&index) => merged[index].totals += totals,
            None => {
                positions.insert(key.clone(), merged.len());
                merged.push(MergedStat { key, totals });
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(path: &str, line: u64, func_name: &str) -> IdentityKey {
        IdentityKey {
            path: path.to_string(),
            line,
            func_name: func_name.to_string(),
        }
    }

    fn sample(host: &str, key: IdentityKey, total_time: f64, cum_time: f64, num_calls: u64) -> StatSample {
        StatSample {
            host: host.to_string(),
            key,
            totals: Totals {
                total_time,
                cum_time,
                num_calls,
            },
        }
    }

    #[test]
    fn sums_identical_call_sites() {
        let merged = merge(vec![
            sample("a", key("f.py", 10, "foo"), 2.0, 4.0, 2),
            sample("b", key("f.py", 10, "foo"), 1.0, 1.0, 1),
        ]);

        assert_eq!(
            merged,
            vec![MergedStat {
                key: key("f.py", 10, "foo"),
                totals: Totals {
                    total_time: 3.0,
                    cum_time: 5.0,
                    num_calls: 3,
                },
            }]
        );
    }

    #[test]
    fn keeps_first_appearance_order() {
        let merged = merge(vec![
            sample("a", key("b.py", 1, "second"), 1.0, 1.0, 1),
            sample("a", key("a.py", 1, "first"), 1.0, 1.0, 1),
            sample("b", key("b.py", 1, "second"), 1.0, 1.0, 1),
            sample("b", key("c.py", 1, "third"), 1.0, 1.0, 1),
        ]);

        let names: Vec<_> = merged.iter().map(|stat| stat.key.func_name.as_str()).collect();
        assert_eq!(names, vec!["second", "first", "third"]);
        assert_eq!(merged[0].totals.num_calls, 2);
    }

    #[test]
    fn different_lines_stay_apart() {
        let merged = merge(vec![
            sample("a", key("f.py", 10, "foo"), 1.0, 1.0, 1),
            sample("a", key("f.py", 11, "foo"), 1.0, 1.0, 1),
        ]);

        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn empty_input() {
        assert!(merge(Vec::new()).is_empty());
    }
}
