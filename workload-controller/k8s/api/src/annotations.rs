use crate::Map;

/// Holds a JSON list of workload identifiers the service should route to.
pub const TARGET_WORKLOADS_ANNOTATION: &str = "field.cattle.io/targetWorkloadIds";

/// When set to `"true"`, the service's target workloads are ignored.
pub const TARGET_WORKLOADS_NOOP_ANNOTATION: &str = "field.cattle.io/targetWorkloadIdNoop";

/// Reads the target workload identifiers from a service's annotations.
///
/// Returns an empty list when the annotation is missing or empty, or when the
/// service has opted out. Fails only when the annotation holds something other
/// than a JSON list of strings.
pub fn target_workload_ids(annotations: &Map) -> Result<Vec<String>, serde_json::Error> {
    let value = match annotations.get(TARGET_WORKLOADS_ANNOTATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(Vec::new()),
    };

    if annotations
        .get(TARGET_WORKLOADS_NOOP_ANNOTATION)
        .is_some_and(|noop| noop == "true")
    {
        return Ok(Vec::new());
    }

    serde_json::from_str(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn decodes_ordered_ids() {
        let annotations = btreemap! {
            TARGET_WORKLOADS_ANNOTATION.to_string() =>
                r#"["deployment:default:web","statefulset:default:db"]"#.to_string(),
        };
        assert_eq!(
            target_workload_ids(&annotations).unwrap(),
            vec!["deployment:default:web", "statefulset:default:db"],
        );
    }

    #[test]
    fn missing_or_empty() {
        assert!(target_workload_ids(&Map::default()).unwrap().is_empty());

        let annotations = btreemap! {
            TARGET_WORKLOADS_ANNOTATION.to_string() => String::new(),
        };
        assert!(target_workload_ids(&annotations).unwrap().is_empty());
    }

    #[test]
    fn noop_opts_out() {
        let annotations = btreemap! {
            TARGET_WORKLOADS_ANNOTATION.to_string() => r#"["wl1"]"#.to_string(),
            TARGET_WORKLOADS_NOOP_ANNOTATION.to_string() => "true".to_string(),
        };
        assert!(target_workload_ids(&annotations).unwrap().is_empty());

        let annotations = btreemap! {
            TARGET_WORKLOADS_ANNOTATION.to_string() => r#"["wl1"]"#.to_string(),
            TARGET_WORKLOADS_NOOP_ANNOTATION.to_string() => "false".to_string(),
        };
        assert_eq!(target_workload_ids(&annotations).unwrap(), vec!["wl1"]);
    }

    #[test]
    fn malformed() {
        let annotations = btreemap! {
            TARGET_WORKLOADS_ANNOTATION.to_string() => "wl1,wl2".to_string(),
        };
        assert!(target_workload_ids(&annotations).is_err());

        let annotations = btreemap! {
            TARGET_WORKLOADS_ANNOTATION.to_string() => r#"{"id":"wl1"}"#.to_string(),
        };
        assert!(target_workload_ids(&annotations).is_err());
    }
}
