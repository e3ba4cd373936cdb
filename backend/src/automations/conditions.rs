// Condition evaluation - pure predicate over an event payload

use serde_json::{Map, Value};

use cadence_shared::{Condition, ConditionOperator};

/// Evaluate an AND-combined condition list against an input payload.
/// An empty list is vacuously true. Total: no input can make this panic
/// or perform I/O.
pub fn evaluate(payload: &Map<String, Value>, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| matches_condition(payload, c))
}

fn matches_condition(payload: &Map<String, Value>, condition: &Condition) -> bool {
    let field_value = payload.get(&condition.field);

    match condition.operator {
        ConditionOperator::Equals => stringify(field_value) == condition.value,
        ConditionOperator::NotEquals => stringify(field_value) != condition.value,
        ConditionOperator::Contains => stringify(field_value).contains(&condition.value),
        ConditionOperator::GreaterThan => numify(field_value) > parse_number(&condition.value),
        ConditionOperator::LessThan => numify(field_value) < parse_number(&condition.value),
        ConditionOperator::Unsupported => false,
    }
}

/// String coercion for the comparison operators. Missing fields and nulls
/// coerce to the empty string.
fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Numeric coercion for the ordering operators. Non-numeric payload values
/// coerce to 0.
fn numify(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_number(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(field: &str, operator: ConditionOperator, value: &str) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    fn payload(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_condition_list_is_vacuously_true() {
        assert!(evaluate(&Map::new(), &[]));
        assert!(evaluate(&payload(&[("status", json!("open"))]), &[]));
    }

    #[test]
    fn equals_compares_stringified_values() {
        let p = payload(&[("status", json!("open")), ("count", json!(3))]);

        assert!(evaluate(&p, &[condition("status", ConditionOperator::Equals, "open")]));
        assert!(!evaluate(&p, &[condition("status", ConditionOperator::Equals, "closed")]));
        // Numbers stringify before comparison
        assert!(evaluate(&p, &[condition("count", ConditionOperator::Equals, "3")]));
    }

    #[test]
    fn not_equals_on_missing_field_compares_against_empty_string() {
        let p = payload(&[]);

        assert!(evaluate(&p, &[condition("status", ConditionOperator::NotEquals, "open")]));
        assert!(!evaluate(&p, &[condition("status", ConditionOperator::NotEquals, "")]));
    }

    #[test]
    fn contains_is_a_substring_test() {
        let p = payload(&[("subject", json!("Printer offline in Building 4"))]);

        assert!(evaluate(&p, &[condition("subject", ConditionOperator::Contains, "offline")]));
        assert!(!evaluate(&p, &[condition("subject", ConditionOperator::Contains, "Offline")]));
    }

    #[test]
    fn numeric_comparisons_coerce_non_numeric_to_zero() {
        let p = payload(&[
            ("hours_open", json!(12)),
            ("label", json!("not-a-number")),
        ]);

        assert!(evaluate(&p, &[condition("hours_open", ConditionOperator::GreaterThan, "8")]));
        assert!(!evaluate(&p, &[condition("hours_open", ConditionOperator::LessThan, "8")]));
        // "not-a-number" coerces to 0
        assert!(evaluate(&p, &[condition("label", ConditionOperator::LessThan, "1")]));
        // missing field coerces to 0
        assert!(!evaluate(&p, &[condition("absent", ConditionOperator::GreaterThan, "0")]));
    }

    #[test]
    fn numeric_strings_in_payload_are_parsed() {
        let p = payload(&[("amount", json!("250.5"))]);

        assert!(evaluate(&p, &[condition("amount", ConditionOperator::GreaterThan, "100")]));
    }

    #[test]
    fn list_is_combined_with_logical_and() {
        let p = payload(&[("status", json!("open")), ("priority", json!("high"))]);

        assert!(evaluate(
            &p,
            &[
                condition("status", ConditionOperator::Equals, "open"),
                condition("priority", ConditionOperator::Equals, "high"),
            ]
        ));
        assert!(!evaluate(
            &p,
            &[
                condition("status", ConditionOperator::Equals, "open"),
                condition("priority", ConditionOperator::Equals, "low"),
            ]
        ));
    }

    #[test]
    fn unsupported_operator_never_matches() {
        let p = payload(&[("status", json!("open"))]);

        assert!(!evaluate(&p, &[condition("status", ConditionOperator::Unsupported, "open")]));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let p = payload(&[("status", json!("open"))]);
        let cs = vec![condition("status", ConditionOperator::Equals, "open")];

        for _ in 0..100 {
            assert!(evaluate(&p, &cs));
        }
    }
}
