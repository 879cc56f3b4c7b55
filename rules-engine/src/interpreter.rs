//! Evaluation of parsed rule logic against JSON data
//!
//! Truthiness follows JsonLogic: `false`, `null`, `0`, `""` and `[]` are
//! falsy, everything else is truthy. Dates are RFC 3339 strings.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Number, Value};

use crate::error::{Result, RuleEngineError};
use crate::logic::{Comparison, DateComparison, Logic, TimeUnit};

const UVCI_PREFIX: &str = "URN:UVCI:";

/// Offsets beyond this many units are rejected rather than overflowing
const MAX_TIME_OFFSET: i64 = 1_000_000;

/// # Errors
///
/// Any [`RuleEngineError`] raised by an operator; the caller decides how
/// an interpretation error maps to a verdict.
pub fn evaluate(logic: &Logic, data: &Value) -> Result<Value> {
    match logic {
        Logic::Literal(value) => Ok(value.clone()),
        Logic::Array(items) => items
            .iter()
            .map(|item| evaluate(item, data))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Logic::Var { path, default } => match lookup(data, path) {
            Some(value) => Ok(value.clone()),
            None => match default {
                Some(default) => evaluate(default, data),
                None => Err(RuleEngineError::MissingField(path.clone())),
            },
        },
        Logic::If(branches) => {
            for branch in branches.chunks(2) {
                match branch {
                    [condition, then] => {
                        if truthy(&evaluate(condition, data)?) {
                            return evaluate(then, data);
                        }
                    }
                    [otherwise] => return evaluate(otherwise, data),
                    _ => {}
                }
            }
            Ok(Value::Null)
        }
        Logic::Compare { op, operands } => {
            let values = evaluate_all(operands, data)?;
            compare(*op, &values).map(Value::Bool)
        }
        Logic::And(operands) => {
            let mut last = Value::Null;
            for operand in operands {
                last = evaluate(operand, data)?;
                if !truthy(&last) {
                    break;
                }
            }
            Ok(last)
        }
        Logic::Or(operands) => {
            let mut last = Value::Null;
            for operand in operands {
                last = evaluate(operand, data)?;
                if truthy(&last) {
                    break;
                }
            }
            Ok(last)
        }
        Logic::Not(operand) => Ok(Value::Bool(!truthy(&evaluate(operand, data)?))),
        Logic::Truthy(operand) => Ok(Value::Bool(truthy(&evaluate(operand, data)?))),
        Logic::In { needle, haystack } => {
            let needle = evaluate(needle, data)?;
            match evaluate(haystack, data)? {
                Value::Array(items) => Ok(Value::Bool(
                    items.iter().any(|item| strict_equals(item, &needle)),
                )),
                Value::String(text) => match needle {
                    Value::String(part) => Ok(Value::Bool(text.contains(part.as_str()))),
                    other => Err(RuleEngineError::type_mismatch(
                        "in",
                        format!("cannot search a string for {}", other),
                    )),
                },
                Value::Null => Ok(Value::Bool(false)),
                other => Err(RuleEngineError::type_mismatch(
                    "in",
                    format!("expected an array or string, found {}", other),
                )),
            }
        }
        Logic::Plus(operands) => {
            let mut sum = 0.0;
            for value in evaluate_all(operands, data)? {
                sum += to_number(&value).ok_or_else(|| {
                    RuleEngineError::type_mismatch("+", format!("{} is not a number", value))
                })?;
            }
            number_value(sum)
        }
        Logic::PlusTime { date, amount, unit } => {
            let date = evaluate(date, data)?;
            let start = as_datetime("plusTime", &date)?;
            let amount = match evaluate(amount, data)? {
                Value::Number(n) => n.as_i64(),
                _ => None,
            }
            .ok_or_else(|| {
                RuleEngineError::type_mismatch("plusTime", "amount must be an integer")
            })?;
            let shifted = plus_time(start, amount, *unit).ok_or_else(|| {
                RuleEngineError::type_mismatch("plusTime", "result is out of range")
            })?;
            Ok(Value::String(
                shifted.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ))
        }
        Logic::CompareDates { op, operands } => {
            let instants = evaluate_all(operands, data)?
                .iter()
                .map(|value| as_datetime(op.symbol(), value))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Bool(instants.windows(2).all(|pair| match op {
                DateComparison::Before => pair[0] < pair[1],
                DateComparison::NotBefore => pair[0] >= pair[1],
                DateComparison::After => pair[0] > pair[1],
                DateComparison::NotAfter => pair[0] <= pair[1],
            })))
        }
        Logic::Reduce {
            operand,
            lambda,
            initial,
        } => {
            let initial = evaluate(initial, data)?;
            match evaluate(operand, data)? {
                Value::Null => Ok(initial),
                Value::Array(items) => items.into_iter().try_fold(initial, |accumulator, current| {
                    let mut scope = Map::new();
                    scope.insert("current".to_string(), current);
                    scope.insert("accumulator".to_string(), accumulator);
                    evaluate(lambda, &Value::Object(scope))
                }),
                other => Err(RuleEngineError::type_mismatch(
                    "reduce",
                    format!("expected an array, found {}", other),
                )),
            }
        }
        Logic::ExtractFromUvci { operand, index } => {
            let index = match evaluate(index, data)? {
                Value::Number(n) => n.as_i64(),
                _ => None,
            }
            .ok_or_else(|| {
                RuleEngineError::type_mismatch("extractFromUVCI", "index must be an integer")
            })?;
            match evaluate(operand, data)? {
                Value::Null => Ok(Value::Null),
                Value::String(uvci) => Ok(usize::try_from(index)
                    .ok()
                    .and_then(|i| uvci_fragment(&uvci, i))
                    .map_or(Value::Null, |fragment| Value::String(fragment.to_string()))),
                other => Err(RuleEngineError::type_mismatch(
                    "extractFromUVCI",
                    format!("expected a string or null, found {}", other),
                )),
            }
        }
    }
}

fn evaluate_all(operands: &[Logic], data: &Value) -> Result<Vec<Value>> {
    operands.iter().map(|operand| evaluate(operand, data)).collect()
}

/// Resolve a dotted path; array elements are addressed by index
/// (`v.0.dn`). A present `null` is distinct from an absent path.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_value(n: f64) -> Result<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Ok(Value::from(n as i64));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| RuleEngineError::type_mismatch("+", "result is not a finite number"))
}

fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(x), other) | (other, Value::Bool(x)) if !other.is_boolean() => {
            let x = if *x { 1.0 } else { 0.0 };
            to_number(other) == Some(x)
        }
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (to_number(a), to_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        _ => strict_equals(a, b),
    }
}

fn compare(op: Comparison, values: &[Value]) -> Result<bool> {
    match (op, values) {
        (Comparison::StrictEq, [a, b]) => Ok(strict_equals(a, b)),
        (Comparison::StrictNe, [a, b]) => Ok(!strict_equals(a, b)),
        (Comparison::LooseEq, [a, b]) => Ok(loose_equals(a, b)),
        (Comparison::LooseNe, [a, b]) => Ok(!loose_equals(a, b)),
        (Comparison::StrictEq | Comparison::StrictNe | Comparison::LooseEq | Comparison::LooseNe, _) => {
            Err(RuleEngineError::InvalidLogic(format!(
                "'{}' takes exactly 2 operands",
                op.symbol()
            )))
        }
        (ordering, values) => {
            let numbers = values
                .iter()
                .map(|value| {
                    to_number(value).ok_or_else(|| {
                        RuleEngineError::type_mismatch(
                            ordering.symbol(),
                            format!("{} is not comparable", value),
                        )
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            Ok(numbers.windows(2).all(|pair| match ordering {
                Comparison::Less => pair[0] < pair[1],
                Comparison::LessOrEqual => pair[0] <= pair[1],
                Comparison::Greater => pair[0] > pair[1],
                _ => pair[0] >= pair[1],
            }))
        }
    }
}

/// Accepts RFC 3339, offsets without a colon, naive timestamps (taken as
/// UTC) and plain dates (midnight UTC)
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn as_datetime(operator: &str, value: &Value) -> Result<DateTime<Utc>> {
    value
        .as_str()
        .and_then(parse_datetime)
        .ok_or_else(|| RuleEngineError::type_mismatch(operator, format!("{} is not a date-time", value)))
}

fn plus_time(start: DateTime<Utc>, amount: i64, unit: TimeUnit) -> Option<DateTime<Utc>> {
    if amount.abs() > MAX_TIME_OFFSET {
        return None;
    }
    match unit {
        TimeUnit::Hour => start.checked_add_signed(Duration::hours(amount)),
        TimeUnit::Day => start.checked_add_signed(Duration::days(amount)),
        TimeUnit::Month => add_months(start, amount),
        TimeUnit::Year => add_months(start, amount * 12),
    }
}

/// Month arithmetic clamps to the last day of shorter months
fn add_months(start: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        start.checked_add_months(magnitude)
    } else {
        start.checked_sub_months(magnitude)
    }
}

fn uvci_fragment(uvci: &str, index: usize) -> Option<&str> {
    uvci.strip_prefix(UVCI_PREFIX)
        .unwrap_or(uvci)
        .split(['/', '#', ':'])
        .nth(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(logic: Value, data: Value) -> Result<Value> {
        evaluate(&Logic::parse(&logic)?, &data)
    }

    #[test]
    fn test_var_lookup() {
        let data = json!({"payload": {"v": [{"dn": 2, "sd": 2}], "nam": null}});
        assert_eq!(run(json!({"var": "payload.v.0.dn"}), data.clone()), Ok(json!(2)));
        assert_eq!(run(json!({"var": "payload.nam"}), data.clone()), Ok(Value::Null));
        assert_eq!(run(json!({"var": ["payload.r", "none"]}), data.clone()), Ok(json!("none")));
        assert_eq!(
            run(json!({"var": "payload.v.1.dn"}), data),
            Err(RuleEngineError::MissingField("payload.v.1.dn".to_string()))
        );
    }

    #[test]
    fn test_equality_flavours() {
        let data = json!({});
        assert_eq!(run(json!({"===": [1, 1.0]}), data.clone()), Ok(json!(true)));
        assert_eq!(run(json!({"===": [1, "1"]}), data.clone()), Ok(json!(false)));
        assert_eq!(run(json!({"==": [1, "1"]}), data.clone()), Ok(json!(true)));
        assert_eq!(run(json!({"==": [true, 1]}), data.clone()), Ok(json!(true)));
        assert_eq!(run(json!({"==": [null, 0]}), data.clone()), Ok(json!(false)));
        assert_eq!(run(json!({"!==": ["a", "b"]}), data.clone()), Ok(json!(true)));
        assert_eq!(run(json!({"!=": [2, "2"]}), data), Ok(json!(false)));
    }

    #[test]
    fn test_ordering_and_between() {
        let data = json!({"dn": 2, "sd": 2});
        assert_eq!(
            run(json!({">=": [{"var": "dn"}, {"var": "sd"}]}), data.clone()),
            Ok(json!(true))
        );
        assert_eq!(run(json!({"<": [1, 2, 3]}), data.clone()), Ok(json!(true)));
        assert_eq!(run(json!({"<": [1, 3, 3]}), data.clone()), Ok(json!(false)));
        assert!(matches!(
            run(json!({"<": [{"var": ""}, 1]}), data),
            Err(RuleEngineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_logic_operators_short_circuit() {
        let data = json!({"present": 1});
        // The missing var is never reached
        assert_eq!(
            run(json!({"and": [false, {"var": "absent"}]}), data.clone()),
            Ok(json!(false))
        );
        assert_eq!(
            run(json!({"or": [{"var": "present"}, {"var": "absent"}]}), data.clone()),
            Ok(json!(1))
        );
        assert_eq!(run(json!({"!": [[]]}), data.clone()), Ok(json!(true)));
        assert_eq!(run(json!({"!!": ["0"]}), data.clone()), Ok(json!(true)));
        assert_eq!(
            run(json!({"if": [false, "a", {"var": "present"}, "b", "c"]}), data),
            Ok(json!("b"))
        );
    }

    #[test]
    fn test_in_and_plus() {
        let data = json!({"external": {"valueSets": {"vaccines": ["EU/1/20/1528", "EU/1/20/1507"]}}});
        assert_eq!(
            run(
                json!({"in": ["EU/1/20/1507", {"var": "external.valueSets.vaccines"}]}),
                data.clone()
            ),
            Ok(json!(true))
        );
        assert_eq!(run(json!({"in": ["lo", "hello"]}), data.clone()), Ok(json!(true)));
        assert_eq!(run(json!({"+": [1, "2", 3.5]}), data.clone()), Ok(json!(6.5)));
        assert_eq!(run(json!({"+": [1, 2]}), data.clone()), Ok(json!(3)));
        assert!(run(json!({"in": [1, 2]}), data).is_err());
    }

    #[test]
    fn test_plus_time_and_date_comparisons() {
        let data = json!({"sc": "2021-01-31T10:00:00Z", "clock": "2021-03-01T00:00:00Z"});
        assert_eq!(
            run(json!({"plusTime": [{"var": "sc"}, 1, "month"]}), data.clone()),
            Ok(json!("2021-02-28T10:00:00Z"))
        );
        assert_eq!(
            run(json!({"plusTime": ["2021-05-01", -48, "hour"]}), data.clone()),
            Ok(json!("2021-04-29T00:00:00Z"))
        );
        assert_eq!(
            run(
                json!({"not-before": [{"var": "clock"}, {"plusTime": [{"var": "sc"}, 14, "day"]}]}),
                data.clone()
            ),
            Ok(json!(true))
        );
        assert_eq!(
            run(
                json!({"before": ["2021-01-01", {"var": "sc"}, {"var": "clock"}]}),
                data.clone()
            ),
            Ok(json!(true))
        );
        assert_eq!(
            run(json!({"after": ["2021-01-01T00:00:00+0100", "2020-12-31T23:30:00Z"]}), data.clone()),
            Ok(json!(false))
        );
        assert!(matches!(
            run(json!({"after": ["yesterday", {"var": "clock"}]}), data),
            Err(RuleEngineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_reduce() {
        let data = json!({"doses": [{"dn": 1}, {"dn": 2}, {"dn": 3}]});
        let logic = json!({"reduce": [
            {"var": "doses"},
            {"+": [{"var": "accumulator"}, {"var": "current.dn"}]},
            0
        ]});
        assert_eq!(run(logic, data), Ok(json!(6)));
        assert_eq!(
            run(json!({"reduce": [{"var": "none"}, true, 7]}), json!({"none": null})),
            Ok(json!(7))
        );
    }

    #[test]
    fn test_extract_from_uvci() {
        let data = json!({"ci": "URN:UVCI:01:NL:187/37512422923#Z", "missing": null});
        assert_eq!(
            run(json!({"extractFromUVCI": [{"var": "ci"}, 1]}), data.clone()),
            Ok(json!("NL"))
        );
        assert_eq!(
            run(json!({"extractFromUVCI": [{"var": "ci"}, 3]}), data.clone()),
            Ok(json!("37512422923"))
        );
        assert_eq!(
            run(json!({"extractFromUVCI": [{"var": "ci"}, 9]}), data.clone()),
            Ok(Value::Null)
        );
        assert_eq!(
            run(json!({"extractFromUVCI": [{"var": "missing"}, 0]}), data),
            Ok(Value::Null)
        );
    }

    #[test]
    fn test_parse_datetime_formats() {
        let midnight = parse_datetime("2021-05-01").unwrap();
        assert_eq!(parse_datetime("2021-05-01T00:00:00Z"), Some(midnight));
        assert_eq!(parse_datetime("2021-05-01T00:00:00"), Some(midnight));
        assert_eq!(parse_datetime("2021-05-01T02:00:00+02:00"), Some(midnight));
        assert_eq!(parse_datetime("not a date"), None);
    }
}
