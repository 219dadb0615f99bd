//! Operation evaluation for [`MemoryTransport`](super::MemoryTransport).
//!
//! Operations run in order against a working copy of the record's bins;
//! the caller commits the copy only when every operation succeeded.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Range;

use crate::error::AerospikeError;
use crate::operations::{
    ListOpKind, ListOperation, MapOpKind, MapOperation, MapReturnType, MapWriteMode, Operation,
    ScalarOpKind, ScalarOperation,
};
use crate::status::Status;
use crate::value::{Bins, Value};

type EvalResult<T> = std::result::Result<T, AerospikeError>;

/// Largest number of nils an insert or set may pad a list with.
const MAX_LIST_PADDING: i64 = 1 << 16;

/// Effect of an operation list.
#[derive(Debug, Default)]
pub(super) struct Outcome {
    /// Values returned by the operations, by bin.
    pub results: Bins,
    /// New TTL requested by `touch`.
    pub ttl: Option<u32>,
}

/// Apply `ops` to `bins` in order.
pub(super) fn apply_ops(bins: &mut Bins, ops: &[Operation]) -> EvalResult<Outcome> {
    let mut out = Outcome::default();
    for op in ops {
        match op {
            Operation::Scalar(op) => scalar(bins, op, &mut out)?,
            Operation::List(op) => {
                if let Some(value) = list(bins, op)? {
                    out.results.insert(op.bin.clone(), value);
                }
            }
            Operation::Map(op) => {
                if let Some(value) = map(bins, op)? {
                    out.results.insert(op.bin.clone(), value);
                }
            }
        }
    }
    Ok(out)
}

/// Total order over values: by kind first, numbers compared numerically.
pub(super) fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn kind_rank(v: &Value) -> u8 {
        match v {
            Value::Nil => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Blob(_) => 4,
            Value::List(_) => 5,
            Value::Map(_) => 6,
            Value::GeoJson(_) => 7,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        (Value::List(x), Value::List(y)) => x
            .iter()
            .zip(y)
            .map(|(a, b)| cmp_values(a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Map(x), Value::Map(y)) => x.len().cmp(&y.len()),
        (Value::GeoJson(x), Value::GeoJson(y)) => x.as_str().cmp(y.as_str()),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn incompatible(bin: &str) -> AerospikeError {
    AerospikeError::new(
        Status::ERR_BIN_INCOMPATIBLE_TYPE,
        format!("bin '{}' has an incompatible type", bin),
    )
}

fn invalid(message: impl Into<String>) -> AerospikeError {
    AerospikeError::new(Status::ERR_REQUEST_INVALID, message)
}

fn required<T: Clone>(field: &Option<T>, name: &str) -> EvalResult<T> {
    field
        .clone()
        .ok_or_else(|| invalid(format!("missing operation field '{}'", name)))
}

fn scalar(bins: &mut Bins, op: &ScalarOperation, out: &mut Outcome) -> EvalResult<()> {
    let bin = op.bin.as_str();
    match op.op {
        ScalarOpKind::Read if bin.is_empty() => {
            out.results
                .extend(bins.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        ScalarOpKind::Read => {
            if let Some(v) = bins.get(bin) {
                out.results.insert(bin.to_string(), v.clone());
            }
        }
        ScalarOpKind::Write => match required(&op.value, "value")? {
            Value::Nil => {
                bins.remove(bin);
            }
            v => {
                bins.insert(bin.to_string(), v);
            }
        },
        ScalarOpKind::Incr => {
            let next = match (bins.get(bin), required(&op.value, "value")?) {
                (None, v @ Value::Int(_)) | (None, v @ Value::Float(_)) => v,
                (Some(Value::Int(a)), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
                (Some(Value::Float(a)), Value::Float(b)) => Value::Float(a + b),
                _ => return Err(incompatible(bin)),
            };
            bins.insert(bin.to_string(), next);
        }
        ScalarOpKind::Append | ScalarOpKind::Prepend => {
            let append = op.op == ScalarOpKind::Append;
            let next = match (bins.get(bin), required(&op.value, "value")?) {
                (None, v @ Value::String(_)) | (None, v @ Value::Blob(_)) => v,
                (Some(Value::String(a)), Value::String(b)) => {
                    Value::String(if append { format!("{}{}", a, b) } else { format!("{}{}", b, a) })
                }
                (Some(Value::Blob(a)), Value::Blob(b)) => {
                    let (head, tail) = if append { (a, &b) } else { (&b, a) };
                    Value::Blob([head.as_slice(), tail.as_slice()].concat())
                }
                _ => return Err(incompatible(bin)),
            };
            bins.insert(bin.to_string(), next);
        }
        ScalarOpKind::Touch => out.ttl = op.ttl,
    }
    Ok(())
}

/// Position of an existing element; negative indexes count from the end.
fn element(len: usize, index: i64) -> EvalResult<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    if i < 0 || i >= len {
        return Err(invalid(format!("index {} out of bounds", index)));
    }
    Ok(i as usize)
}

/// Elements covered by `index`/`count`, clamped to the list.
fn span(len: usize, index: i64, count: Option<i64>) -> Range<usize> {
    let len = len as i64;
    let start = if index < 0 { (len + index).max(0) } else { index.min(len) };
    let end = match count {
        Some(c) => start.saturating_add(c.max(0)).min(len),
        None => len,
    };
    start as usize..end as usize
}

/// Insertion point for `index`, padding the list with nils past its end.
fn insertion(list: &mut Vec<Value>, index: i64) -> EvalResult<usize> {
    let len = list.len() as i64;
    let i = if index < 0 { len + index } else { index };
    if i < 0 || i - len > MAX_LIST_PADDING {
        return Err(invalid(format!("index {} out of bounds", index)));
    }
    while (list.len() as i64) < i {
        list.push(Value::Nil);
    }
    Ok(i as usize)
}

fn items(value: Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(invalid(format!("expected a list, got {}", other.kind()))),
    }
}

fn list(bins: &mut Bins, op: &ListOperation) -> EvalResult<Option<Value>> {
    let (mut list, existed) = match bins.remove(&op.bin) {
        None => (Vec::new(), false),
        Some(Value::List(list)) => (list, true),
        Some(_) => return Err(incompatible(&op.bin)),
    };
    if !existed && !op.op.is_write() {
        return Ok(Some(Value::Nil));
    }

    let len = list.len();
    let result = match op.op {
        ListOpKind::Append => {
            list.push(required(&op.value, "value")?);
            Some(Value::Int(list.len() as i64))
        }
        ListOpKind::AppendItems => {
            list.extend(items(required(&op.value, "value")?)?);
            Some(Value::Int(list.len() as i64))
        }
        ListOpKind::Insert => {
            let i = insertion(&mut list, required(&op.index, "index")?)?;
            list.insert(i, required(&op.value, "value")?);
            Some(Value::Int(list.len() as i64))
        }
        ListOpKind::InsertItems => {
            let i = insertion(&mut list, required(&op.index, "index")?)?;
            let new_items = items(required(&op.value, "value")?)?;
            list.splice(i..i, new_items);
            Some(Value::Int(list.len() as i64))
        }
        ListOpKind::Pop => {
            let i = element(len, required(&op.index, "index")?)?;
            Some(list.remove(i))
        }
        ListOpKind::PopRange => {
            let r = span(len, required(&op.index, "index")?, op.count);
            Some(Value::List(list.drain(r).collect()))
        }
        ListOpKind::Remove => {
            let i = element(len, required(&op.index, "index")?)?;
            list.remove(i);
            Some(Value::Int(1))
        }
        ListOpKind::RemoveRange => {
            let r = span(len, required(&op.index, "index")?, op.count);
            Some(Value::Int(list.drain(r).count() as i64))
        }
        ListOpKind::Clear => {
            list.clear();
            None
        }
        ListOpKind::Set => {
            let i = insertion(&mut list, required(&op.index, "index")?)?;
            let value = required(&op.value, "value")?;
            if i == list.len() {
                list.push(value);
            } else {
                list[i] = value;
            }
            None
        }
        ListOpKind::Trim => {
            let r = span(len, required(&op.index, "index")?, op.count);
            let removed = len - r.len();
            list = list.drain(r).collect();
            Some(Value::Int(removed as i64))
        }
        ListOpKind::Get => {
            let i = element(len, required(&op.index, "index")?)?;
            Some(list[i].clone())
        }
        ListOpKind::GetRange => {
            let r = span(len, required(&op.index, "index")?, op.count);
            Some(Value::List(list[r].to_vec()))
        }
        ListOpKind::Size => Some(Value::Int(len as i64)),
    };

    bins.insert(op.bin.clone(), Value::List(list));
    Ok(result)
}

fn map_key(key: &Value) -> EvalResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        other => Err(invalid(format!("unsupported map key type {}", other.kind()))),
    }
}

fn in_range(value: &Value, begin: &Value, end: &Value) -> bool {
    (begin.is_nil() || cmp_values(value, begin) != Ordering::Less)
        && (end.is_nil() || cmp_values(value, end) == Ordering::Less)
}

/// Indexes (in key order) of the entries sorted by value.
fn rank_order(map: &BTreeMap<String, Value>) -> Vec<usize> {
    let values: Vec<&Value> = map.values().collect();
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| cmp_values(values[*a], values[*b]));
    order
}

/// Entries selected by a map read/remove operation, as key-order indexes.
fn select(map: &BTreeMap<String, Value>, op: &MapOperation) -> EvalResult<Vec<usize>> {
    let keys: Vec<&String> = map.keys().collect();
    let values: Vec<&Value> = map.values().collect();
    let matching = |pred: &dyn Fn(usize) -> bool| -> Vec<usize> {
        (0..keys.len()).filter(|i| pred(*i)).collect()
    };

    let selected: Vec<usize> = match op.op {
        MapOpKind::RemoveByKey | MapOpKind::GetByKey => {
            let key = map_key(&required(&op.key, "key")?)?;
            keys.iter().position(|k| **k == key).into_iter().collect()
        }
        MapOpKind::RemoveByKeyList => {
            let wanted = items(required(&op.key, "key")?)?
                .iter()
                .map(map_key)
                .collect::<EvalResult<Vec<_>>>()?;
            matching(&|i| wanted.contains(keys[i]))
        }
        MapOpKind::RemoveByKeyRange | MapOpKind::GetByKeyRange => {
            let begin = required(&op.begin, "begin")?;
            let end = required(&op.end, "end")?;
            matching(&|i| in_range(&Value::String(keys[i].clone()), &begin, &end))
        }
        MapOpKind::RemoveByValue | MapOpKind::GetByValue => {
            let value = required(&op.value, "value")?;
            matching(&|i| cmp_values(values[i], &value) == Ordering::Equal)
        }
        MapOpKind::RemoveByValueList => {
            let wanted = items(required(&op.value, "value")?)?;
            matching(&|i| wanted.iter().any(|w| cmp_values(values[i], w) == Ordering::Equal))
        }
        MapOpKind::RemoveByValueRange | MapOpKind::GetByValueRange => {
            let begin = required(&op.begin, "begin")?;
            let end = required(&op.end, "end")?;
            matching(&|i| in_range(values[i], &begin, &end))
        }
        MapOpKind::RemoveByIndex | MapOpKind::GetByIndex => {
            match element(keys.len(), required(&op.index, "index")?) {
                Ok(i) => vec![i],
                Err(_) => Vec::new(),
            }
        }
        MapOpKind::RemoveByIndexRange | MapOpKind::GetByIndexRange => {
            span(keys.len(), required(&op.index, "index")?, op.count).collect()
        }
        MapOpKind::RemoveByRank | MapOpKind::GetByRank => {
            let order = rank_order(map);
            match element(order.len(), required(&op.rank, "rank")?) {
                Ok(r) => vec![order[r]],
                Err(_) => Vec::new(),
            }
        }
        MapOpKind::RemoveByRankRange | MapOpKind::GetByRankRange => {
            let order = rank_order(map);
            order[span(order.len(), required(&op.rank, "rank")?, op.count)].to_vec()
        }
        _ => return Err(invalid("operation does not select entries")),
    };
    Ok(selected)
}

/// Whether the operation addresses at most one entry.
fn single(kind: MapOpKind) -> bool {
    matches!(
        kind,
        MapOpKind::RemoveByKey
            | MapOpKind::GetByKey
            | MapOpKind::RemoveByIndex
            | MapOpKind::GetByIndex
            | MapOpKind::RemoveByRank
            | MapOpKind::GetByRank
    )
}

fn render(
    map: &BTreeMap<String, Value>,
    selected: &[usize],
    return_type: MapReturnType,
    single: bool,
) -> Option<Value> {
    let len = map.len();
    let entries: Vec<(&String, &Value)> = map.iter().collect();
    let mut rank_of = vec![0; len];
    for (rank, idx) in rank_order(map).into_iter().enumerate() {
        rank_of[idx] = rank;
    }

    let each = |f: &dyn Fn(usize) -> Value| -> Value {
        let mut values: Vec<Value> = selected.iter().map(|i| f(*i)).collect();
        match (single, values.len()) {
            (true, 0) => Value::Nil,
            (true, _) => values.remove(0),
            _ => Value::List(values),
        }
    };

    let value = match return_type {
        MapReturnType::None => return None,
        MapReturnType::Count => Value::Int(selected.len() as i64),
        MapReturnType::Index => each(&|i| Value::Int(i as i64)),
        MapReturnType::ReverseIndex => each(&|i| Value::Int((len - 1 - i) as i64)),
        MapReturnType::Rank => each(&|i| Value::Int(rank_of[i] as i64)),
        MapReturnType::ReverseRank => each(&|i| Value::Int((len - 1 - rank_of[i]) as i64)),
        MapReturnType::Key => each(&|i| Value::String(entries[i].0.clone())),
        MapReturnType::Value => each(&|i| entries[i].1.clone()),
        MapReturnType::KeyValue => Value::Map(
            selected
                .iter()
                .map(|i| (entries[*i].0.clone(), entries[*i].1.clone()))
                .collect(),
        ),
    };
    Some(value)
}

fn map_put(
    map: &mut BTreeMap<String, Value>,
    key: String,
    value: Value,
    op: &MapOperation,
) -> EvalResult<()> {
    let mode = op.policy.and_then(|p| p.write_mode);
    match (mode, map.contains_key(&key)) {
        (Some(MapWriteMode::UpdateOnly), false) => Err(AerospikeError::new(
            Status::ERR_ELEMENT_NOT_FOUND,
            format!("map key '{}' not found", key),
        )),
        (Some(MapWriteMode::CreateOnly), true) => Err(AerospikeError::new(
            Status::ERR_ELEMENT_EXISTS,
            format!("map key '{}' exists", key),
        )),
        _ => {
            map.insert(key, value);
            Ok(())
        }
    }
}

fn map(bins: &mut Bins, op: &MapOperation) -> EvalResult<Option<Value>> {
    let (mut map, existed) = match bins.remove(&op.bin) {
        None => (BTreeMap::new(), false),
        Some(Value::Map(map)) => (map, true),
        Some(_) => return Err(incompatible(&op.bin)),
    };
    if !existed && !op.op.is_write() {
        return Ok(Some(Value::Nil));
    }

    let result = match op.op {
        MapOpKind::SetPolicy => None,
        MapOpKind::Put => {
            let key = map_key(&required(&op.key, "key")?)?;
            map_put(&mut map, key, required(&op.value, "value")?, op)?;
            Some(Value::Int(map.len() as i64))
        }
        MapOpKind::PutItems => {
            let Value::Map(entries) = required(&op.value, "value")? else {
                return Err(invalid("put_items expects a map"));
            };
            for (key, value) in entries {
                map_put(&mut map, key, value, op)?;
            }
            Some(Value::Int(map.len() as i64))
        }
        MapOpKind::Increment | MapOpKind::Decrement => {
            let key = map_key(&required(&op.key, "key")?)?;
            let delta = required(&op.value, "value")?;
            let negate = op.op == MapOpKind::Decrement;
            let next = match (map.get(&key), delta) {
                (None, Value::Int(d)) if negate => Value::Int(
                    d.checked_neg()
                        .ok_or_else(|| invalid(format!("cannot negate {}", d)))?,
                ),
                (None, Value::Int(d)) => Value::Int(d),
                (None, Value::Float(d)) => Value::Float(if negate { -d } else { d }),
                (Some(Value::Int(v)), Value::Int(d)) => {
                    Value::Int(if negate { v.wrapping_sub(d) } else { v.wrapping_add(d) })
                }
                (Some(Value::Float(v)), Value::Float(d)) => {
                    Value::Float(if negate { v - d } else { v + d })
                }
                _ => return Err(incompatible(&op.bin)),
            };
            map_put(&mut map, key, next.clone(), op)?;
            Some(next)
        }
        MapOpKind::Clear => {
            map.clear();
            None
        }
        MapOpKind::Size => Some(Value::Int(map.len() as i64)),
        kind if kind.is_write() => {
            let selected = select(&map, op)?;
            let return_type = op.return_type.unwrap_or(MapReturnType::None);
            let result = render(&map, &selected, return_type, single(kind));
            let doomed: Vec<String> = map
                .keys()
                .enumerate()
                .filter(|(i, _)| selected.contains(i))
                .map(|(_, k)| k.clone())
                .collect();
            for key in doomed {
                map.remove(&key);
            }
            result
        }
        kind => {
            let selected = select(&map, op)?;
            let return_type = op
                .return_type
                .ok_or_else(|| invalid("map read requires a return type"))?;
            render(&map, &selected, return_type, single(kind))
        }
    };

    bins.insert(op.bin.clone(), Value::Map(map));
    Ok(result)
}
