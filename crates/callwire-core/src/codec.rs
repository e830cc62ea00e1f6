//! Typed value codec.
//!
//! Splits an [`RpcValue`] into a JSON-safe payload and a [`Meta`] record of
//! the positions whose type plain JSON would lose. The metadata travels next
//! to the payload and is meaningless without it:
//!
//! ```text
//! value: { at: Date(2024-03-01T12:00:00Z), tags: Set["a"] }
//! json:  { "at": "2024-03-01T12:00:00Z", "tags": ["a"] }
//! meta:  { "values": { "at": "Date", "tags": "set" } }
//! ```
//!
//! Paths join object keys and array indexes with `.`; a literal `.` or `\`
//! inside a key is escaped with `\`. The annotation of the top-level value
//! itself is stored under `root`. When nothing needed annotating there is no
//! metadata at all, and decoding without metadata takes the JSON as final.

use crate::config::RpcConfig;
use crate::value::RpcValue;
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while converting values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The value cannot be represented on the wire.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// A value had a different type than the receiving side expected.
    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    /// Payload and metadata disagree.
    #[error("Malformed payload at {path:?}: {message}")]
    Malformed { path: String, message: String },

    /// The metadata itself could not be parsed.
    #[error("Invalid codec metadata: {message}")]
    InvalidMeta { message: String },
}

/// How a JSON position has to be turned back into its original type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    /// `null` standing in for an absent value.
    #[serde(rename = "undefined")]
    Undefined,
    /// Decimal string holding a 128-bit integer.
    #[serde(rename = "bigint")]
    BigInt,
    /// RFC 3339 string holding an instant.
    #[serde(rename = "Date")]
    Date,
    /// `"NaN"`, `"Infinity"` or `"-Infinity"`.
    #[serde(rename = "number")]
    Number,
    /// Array holding the members of a set.
    #[serde(rename = "set")]
    Set,
    /// Array of `[key, value]` pairs.
    #[serde(rename = "map")]
    Map,
}

/// Codec metadata for one encoded value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<TypeTag>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, TypeTag>,
}

impl Meta {
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.values.is_empty()
    }

    /// Parse metadata received as untyped JSON. `null` means no metadata.
    pub fn from_json(json: &JsonValue) -> Result<Option<Meta>, CodecError> {
        if json.is_null() {
            return Ok(None);
        }
        Meta::deserialize(json)
            .map(Some)
            .map_err(|e| CodecError::InvalidMeta {
                message: e.to_string(),
            })
    }
}

/// A JSON payload plus the metadata needed to decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub json: JsonValue,
    pub meta: Option<Meta>,
}

/// Encode a value into JSON plus metadata.
///
/// Fails with [`CodecError::Serialization`] for values the wire cannot carry
/// (dates outside the years 0 through 9999, nesting deeper than
/// [`RpcConfig::MAX_NESTING_DEPTH`]).
pub fn encode(value: &RpcValue) -> Result<Encoded, CodecError> {
    let mut meta = Meta::default();
    let mut path = Vec::new();
    let json = encode_at(value, &mut path, &mut meta)?;
    Ok(Encoded {
        json,
        meta: if meta.is_empty() { None } else { Some(meta) },
    })
}

fn annotate(path: &[String], tag: TypeTag, meta: &mut Meta) {
    if path.is_empty() {
        meta.root = Some(tag);
    } else {
        meta.values.insert(join_path(path), tag);
    }
}

fn encode_children<'a>(
    items: impl Iterator<Item = &'a RpcValue>,
    path: &mut Vec<String>,
    meta: &mut Meta,
) -> Result<Vec<JsonValue>, CodecError> {
    items
        .enumerate()
        .map(|(index, item)| {
            path.push(index.to_string());
            let json = encode_at(item, path, meta);
            path.pop();
            json
        })
        .collect()
}

fn encode_at(
    value: &RpcValue,
    path: &mut Vec<String>,
    meta: &mut Meta,
) -> Result<JsonValue, CodecError> {
    if path.len() > RpcConfig::MAX_NESTING_DEPTH {
        return Err(CodecError::Serialization {
            message: format!("value nested deeper than {} levels", RpcConfig::MAX_NESTING_DEPTH),
        });
    }
    let json = match value {
        RpcValue::Undefined => {
            annotate(path, TypeTag::Undefined, meta);
            JsonValue::Null
        }
        RpcValue::Null => JsonValue::Null,
        RpcValue::Bool(b) => JsonValue::Bool(*b),
        RpcValue::Integer(i) => JsonValue::from(*i),
        RpcValue::Float(f) => match serde_json::Number::from_f64(*f) {
            Some(n) => JsonValue::Number(n),
            None => {
                annotate(path, TypeTag::Number, meta);
                JsonValue::String(non_finite_name(*f).to_string())
            }
        },
        RpcValue::BigInt(i) => {
            annotate(path, TypeTag::BigInt, meta);
            JsonValue::String(i.to_string())
        }
        RpcValue::String(s) => JsonValue::String(s.clone()),
        RpcValue::Date(d) => {
            if !(0..=9999).contains(&d.year()) {
                return Err(CodecError::Serialization {
                    message: format!("date {} is outside the years 0-9999", d),
                });
            }
            annotate(path, TypeTag::Date, meta);
            JsonValue::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        RpcValue::Array(items) => JsonValue::Array(encode_children(items.iter(), path, meta)?),
        RpcValue::Set(items) => {
            annotate(path, TypeTag::Set, meta);
            JsonValue::Array(encode_children(items.iter(), path, meta)?)
        }
        RpcValue::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                path.push(key.clone());
                let json = encode_at(item, path, meta);
                path.pop();
                out.insert(key.clone(), json?);
            }
            JsonValue::Object(out)
        }
        RpcValue::Map(entries) => {
            annotate(path, TypeTag::Map, meta);
            let mut pairs = Vec::with_capacity(entries.len());
            for (index, (key, item)) in entries.iter().enumerate() {
                path.push(index.to_string());
                let pair = encode_children([key, item].into_iter(), path, meta);
                path.pop();
                pairs.push(JsonValue::Array(pair?));
            }
            JsonValue::Array(pairs)
        }
    };
    Ok(json)
}

fn non_finite_name(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Annotations arranged along the shape of the payload.
#[derive(Debug, Default)]
struct TagTree {
    tag: Option<TypeTag>,
    children: BTreeMap<String, TagTree>,
}

impl TagTree {
    fn from_meta(meta: &Meta) -> Result<Self, CodecError> {
        let mut tree = TagTree {
            tag: meta.root,
            children: BTreeMap::new(),
        };
        for (path, tag) in &meta.values {
            let mut node = &mut tree;
            for segment in split_path(path)? {
                node = node.children.entry(segment).or_default();
            }
            node.tag = Some(*tag);
        }
        Ok(tree)
    }
}

/// Decode a payload produced by [`encode`].
///
/// `meta == None` means the JSON is already in its final form.
pub fn decode(json: JsonValue, meta: Option<&Meta>) -> Result<RpcValue, CodecError> {
    match meta {
        None => Ok(RpcValue::from(json)),
        Some(meta) => {
            let tree = TagTree::from_meta(meta)?;
            decode_at(json, &tree, &mut Vec::new())
        }
    }
}

fn malformed(path: &[String], message: impl Into<String>) -> CodecError {
    CodecError::Malformed {
        path: join_path(path),
        message: message.into(),
    }
}

fn decode_at(json: JsonValue, node: &TagTree, path: &mut Vec<String>) -> Result<RpcValue, CodecError> {
    let value = match json {
        JsonValue::Array(items) => {
            if let Some(stray) = node
                .children
                .keys()
                .find(|key| key.parse::<usize>().map_or(true, |i| i >= items.len() || i.to_string() != **key))
            {
                path.push(stray.clone());
                return Err(malformed(path, "annotated position does not exist"));
            }
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let key = index.to_string();
                out.push(match node.children.get(&key) {
                    Some(child) => {
                        path.push(key);
                        let decoded = decode_at(item, child, path);
                        path.pop();
                        decoded?
                    }
                    None => RpcValue::from(item),
                });
            }
            RpcValue::Array(out)
        }
        JsonValue::Object(map) => {
            if let Some(stray) = node.children.keys().find(|key| !map.contains_key(*key)) {
                path.push(stray.clone());
                return Err(malformed(path, "annotated position does not exist"));
            }
            let mut out = BTreeMap::new();
            for (key, item) in map {
                let decoded = match node.children.get(&key) {
                    Some(child) => {
                        path.push(key.clone());
                        let decoded = decode_at(item, child, path);
                        path.pop();
                        decoded?
                    }
                    None => RpcValue::from(item),
                };
                out.insert(key, decoded);
            }
            RpcValue::Object(out)
        }
        scalar => {
            if let Some(stray) = node.children.keys().next() {
                path.push(stray.clone());
                return Err(malformed(path, "annotated position does not exist"));
            }
            RpcValue::from(scalar)
        }
    };

    match node.tag {
        None => Ok(value),
        Some(tag) => restore(tag, value, path),
    }
}

fn restore(tag: TypeTag, value: RpcValue, path: &[String]) -> Result<RpcValue, CodecError> {
    match (tag, value) {
        (TypeTag::Undefined, RpcValue::Null) => Ok(RpcValue::Undefined),
        (TypeTag::BigInt, RpcValue::String(s)) => s
            .parse::<i128>()
            .map(RpcValue::BigInt)
            .map_err(|e| malformed(path, format!("invalid bigint {:?}: {}", s, e))),
        (TypeTag::Date, RpcValue::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|d| RpcValue::Date(d.with_timezone(&Utc)))
            .map_err(|e| malformed(path, format!("invalid date {:?}: {}", s, e))),
        (TypeTag::Number, RpcValue::String(s)) => match s.as_str() {
            "NaN" => Ok(RpcValue::Float(f64::NAN)),
            "Infinity" => Ok(RpcValue::Float(f64::INFINITY)),
            "-Infinity" => Ok(RpcValue::Float(f64::NEG_INFINITY)),
            other => Err(malformed(path, format!("invalid number {:?}", other))),
        },
        (TypeTag::Set, RpcValue::Array(items)) => Ok(RpcValue::Set(items)),
        (TypeTag::Map, RpcValue::Array(pairs)) => pairs
            .into_iter()
            .map(|pair| match pair {
                RpcValue::Array(kv) if kv.len() == 2 => {
                    let mut kv = kv.into_iter();
                    match (kv.next(), kv.next()) {
                        (Some(k), Some(v)) => Ok((k, v)),
                        _ => Err(malformed(path, "map entry is not a [key, value] pair")),
                    }
                }
                _ => Err(malformed(path, "map entry is not a [key, value] pair")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RpcValue::Map),
        (tag, value) => Err(malformed(
            path,
            format!("{:?} annotation on a {} value", tag, value.type_name()),
        )),
    }
}

// ============================================================================
// Paths
// ============================================================================

fn join_path(segments: &[String]) -> String {
    segments
        .iter()
        .map(|segment| segment.replace('\\', "\\\\").replace('.', "\\."))
        .collect::<Vec<_>>()
        .join(".")
}

fn split_path(path: &str) -> Result<Vec<String>, CodecError> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('\\' | '.')) => current.push(escaped),
                _ => {
                    return Err(CodecError::InvalidMeta {
                        message: format!("invalid escape in path {:?}", path),
                    })
                }
            },
            '.' => {
                // no path may describe a position deeper than a payload can be
                if segments.len() + 1 >= RpcConfig::MAX_NESTING_DEPTH {
                    return Err(CodecError::InvalidMeta {
                        message: format!(
                            "path has more than {} segments",
                            RpcConfig::MAX_NESTING_DEPTH
                        ),
                    });
                }
                segments.push(std::mem::take(&mut current))
            }
            other => current.push(other),
        }
    }
    segments.push(current);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    fn roundtrip(value: &RpcValue) -> RpcValue {
        let encoded = encode(value).unwrap();
        // go through text, as the wire does
        let text = serde_json::to_string(&encoded.json).unwrap();
        let meta_text = serde_json::to_string(&encoded.meta).unwrap();
        let json: JsonValue = serde_json::from_str(&text).unwrap();
        let meta: Option<Meta> = serde_json::from_str(&meta_text).unwrap();
        decode(json, meta.as_ref()).unwrap()
    }

    fn sample_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
            + chrono::Duration::nanoseconds(123_456_789)
    }

    #[test]
    fn test_plain_values_need_no_meta() {
        let value = RpcValue::Array(vec![
            RpcValue::from("hi"),
            RpcValue::Integer(-3),
            RpcValue::Float(2.5),
            RpcValue::Bool(true),
            RpcValue::Null,
            RpcValue::object([("nested", RpcValue::from("x"))]),
        ]);
        let encoded = encode(&value).unwrap();
        assert!(encoded.meta.is_none());
        assert_eq!(encoded.json, json!(["hi", -3, 2.5, true, null, {"nested": "x"}]));
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_date_roundtrip_keeps_instant() {
        let value = RpcValue::object([("message", RpcValue::Date(sample_date()))]);
        let encoded = encode(&value).unwrap();
        assert_eq!(
            encoded.json,
            json!({"message": "2024-03-01T12:30:05.123456789Z"})
        );
        let meta = encoded.meta.clone().unwrap();
        assert_eq!(meta.values.get("message"), Some(&TypeTag::Date));
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_root_annotation() {
        let value = RpcValue::Date(sample_date());
        let encoded = encode(&value).unwrap();
        let meta = encoded.meta.clone().unwrap();
        assert_eq!(meta.root, Some(TypeTag::Date));
        assert!(meta.values.is_empty());
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            json!({"root": "Date"})
        );
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_special_numbers_and_undefined() {
        let value = RpcValue::Array(vec![
            RpcValue::Float(f64::NAN),
            RpcValue::Float(f64::INFINITY),
            RpcValue::Float(f64::NEG_INFINITY),
            RpcValue::Undefined,
            RpcValue::BigInt(-(1i128 << 100)),
            RpcValue::Float(3.0),
        ]);
        let encoded = encode(&value).unwrap();
        assert_eq!(encoded.json[0], json!("NaN"));
        assert_eq!(encoded.json[3], JsonValue::Null);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_sets_and_maps_with_rich_members() {
        let value = RpcValue::object([
            (
                "tags",
                RpcValue::Set(vec![RpcValue::from("a"), RpcValue::Date(sample_date())]),
            ),
            (
                "index",
                RpcValue::Map(vec![
                    (RpcValue::Date(sample_date()), RpcValue::BigInt(i128::MAX)),
                    (RpcValue::Integer(1), RpcValue::from("one")),
                ]),
            ),
        ]);
        let encoded = encode(&value).unwrap();
        let meta = encoded.meta.clone().unwrap();
        assert_eq!(meta.values.get("tags"), Some(&TypeTag::Set));
        assert_eq!(meta.values.get("tags.1"), Some(&TypeTag::Date));
        assert_eq!(meta.values.get("index"), Some(&TypeTag::Map));
        assert_eq!(meta.values.get("index.0.0"), Some(&TypeTag::Date));
        assert_eq!(meta.values.get("index.0.1"), Some(&TypeTag::BigInt));
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_keys_with_dots_are_escaped() {
        let value = RpcValue::object([
            ("a.b", RpcValue::Date(sample_date())),
            ("a\\", RpcValue::object([("", RpcValue::Undefined)])),
        ]);
        let encoded = encode(&value).unwrap();
        let meta = encoded.meta.clone().unwrap();
        assert!(meta.values.contains_key("a\\.b"));
        assert!(meta.values.contains_key("a\\\\."));
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_decode_without_meta_is_identity() {
        let json = json!({"message": "2024-03-01T12:30:05Z"});
        let value = decode(json, None).unwrap();
        assert_eq!(value.get("message"), Some(&RpcValue::from("2024-03-01T12:30:05Z")));
    }

    #[test]
    fn test_decode_rejects_missing_path() {
        let meta = Meta {
            root: None,
            values: [("missing".to_string(), TypeTag::Date)].into_iter().collect(),
        };
        let err = decode(json!({"present": 1}), Some(&meta)).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { ref path, .. } if path == "missing"));
    }

    #[test]
    fn test_decode_rejects_mismatched_tag() {
        let meta = Meta {
            root: None,
            values: [("0".to_string(), TypeTag::Date)].into_iter().collect(),
        };
        assert!(decode(json!([42]), Some(&meta)).is_err());
        assert!(decode(json!(["not a date"]), Some(&meta)).is_err());
    }

    #[test]
    fn test_meta_from_json() {
        assert_eq!(Meta::from_json(&JsonValue::Null).unwrap(), None);
        let meta = Meta::from_json(&json!({"values": {"0": "Date"}})).unwrap().unwrap();
        assert_eq!(meta.values.get("0"), Some(&TypeTag::Date));
        assert!(Meta::from_json(&json!({"values": {"0": "Regex"}})).is_err());
        assert!(Meta::from_json(&json!("nope")).is_err());
    }

    #[test]
    fn test_out_of_range_date_fails_to_encode() {
        let far = Utc.with_ymd_and_hms(10_000, 1, 1, 0, 0, 0).unwrap();
        let err = encode(&RpcValue::Date(far)).unwrap_err();
        assert!(matches!(err, CodecError::Serialization { .. }));
    }

    #[test]
    fn test_awkward_keys_and_boundaries() {
        let value = RpcValue::Array(vec![
            RpcValue::object([
                ("", RpcValue::Date(sample_date())),
                (".", RpcValue::BigInt(i128::from(i64::MAX) + 1)),
                ("\\", RpcValue::BigInt(i128::from(i64::MIN) - 1)),
                ("..\\.", RpcValue::BigInt(i128::from(u64::MAX))),
            ]),
            RpcValue::Map(vec![(
                RpcValue::Set(vec![RpcValue::Undefined, RpcValue::BigInt(i128::MIN)]),
                RpcValue::Set(vec![RpcValue::Map(vec![(
                    RpcValue::Float(f64::NAN),
                    RpcValue::object([("", RpcValue::Undefined)]),
                )])]),
            )]),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_deep_paths_rejected() {
        let meta = Meta {
            root: None,
            values: [(".".repeat(200_000), TypeTag::Date)].into_iter().collect(),
        };
        let err = decode(json!([]), Some(&meta)).unwrap_err();
        assert!(matches!(err, CodecError::InvalidMeta { .. }));

        let deepest = vec!["0"; RpcConfig::MAX_NESTING_DEPTH].join(".");
        assert_eq!(split_path(&deepest).unwrap().len(), RpcConfig::MAX_NESTING_DEPTH);
        assert!(split_path(&format!("{}.0", deepest)).is_err());
    }

    #[test]
    fn test_deep_values_fail_to_encode() {
        let mut value = RpcValue::Undefined;
        for _ in 0..=RpcConfig::MAX_NESTING_DEPTH {
            value = RpcValue::Array(vec![value]);
        }
        let err = encode(&value).unwrap_err();
        assert!(matches!(err, CodecError::Serialization { .. }));
    }

    fn key() -> impl Strategy<Value = String> {
        prop::collection::vec(prop_oneof![Just('a'), Just('.'), Just('\\'), Just('é')], 0..4)
            .prop_map(|chars| chars.into_iter().collect())
    }

    fn date() -> impl Strategy<Value = DateTime<Utc>> {
        // 0001-01-01 through 9999-12-31
        (-62_135_596_800i64..253_402_300_800, 0u32..1_000_000_000)
            .prop_map(|(secs, nanos)| DateTime::<Utc>::from_timestamp(secs, nanos).unwrap())
    }

    fn bigint() -> impl Strategy<Value = i128> {
        prop_oneof![
            any::<i128>(),
            Just(i128::from(i64::MAX) + 1),
            Just(i128::from(i64::MIN) - 1),
            Just(i128::from(u64::MAX)),
            Just(i128::from(u64::MAX) + 1),
        ]
    }

    fn rpc_value() -> impl Strategy<Value = RpcValue> {
        let leaf = prop_oneof![
            Just(RpcValue::Undefined),
            Just(RpcValue::Null),
            any::<bool>().prop_map(RpcValue::Bool),
            any::<i64>().prop_map(RpcValue::Integer),
            any::<f64>().prop_map(RpcValue::Float),
            Just(RpcValue::Float(f64::NAN)),
            Just(RpcValue::Float(f64::NEG_INFINITY)),
            bigint().prop_map(RpcValue::BigInt),
            any::<String>().prop_map(RpcValue::String),
            date().prop_map(RpcValue::Date),
        ];
        leaf.prop_recursive(4, 48, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(RpcValue::Array),
                prop::collection::vec(inner.clone(), 0..4).prop_map(RpcValue::Set),
                prop::collection::btree_map(key(), inner.clone(), 0..4).prop_map(RpcValue::Object),
                prop::collection::vec((inner.clone(), inner), 0..3).prop_map(RpcValue::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(value in rpc_value()) {
            prop_assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_path_split_join() {
        let segments = vec!["a.b".to_string(), "".to_string(), "c\\".to_string()];
        let joined = join_path(&segments);
        assert_eq!(joined, "a\\.b..c\\\\");
        assert_eq!(split_path(&joined).unwrap(), segments);
        assert!(split_path("bad\\x").is_err());
    }
}
