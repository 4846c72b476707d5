//! Flattening and unflattening between nested values and flat arrays.
//!
//! Depth-first traversal in key insertion order at every level. The
//! flat-key set produced from a description is fixed for that
//! description and reused for every conforming value, so packing and
//! unpacking agree on layout by construction.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::SpaceError;
use crate::space::{Shape, SpaceDesc};
use crate::value::Value;

/// An ordered key path from the root of a nested mapping to one leaf.
///
/// A bare leaf at the root flattens to a single empty path.
pub type FlatKey = SmallVec<[String; 4]>;

/// Helpers for [`FlatKey`] paths.
pub mod flat_key {
    use super::FlatKey;

    /// Render a path for error messages: `"inv/gold"`, or `"<root>"`
    /// for the empty path.
    pub fn display(key: &FlatKey) -> String {
        if key.is_empty() {
            "<root>".to_string()
        } else {
            key.join("/")
        }
    }
}

/// One leaf's values gathered across every row of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafColumn {
    /// Per-row shape of this leaf.
    pub shape: Shape,
    /// `rows * shape.product()` elements, row-major.
    pub data: Vec<f32>,
}

/// Flatten a space description into its ordered leaf descriptors.
pub fn flatten(desc: &SpaceDesc) -> IndexMap<FlatKey, &SpaceDesc> {
    let mut out = IndexMap::new();
    collect_desc(desc, FlatKey::new(), &mut out);
    out
}

fn collect_desc<'a>(
    desc: &'a SpaceDesc,
    prefix: FlatKey,
    out: &mut IndexMap<FlatKey, &'a SpaceDesc>,
) {
    match desc {
        SpaceDesc::Dict(entries) => {
            for (k, v) in entries {
                let mut key = prefix.clone();
                key.push(k.clone());
                collect_desc(v, key, out);
            }
        }
        leaf => {
            out.insert(prefix, leaf);
        }
    }
}

/// Flatten a nested value into its ordered leaf arrays.
pub fn flatten_value(value: &Value) -> IndexMap<FlatKey, &Value> {
    let mut out = IndexMap::new();
    collect_value(value, FlatKey::new(), &mut out);
    out
}

fn collect_value<'a>(value: &'a Value, prefix: FlatKey, out: &mut IndexMap<FlatKey, &'a Value>) {
    match value {
        Value::Dict(entries) => {
            for (k, v) in entries {
                let mut key = prefix.clone();
                key.push(k.clone());
                collect_value(v, key, out);
            }
        }
        leaf => {
            out.insert(prefix, leaf);
        }
    }
}

/// Concatenate a value's leaf arrays into a 1-D array in flat-key
/// order, without validating against a description.
///
/// This is the hot-path packing used by the emulation wrapper after a
/// feature parser may have reshaped observations; validation against a
/// declared description is [`flatten_to_array`]'s job.
pub fn ravel(value: &Value) -> Vec<f32> {
    let mut out = Vec::new();
    ravel_into(value, &mut out);
    out
}

fn ravel_into(value: &Value, out: &mut Vec<f32>) {
    match value {
        Value::Dict(entries) => {
            for v in entries.values() {
                ravel_into(v, out);
            }
        }
        Value::Array { data, .. } => out.extend_from_slice(data),
    }
}

/// Pack a conforming value into a 1-D array in flat-key order,
/// validating it against its description.
///
/// # Errors
///
/// - [`SpaceError::StructureMismatch`] if the value's key structure
///   differs from the description's (missing, extra, or reordered keys,
///   or a mapping where a leaf is declared and vice versa).
/// - [`SpaceError::LeafShapeMismatch`] if a leaf array's element count
///   differs from the declared leaf size.
pub fn flatten_to_array(value: &Value, desc: &SpaceDesc) -> Result<Vec<f32>, SpaceError> {
    let mut out = Vec::with_capacity(desc.flat_len());
    pack_into(value, desc, FlatKey::new(), &mut out)?;
    Ok(out)
}

fn pack_into(
    value: &Value,
    desc: &SpaceDesc,
    path: FlatKey,
    out: &mut Vec<f32>,
) -> Result<(), SpaceError> {
    match (desc, value) {
        (SpaceDesc::Dict(desc_entries), Value::Dict(value_entries)) => {
            if desc_entries.len() != value_entries.len() {
                return Err(SpaceError::StructureMismatch {
                    path: flat_key::display(&path),
                    reason: format!(
                        "description has {} keys, value has {}",
                        desc_entries.len(),
                        value_entries.len()
                    ),
                });
            }
            for (k, sub_desc) in desc_entries {
                let sub_value =
                    value_entries
                        .get(k)
                        .ok_or_else(|| SpaceError::StructureMismatch {
                            path: flat_key::display(&path),
                            reason: format!("value is missing key '{k}'"),
                        })?;
                let mut sub_path = path.clone();
                sub_path.push(k.clone());
                pack_into(sub_value, sub_desc, sub_path, out)?;
            }
            Ok(())
        }
        (leaf_desc, Value::Array { data, .. }) if leaf_desc.is_leaf() => {
            let expected = leaf_desc.leaf_len();
            if data.len() != expected {
                return Err(SpaceError::LeafShapeMismatch {
                    path: flat_key::display(&path),
                    expected,
                    got: data.len(),
                });
            }
            out.extend_from_slice(data);
            Ok(())
        }
        // Only a Dict description reaches here: the guarded leaf arm
        // above has already taken every leaf/array pairing.
        (_, Value::Array { .. }) => Err(SpaceError::StructureMismatch {
            path: flat_key::display(&path),
            reason: "description declares a mapping, value is a leaf array".into(),
        }),
        (_, Value::Dict(_)) => Err(SpaceError::StructureMismatch {
            path: flat_key::display(&path),
            reason: "description declares a leaf, value is a mapping".into(),
        }),
    }
}

/// Rebuild a nested value from a description and a flat array,
/// consuming leaf-sized slices in flat-key order.
///
/// Exact inverse of [`flatten_to_array`] for any conforming value.
///
/// # Errors
///
/// Returns [`SpaceError::LengthMismatch`] if the array's length is not
/// exactly [`SpaceDesc::flat_len`].
pub fn unflatten(flat: &[f32], desc: &SpaceDesc) -> Result<Value, SpaceError> {
    let expected = desc.flat_len();
    if flat.len() != expected {
        return Err(SpaceError::LengthMismatch {
            expected,
            got: flat.len(),
        });
    }
    let mut cursor = 0;
    Ok(consume(flat, desc, &mut cursor))
}

fn consume(flat: &[f32], desc: &SpaceDesc, cursor: &mut usize) -> Value {
    match desc {
        SpaceDesc::Dict(entries) => Value::Dict(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), consume(flat, v, cursor)))
                .collect(),
        ),
        leaf => {
            let len = leaf.leaf_len();
            let data = flat[*cursor..*cursor + len].to_vec();
            *cursor += len;
            let shape: Shape = match leaf {
                SpaceDesc::Box { shape, .. } => shape.clone(),
                _ => smallvec::smallvec![len],
            };
            Value::Array { data, shape }
        }
    }
}

/// Split a row-major batch of flat observations back into per-leaf
/// columns: for every flat key, the slice of each row belonging to
/// that leaf, concatenated across rows.
///
/// Structured policy networks consume this to address individual
/// observation components of a packed batch.
///
/// # Errors
///
/// Returns [`SpaceError::LengthMismatch`] if `data.len()` is not
/// `rows * desc.flat_len()`.
pub fn unpack_batched(
    data: &[f32],
    rows: usize,
    desc: &SpaceDesc,
) -> Result<IndexMap<FlatKey, LeafColumn>, SpaceError> {
    let row_len = desc.flat_len();
    if data.len() != rows * row_len {
        return Err(SpaceError::LengthMismatch {
            expected: rows * row_len,
            got: data.len(),
        });
    }

    let mut out = IndexMap::new();
    let mut offset = 0;
    for (key, leaf) in flatten(desc) {
        let len = leaf.leaf_len();
        let shape: Shape = match leaf {
            SpaceDesc::Box { shape, .. } => shape.clone(),
            _ => smallvec::smallvec![len],
        };
        let mut column = Vec::with_capacity(rows * len);
        for row in 0..rows {
            let start = row * row_len + offset;
            column.extend_from_slice(&data[start..start + len]);
        }
        out.insert(key, LeafColumn {
            shape,
            data: column,
        });
        offset += len;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_desc() -> SpaceDesc {
        SpaceDesc::dict([
            ("pos", SpaceDesc::boxed([2usize])),
            (
                "inv",
                SpaceDesc::dict([("gold", SpaceDesc::boxed([1usize]))]),
            ),
        ])
    }

    fn sample_value() -> Value {
        Value::dict([
            ("pos", Value::array([1.0, 2.0])),
            ("inv", Value::dict([("gold", Value::scalar(5.0))])),
        ])
    }

    #[test]
    fn flat_keys_in_traversal_order() {
        let keys: Vec<String> = flatten(&sample_desc())
            .keys()
            .map(flat_key::display)
            .collect();
        assert_eq!(keys, vec!["pos", "inv/gold"]);
    }

    #[test]
    fn bare_leaf_flattens_to_root_key() {
        let desc = SpaceDesc::boxed([3usize]);
        let flat = flatten(&desc);
        assert_eq!(flat.len(), 1);
        assert!(flat.keys().next().unwrap().is_empty());
    }

    #[test]
    fn example_round_trip() {
        // {"pos": [1, 2], "inv": {"gold": 5}} flattens to [1, 2, 5].
        let flat = flatten_to_array(&sample_value(), &sample_desc()).unwrap();
        assert_eq!(flat, vec![1.0, 2.0, 5.0]);

        let back = unflatten(&flat, &sample_desc()).unwrap();
        assert_eq!(back, sample_value());
    }

    #[test]
    fn flat_length_matches_description() {
        let desc = sample_desc();
        let flat = flatten_to_array(&sample_value(), &desc).unwrap();
        assert_eq!(flat.len(), desc.flat_len());
    }

    #[test]
    fn empty_mapping_is_valid() {
        let desc = SpaceDesc::Dict(IndexMap::new());
        let value = Value::Dict(IndexMap::new());
        assert!(flatten(&desc).is_empty());
        assert_eq!(flatten_to_array(&value, &desc).unwrap(), Vec::<f32>::new());
        assert_eq!(unflatten(&[], &desc).unwrap(), value);
    }

    #[test]
    fn missing_key_is_structure_mismatch() {
        let value = Value::dict([("pos", Value::array([1.0, 2.0]))]);
        let err = flatten_to_array(&value, &sample_desc()).unwrap_err();
        assert!(matches!(err, SpaceError::StructureMismatch { .. }));
    }

    #[test]
    fn leaf_where_mapping_expected_is_structure_mismatch() {
        let value = Value::dict([
            ("pos", Value::array([1.0, 2.0])),
            ("inv", Value::scalar(5.0)),
        ]);
        let err = flatten_to_array(&value, &sample_desc()).unwrap_err();
        match err {
            SpaceError::StructureMismatch { path, .. } => assert_eq!(path, "inv"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wrong_leaf_size_reports_path() {
        let value = Value::dict([
            ("pos", Value::array([1.0, 2.0, 3.0])),
            ("inv", Value::dict([("gold", Value::scalar(5.0))])),
        ]);
        let err = flatten_to_array(&value, &sample_desc()).unwrap_err();
        assert_eq!(
            err,
            SpaceError::LeafShapeMismatch {
                path: "pos".into(),
                expected: 2,
                got: 3
            }
        );
    }

    #[test]
    fn unflatten_rejects_wrong_length() {
        let err = unflatten(&[1.0, 2.0], &sample_desc()).unwrap_err();
        assert_eq!(
            err,
            SpaceError::LengthMismatch {
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn unpack_batched_splits_columns() {
        let desc = sample_desc();
        // Two rows: [1,2,5] and [10,20,50].
        let data = [1.0, 2.0, 5.0, 10.0, 20.0, 50.0];
        let cols = unpack_batched(&data, 2, &desc).unwrap();
        assert_eq!(cols.len(), 2);

        let pos: FlatKey = smallvec::smallvec!["pos".to_string()];
        assert_eq!(cols[&pos].data, vec![1.0, 2.0, 10.0, 20.0]);

        let gold: FlatKey = smallvec::smallvec!["inv".to_string(), "gold".to_string()];
        assert_eq!(cols[&gold].data, vec![5.0, 50.0]);
    }

    #[test]
    fn unpack_batched_rejects_wrong_length() {
        let err = unpack_batched(&[1.0, 2.0], 2, &sample_desc()).unwrap_err();
        assert!(matches!(err, SpaceError::LengthMismatch { .. }));
    }

    // ── Property tests ────────────────────────────────────────

    fn arb_space() -> impl Strategy<Value = SpaceDesc> {
        let leaf = prop_oneof![
            (1usize..5).prop_map(|n| SpaceDesc::boxed([n])),
            (1usize..4, 1usize..4).prop_map(|(a, b)| SpaceDesc::boxed([a, b])),
            (1u32..8).prop_map(|n| SpaceDesc::Discrete { n }),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            proptest::collection::vec(inner, 0..4).prop_map(|children| {
                SpaceDesc::Dict(
                    children
                        .into_iter()
                        .enumerate()
                        .map(|(i, c)| (format!("k{i}"), c))
                        .collect(),
                )
            })
        })
    }

    fn arb_space_and_flat() -> impl Strategy<Value = (SpaceDesc, Vec<f32>)> {
        arb_space().prop_flat_map(|desc| {
            let len = desc.flat_len();
            (
                Just(desc),
                proptest::collection::vec(-100.0f32..100.0, len..=len),
            )
        })
    }

    proptest! {
        #[test]
        fn round_trip_is_exact((desc, flat) in arb_space_and_flat()) {
            let value = unflatten(&flat, &desc).unwrap();
            let packed = flatten_to_array(&value, &desc).unwrap();
            prop_assert_eq!(packed, flat);
        }

        #[test]
        fn flat_size_invariant((desc, flat) in arb_space_and_flat()) {
            let value = unflatten(&flat, &desc).unwrap();
            let packed = flatten_to_array(&value, &desc).unwrap();
            prop_assert_eq!(packed.len(), desc.flat_len());
        }

        #[test]
        fn value_leaf_count_matches_description((desc, flat) in arb_space_and_flat()) {
            let value = unflatten(&flat, &desc).unwrap();
            prop_assert_eq!(flatten_value(&value).len(), flatten(&desc).len());
        }
    }
}
