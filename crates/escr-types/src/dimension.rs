use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of hex characters kept from the BLAKE3 digest of a point.
const HASH_LENGTH: usize = 32;

/// A position in the dimension space, e.g. `{"language": "en", "market": "gb"}`.
///
/// Points serialize as a plain JSON object. The [`hash`](Self::hash) is derived
/// from the canonical (key-sorted) JSON form and is used as the storage key in
/// every per-dimension table.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct DimensionSpacePoint {
    coordinates: BTreeMap<String, String>,
    hash: String,
}

/// The point in which a node was originally created or varied into.
pub type OriginDimensionSpacePoint = DimensionSpacePoint;

impl DimensionSpacePoint {
    pub fn new<K, V>(coordinates: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::from(
            coordinates
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    /// The zero-dimensional point used for root nodes and dimensionless setups.
    pub fn empty() -> Self {
        Self::from(BTreeMap::new())
    }

    /// Parse a point from its JSON object form.
    pub fn from_json(json: &str) -> Result<Self, TypeError> {
        let coordinates: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Self::from(coordinates))
    }

    /// Canonical JSON form (keys sorted).
    pub fn to_json(&self) -> String {
        canonical_json(&self.coordinates)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn coordinates(&self) -> &BTreeMap<String, String> {
        &self.coordinates
    }

    pub fn coordinate(&self, dimension: &str) -> Option<&str> {
        self.coordinates.get(dimension).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

fn canonical_json(coordinates: &BTreeMap<String, String>) -> String {
    serde_json::to_string(coordinates).unwrap_or_else(|_| String::from("{}"))
}

impl From<BTreeMap<String, String>> for DimensionSpacePoint {
    fn from(coordinates: BTreeMap<String, String>) -> Self {
        let digest = blake3::hash(canonical_json(&coordinates).as_bytes());
        let hash = digest.to_hex()[..HASH_LENGTH].to_string();
        Self { coordinates, hash }
    }
}

impl From<DimensionSpacePoint> for BTreeMap<String, String> {
    fn from(point: DimensionSpacePoint) -> Self {
        point.coordinates
    }
}

impl fmt::Display for DimensionSpacePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

impl fmt::Debug for DimensionSpacePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DimensionSpacePoint({})", self.to_json())
    }
}

/// A set of dimension space points keyed by their hash.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "Vec<DimensionSpacePoint>",
    into = "Vec<DimensionSpacePoint>"
)]
pub struct DimensionSpacePointSet {
    points: BTreeMap<String, DimensionSpacePoint>,
}

impl DimensionSpacePointSet {
    pub fn new(points: impl IntoIterator<Item = DimensionSpacePoint>) -> Self {
        Self {
            points: points
                .into_iter()
                .map(|p| (p.hash().to_string(), p))
                .collect(),
        }
    }

    pub fn single(point: DimensionSpacePoint) -> Self {
        Self::new([point])
    }

    pub fn insert(&mut self, point: DimensionSpacePoint) {
        self.points.insert(point.hash().to_string(), point);
    }

    pub fn contains(&self, point: &DimensionSpacePoint) -> bool {
        self.points.contains_key(point.hash())
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.points.contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&DimensionSpacePoint> {
        self.points.get(hash)
    }

    /// Points of `self` not contained in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|(hash, _)| !other.points.contains_key(*hash))
                .map(|(hash, p)| (hash.clone(), p.clone()))
                .collect(),
        }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|(hash, _)| other.points.contains_key(*hash))
                .map(|(hash, p)| (hash.clone(), p.clone()))
                .collect(),
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut points = self.points.clone();
        for (hash, p) in &other.points {
            points.entry(hash.clone()).or_insert_with(|| p.clone());
        }
        Self { points }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionSpacePoint> {
        self.points.values()
    }

    pub fn hashes(&self) -> impl Iterator<Item = &str> {
        self.points.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl From<Vec<DimensionSpacePoint>> for DimensionSpacePointSet {
    fn from(points: Vec<DimensionSpacePoint>) -> Self {
        Self::new(points)
    }
}

impl From<DimensionSpacePointSet> for Vec<DimensionSpacePoint> {
    fn from(set: DimensionSpacePointSet) -> Self {
        set.points.into_values().collect()
    }
}

impl FromIterator<DimensionSpacePoint> for DimensionSpacePointSet {
    fn from_iter<I: IntoIterator<Item = DimensionSpacePoint>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a DimensionSpacePointSet {
    type Item = &'a DimensionSpacePoint;
    type IntoIter = std::collections::btree_map::Values<'a, String, DimensionSpacePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.values()
    }
}

impl fmt::Debug for DimensionSpacePointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.points.values()).finish()
    }
}
