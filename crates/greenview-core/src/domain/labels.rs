//! Per-pixel label grids and class name tables.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use crate::error::InferenceError;

/// Cityscapes class names, indexed by class id.
pub const CITYSCAPES_CLASSES: [&str; 19] = [
    "road",
    "sidewalk",
    "building",
    "wall",
    "fence",
    "pole",
    "traffic_light",
    "traffic_sign",
    "vegetation",
    "terrain",
    "sky",
    "person",
    "rider",
    "car",
    "truck",
    "bus",
    "train",
    "motorcycle",
    "bicycle",
];

/// Class id of `vegetation` in the Cityscapes table.
pub const VEGETATION_CLASS_ID: u32 = 8;

/// Dense row-major map of class ids, one per pixel.
///
/// A grid is never empty and always holds exactly `width * height` labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGrid {
    width: u32,
    height: u32,
    labels: Vec<u32>,
}

impl LabelGrid {
    /// Creates a grid from row-major labels.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Shape`] if either dimension is zero or the
    /// label count does not match `width * height`.
    pub fn new(width: u32, height: u32, labels: Vec<u32>) -> Result<Self, InferenceError> {
        if width == 0 || height == 0 {
            return Err(InferenceError::Shape(format!(
                "label grid must be non-empty, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize;
        if labels.len() != expected {
            return Err(InferenceError::Shape(format!(
                "expected {expected} labels for {width}x{height}, got {}",
                labels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            labels,
        })
    }

    /// Creates a grid where every pixel carries `label`.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Shape`] if either dimension is zero.
    pub fn filled(width: u32, height: u32, label: u32) -> Result<Self, InferenceError> {
        Self::new(width, height, vec![label; width as usize * height as usize])
    }

    /// Grid width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major labels.
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Label at `(x, y)`, if inside the grid.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.labels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Number of pixels in the grid.
    #[must_use]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Mapping from class id to human-readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames(BTreeMap<u32, String>);

impl ClassNames {
    /// The 19-class Cityscapes table.
    #[must_use]
    pub fn cityscapes() -> Self {
        Self(
            (0u32..)
                .zip(CITYSCAPES_CLASSES)
                .map(|(id, name)| (id, name.to_string()))
                .collect(),
        )
    }

    /// An empty table; every id falls back to `class_<id>`.
    #[must_use]
    pub const fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Builds a table from a model config's `id2label` map.
    ///
    /// Keys that are not integers are skipped. Names are normalized so that
    /// `"traffic light"` and `"Traffic-Light"` both become `traffic_light`,
    /// matching the built-in table and the report column names.
    /// Returns `None` if nothing usable remains.
    #[must_use]
    pub fn from_id2label(id2label: &HashMap<String, String>) -> Option<Self> {
        let table: BTreeMap<u32, String> = id2label
            .iter()
            .filter_map(|(k, v)| k.trim().parse().ok().map(|id| (id, normalize_name(v))))
            .collect();
        (!table.is_empty()).then_some(Self(table))
    }

    /// Sets or replaces the name of one class.
    pub fn insert(&mut self, id: u32, name: impl Into<String>) {
        self.0.insert(id, name.into());
    }

    /// Name of `id`, or `class_<id>` when unknown.
    #[must_use]
    pub fn name(&self, id: u32) -> Cow<'_, str> {
        self.0
            .get(&id)
            .map_or_else(|| Cow::Owned(format!("class_{id}")), |n| Cow::Borrowed(n.as_str()))
    }

    /// Id whose name is `name`, if any.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.0.iter().find(|(_, n)| *n == name).map(|(id, _)| *id)
    }

    /// Number of named classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no class is named.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize_name(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

impl Default for ClassNames {
    fn default() -> Self {
        Self::cityscapes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_rejects_mismatched_length() {
        assert!(LabelGrid::new(2, 2, vec![0; 3]).is_err());
        assert!(LabelGrid::new(0, 2, vec![]).is_err());
        assert!(LabelGrid::new(2, 2, vec![0; 4]).is_ok());
    }

    #[test]
    fn test_grid_get_is_row_major() {
        let grid = LabelGrid::new(3, 2, vec![0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(grid.get(0, 0), Some(0));
        assert_eq!(grid.get(2, 0), Some(2));
        assert_eq!(grid.get(0, 1), Some(3));
        assert_eq!(grid.get(3, 0), None);
        assert_eq!(grid.pixel_count(), 6);
    }

    #[test]
    fn test_cityscapes_names() {
        let names = ClassNames::cityscapes();
        assert_eq!(names.len(), 19);
        assert_eq!(names.name(VEGETATION_CLASS_ID), "vegetation");
        assert_eq!(names.name(0), "road");
        assert_eq!(names.name(42), "class_42");
        assert_eq!(names.id_of("sky"), Some(10));
    }

    #[test]
    fn test_from_id2label_skips_bad_keys() {
        let map = HashMap::from([
            ("0".to_string(), "grass".to_string()),
            ("x".to_string(), "ignored".to_string()),
        ]);
        let names = ClassNames::from_id2label(&map).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names.name(0), "grass");

        assert!(ClassNames::from_id2label(&HashMap::new()).is_none());
    }

    #[test]
    fn test_from_id2label_normalizes_names() {
        let map = HashMap::from([
            ("6".to_string(), "traffic light".to_string()),
            ("7".to_string(), " Traffic-Sign ".to_string()),
            ("8".to_string(), "vegetation".to_string()),
        ]);
        let names = ClassNames::from_id2label(&map).unwrap();
        assert_eq!(names.name(6), "traffic_light");
        assert_eq!(names.name(7), "traffic_sign");
        assert_eq!(names.id_of("traffic_light"), Some(6));
        assert_eq!(names.id_of("vegetation"), Some(VEGETATION_CLASS_ID));

        let builtin = ClassNames::cityscapes();
        for id in 0..19 {
            let spaced = builtin.name(id).replace('_', " ");
            let map = HashMap::from([(id.to_string(), spaced)]);
            assert_eq!(ClassNames::from_id2label(&map).unwrap().name(id), builtin.name(id));
        }
    }
}
