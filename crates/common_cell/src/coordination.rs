use crate::CellError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Shape name → ordered plate-sequence numbers, loaded once from JSON before
/// a job starts. Keys are matched case-insensitively; the list order is the
/// placement order and is never re-sorted.
#[derive(Debug, Clone)]
pub struct CoordinationTable {
    shapes: HashMap<String, Vec<u32>>,
}

impl CoordinationTable {
    /// Load the table from a JSON object of `"shape": [plate_seq, ...]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid JSON
    /// map of integer lists.
    pub fn load(path: &Path) -> Result<Self, CellError> {
        let raw = fs::read_to_string(path)?;
        let parsed: HashMap<String, Vec<u32>> = serde_json::from_str(&raw)?;
        let table = Self::from_map(parsed);
        tracing::info!("Loaded coordination table with {} shapes", table.shapes.len());
        Ok(table)
    }

    #[must_use]
    pub fn from_map(shapes: HashMap<String, Vec<u32>>) -> Self {
        let shapes = shapes
            .into_iter()
            .map(|(name, plates)| (name.to_lowercase(), plates))
            .collect();
        Self { shapes }
    }

    /// Ordered plate sequence for one shape.
    ///
    /// # Errors
    ///
    /// Returns [`CellError::UnknownShape`] when the shape has no entry.
    pub fn plates_for(&self, shape: &str) -> Result<&[u32], CellError> {
        self.shapes
            .get(&shape.to_lowercase())
            .map(Vec::as_slice)
            .ok_or_else(|| CellError::UnknownShape(shape.to_string()))
    }

    #[must_use]
    pub fn shape_names(&self) -> Vec<&str> {
        self.shapes.keys().map(String::as_str).collect()
    }
}
