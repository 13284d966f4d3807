//! Tabular point records at the system boundary.
//!
//! Readers hand chunks over as [`PointTable`]s (named `f64` columns). The
//! merge works on validated [`Chunk`]s and returns one [`MergedPointTable`]
//! per group for the writer.

use crate::error::MergeError;
use crate::types::{Label, Point3};

/// Required coordinate columns.
pub const COORDINATE_COLUMNS: [&str; 3] = ["x", "y", "z"];

/// Name of the canonical label column in tables produced by the merge.
pub const INSTANCE_LABEL_COLUMN: &str = "instance_label";

/// Columnar point records as supplied by an external reader.
///
/// Column order is preserved. Inserting a column under an existing name replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointTable {
    columns: Vec<(String, Vec<f64>)>,
}

impl PointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table with `x`, `y`, `z` and `label_column` from labelled points.
    pub fn from_labeled_points<I>(label_column: &str, points: I) -> Self
    where
        I: IntoIterator<Item = (Point3, Label)>,
    {
        let (mut xs, mut ys, mut zs, mut ls) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for (p, l) in points {
            xs.push(p.x);
            ys.push(p.y);
            zs.push(p.z);
            ls.push(l as f64);
        }
        Self::new()
            .with_column("x", xs)
            .with_column("y", ys)
            .with_column("z", zs)
            .with_column(label_column, ls)
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert_column(name, values);
        self
    }

    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = values,
            None => self.columns.push((name, values)),
        }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Row count (longest column; columns of a valid table all agree).
    pub fn num_rows(&self) -> usize {
        self.columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }
}

/// A validated chunk: positions, local instance labels and passthrough attributes.
#[derive(Debug, Clone)]
pub struct Chunk {
    id: String,
    points: Vec<Point3>,
    labels: Vec<Label>,
    attributes: Vec<(String, Vec<f64>)>,
}

impl Chunk {
    /// Validate `table` and split it into coordinates, labels and attributes.
    ///
    /// Fails with [`MergeError::InputSchema`] naming `id` when a required
    /// column is missing, columns are ragged, or a label cell is not an
    /// integer in `0..=u32::MAX`. An input [`INSTANCE_LABEL_COLUMN`] is
    /// dropped: the merge writes its own.
    pub fn from_table(
        id: &str,
        table: &PointTable,
        label_column: &str,
    ) -> Result<Self, MergeError> {
        let n = table.num_rows();
        let required = |name: &str| -> Result<&[f64], MergeError> {
            let col = table.column(name).ok_or_else(|| {
                MergeError::schema(id, format!("missing required column {name:?}"))
            })?;
            if col.len() != n {
                return Err(MergeError::schema(
                    id,
                    format!("column {name:?} has {} rows, expected {n}", col.len()),
                ));
            }
            Ok(col)
        };

        let xs = required(COORDINATE_COLUMNS[0])?;
        let ys = required(COORDINATE_COLUMNS[1])?;
        let zs = required(COORDINATE_COLUMNS[2])?;
        let raw_labels = required(label_column)?;

        let points = xs
            .iter()
            .zip(ys)
            .zip(zs)
            .map(|((&x, &y), &z)| Point3::new(x, y, z))
            .collect();

        let labels = raw_labels
            .iter()
            .enumerate()
            .map(|(row, &v)| {
                if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= Label::MAX as f64 {
                    Ok(v as Label)
                } else {
                    Err(MergeError::schema(
                        id,
                        format!(
                            "label column {label_column:?} row {row}: \
                             {v} is not a valid instance label"
                        ),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut attributes = Vec::new();
        for (name, values) in &table.columns {
            if COORDINATE_COLUMNS.contains(&name.as_str())
                || name == label_column
                || name == INSTANCE_LABEL_COLUMN
            {
                continue;
            }
            if values.len() != n {
                return Err(MergeError::schema(
                    id,
                    format!("column {name:?} has {} rows, expected {n}", values.len()),
                ));
            }
            attributes.push((name.clone(), values.clone()));
        }

        Ok(Self {
            id: id.to_owned(),
            points,
            labels,
            attributes,
        })
    }

    /// Build a chunk directly from labelled points (no attributes).
    pub fn from_points<I>(id: &str, points: I) -> Self
    where
        I: IntoIterator<Item = (Point3, Label)>,
    {
        let (points, labels) = points.into_iter().unzip();
        Self {
            id: id.to_owned(),
            points,
            labels,
            attributes: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Optional attribute in the merged output. `None` marks a cell whose
/// source chunk did not carry the column.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// All chunks of a group concatenated in processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedPointTable {
    /// Chunk ids in processing order; `chunk_index` points into this.
    pub chunk_ids: Vec<String>,
    pub chunk_index: Vec<u32>,
    pub points: Vec<Point3>,
    /// Label as produced by the segmentation model for the source chunk.
    pub local_labels: Vec<Label>,
    /// Canonical group-wide instance label.
    pub instance_labels: Vec<Label>,
    pub attributes: Vec<AttributeColumn>,
}

impl MergedPointTable {
    /// Concatenate `chunks`, taking `instance_labels[i]` as the canonical
    /// labels of `chunks[i]`. Attribute columns are the union over all
    /// chunks in first-seen order.
    pub(crate) fn concat(chunks: &[Chunk], instance_labels: Vec<Vec<Label>>) -> Self {
        debug_assert_eq!(chunks.len(), instance_labels.len());
        let total: usize = chunks.iter().map(Chunk::len).sum();

        let mut names: Vec<&str> = Vec::new();
        for chunk in chunks {
            for (name, _) in chunk.attributes() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let mut attributes: Vec<AttributeColumn> = names
            .iter()
            .map(|&name| AttributeColumn {
                name: name.to_owned(),
                values: Vec::with_capacity(total),
            })
            .collect();

        let mut out = Self {
            chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
            chunk_index: Vec::with_capacity(total),
            points: Vec::with_capacity(total),
            local_labels: Vec::with_capacity(total),
            instance_labels: Vec::with_capacity(total),
            attributes: Vec::new(),
        };

        for (ci, (chunk, labels)) in chunks.iter().zip(instance_labels).enumerate() {
            out.chunk_index.extend(std::iter::repeat(ci as u32).take(chunk.len()));
            out.points.extend_from_slice(&chunk.points);
            out.local_labels.extend_from_slice(&chunk.labels);
            out.instance_labels.extend(labels);

            for col in attributes.iter_mut() {
                match chunk.attributes.iter().find(|(n, _)| *n == col.name) {
                    Some((_, values)) => col.values.extend(values.iter().map(|&v| Some(v))),
                    None => col.values.extend(std::iter::repeat(None).take(chunk.len())),
                }
            }
        }

        out.attributes = attributes;
        out
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Interleaved `x, y, z` coordinates for writers that take flat buffers.
    pub fn coordinates_flat(&self) -> &[f64] {
        bytemuck::cast_slice(&self.points)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeColumn> {
        self.attributes.iter().find(|c| c.name == name)
    }

    /// Number of distinct canonical labels, noise excluded.
    pub fn num_instances(&self) -> usize {
        let mut labels: Vec<Label> = self
            .instance_labels
            .iter()
            .copied()
            .filter(|&l| l != crate::types::NOISE_LABEL)
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels.len()
    }

    /// Flatten back into a [`PointTable`] for writers.
    ///
    /// `label_column` keeps the chunk-local label and [`INSTANCE_LABEL_COLUMN`]
    /// holds the canonical one. Missing attribute cells become `NaN`.
    ///
    /// Label columns are written last, so the canonical label wins over any
    /// attribute of the same name and over `label_column` when both names
    /// are [`INSTANCE_LABEL_COLUMN`].
    pub fn to_point_table(&self, label_column: &str) -> PointTable {
        let mut table = PointTable::new()
            .with_column("x", self.points.iter().map(|p| p.x).collect())
            .with_column("y", self.points.iter().map(|p| p.y).collect())
            .with_column("z", self.points.iter().map(|p| p.z).collect());
        for col in &self.attributes {
            table.insert_column(
                col.name.clone(),
                col.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
            );
        }
        table.insert_column(
            label_column,
            self.local_labels.iter().map(|&l| l as f64).collect(),
        );
        table.insert_column(
            INSTANCE_LABEL_COLUMN,
            self.instance_labels.iter().map(|&l| l as f64).collect(),
        );
        table
    }
}
