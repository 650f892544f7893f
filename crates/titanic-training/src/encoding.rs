//! Dummy (one-hot) encoding of feature frames into a numeric design matrix.
//!
//! The fitted encoder is stored inside the model artifact, so validation and
//! inference rebuild exactly the column layout the forest was trained on.

use crate::error::{TrainingError, TrainingResult};
use crate::table::Frame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodedColumn {
    /// Passed through as a number. Missing cells take the train-time mean.
    Numeric { name: String, fill: f64 },
    /// Expanded to one `<name>_<category>` indicator per category, sorted.
    Categorical { name: String, categories: Vec<String> },
}

impl EncodedColumn {
    fn name(&self) -> &str {
        match self {
            Self::Numeric { name, .. } | Self::Categorical { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<EncodedColumn>,
}

fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell.eq_ignore_ascii_case("nan")
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl OneHotEncoder {
    pub fn fit(frame: &Frame) -> TrainingResult<Self> {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for name in frame.columns() {
            let cells = frame.column(name)?;
            let present: Vec<&str> = cells.into_iter().filter(|c| !is_missing(c)).collect();
            let values: Option<Vec<f64>> = present.iter().map(|c| parse_number(c)).collect();

            match values {
                Some(values) => {
                    let fill = if values.is_empty() {
                        0.0
                    } else {
                        values.iter().sum::<f64>() / values.len() as f64
                    };
                    numeric.push(EncodedColumn::Numeric { name: name.clone(), fill });
                }
                None => {
                    let categories: BTreeSet<String> = present.iter().map(|c| c.trim().to_string()).collect();
                    categorical.push(EncodedColumn::Categorical {
                        name: name.clone(),
                        categories: categories.into_iter().collect(),
                    });
                }
            }
        }

        // Numeric columns first, then indicators, matching `pandas.get_dummies`.
        numeric.extend(categorical);
        let encoder = Self { columns: numeric };
        if encoder.width() == 0 {
            return Err(TrainingError::ModelFit("encoding produced zero feature columns".to_string()));
        }
        Ok(encoder)
    }

    /// Source columns the encoder expects, in encoding order.
    #[must_use]
    pub fn input_columns(&self) -> Vec<&str> {
        self.columns.iter().map(EncodedColumn::name).collect()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.columns
            .iter()
            .map(|c| match c {
                EncodedColumn::Numeric { .. } => 1,
                EncodedColumn::Categorical { categories, .. } => categories.len(),
            })
            .sum()
    }

    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for column in &self.columns {
            match column {
                EncodedColumn::Numeric { name, .. } => names.push(name.clone()),
                EncodedColumn::Categorical { name, categories } => {
                    names.extend(categories.iter().map(|c| format!("{name}_{c}")));
                }
            }
        }
        names
    }

    /// Encode `frame` into rows of `width()` numbers.
    ///
    /// Unseen categories encode as all-zero indicators.
    pub fn transform(&self, frame: &Frame) -> TrainingResult<Vec<Vec<f64>>> {
        let inputs = self.input_columns();
        let selected = frame.select(&inputs)?;

        let mut matrix = Vec::with_capacity(selected.len());
        for (row_idx, row) in selected.rows().iter().enumerate() {
            let mut encoded = Vec::with_capacity(self.width());
            for (column, cell) in self.columns.iter().zip(row) {
                match column {
                    EncodedColumn::Numeric { name, fill } => {
                        let value = if is_missing(cell) {
                            *fill
                        } else {
                            parse_number(cell).ok_or_else(|| {
                                TrainingError::SchemaMismatch(format!(
                                    "row {row_idx}: column {name} expects a number, got {cell:?}"
                                ))
                            })?
                        };
                        encoded.push(value);
                    }
                    EncodedColumn::Categorical { categories, .. } => {
                        let cell = cell.trim();
                        encoded.extend(categories.iter().map(|c| if c == cell { 1.0 } else { 0.0 }));
                    }
                }
            }
            matrix.push(encoded);
        }
        Ok(matrix)
    }
}
