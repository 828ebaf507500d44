//! Small embedded datasets for examples, tests and benchmarks

use crate::error::{Result, StackingError};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::path::Path;

/// A loaded dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    pub data: Array2<f64>,
    pub target: Array1<f64>,
    pub feature_names: Vec<String>,
    pub target_names: Vec<String>,
}

/// Fisher's Iris data: sepal length, sepal width, petal length, petal width
/// and the species (0 = setosa, 1 = versicolor, 2 = virginica).
const IRIS: [[f64; 5]; 150] = [
    [5.1, 3.5, 1.4, 0.2, 0.0],
    [4.9, 3.0, 1.4, 0.2, 0.0],
    [4.7, 3.2, 1.3, 0.2, 0.0],
    [4.6, 3.1, 1.5, 0.2, 0.0],
    [5.0, 3.6, 1.4, 0.2, 0.0],
    [5.4, 3.9, 1.7, 0.4, 0.0],
    [4.6, 3.4, 1.4, 0.3, 0.0],
    [5.0, 3.4, 1.5, 0.2, 0.0],
    [4.4, 2.9, 1.4, 0.2, 0.0],
    [4.9, 3.1, 1.5, 0.1, 0.0],
    [5.4, 3.7, 1.5, 0.2, 0.0],
    [4.8, 3.4, 1.6, 0.2, 0.0],
    [4.8, 3.0, 1.4, 0.1, 0.0],
    [4.3, 3.0, 1.1, 0.1, 0.0],
    [5.8, 4.0, 1.2, 0.2, 0.0],
    [5.7, 4.4, 1.5, 0.4, 0.0],
    [5.4, 3.9, 1.3, 0.4, 0.0],
    [5.1, 3.5, 1.4, 0.3, 0.0],
    [5.7, 3.8, 1.7, 0.3, 0.0],
    [5.1, 3.8, 1.5, 0.3, 0.0],
    [5.4, 3.4, 1.7, 0.2, 0.0],
    [5.1, 3.7, 1.5, 0.4, 0.0],
    [4.6, 3.6, 1.0, 0.2, 0.0],
    [5.1, 3.3, 1.7, 0.5, 0.0],
    [4.8, 3.4, 1.9, 0.2, 0.0],
    [5.0, 3.0, 1.6, 0.2, 0.0],
    [5.0, 3.4, 1.6, 0.4, 0.0],
    [5.2, 3.5, 1.5, 0.2, 0.0],
    [5.2, 3.4, 1.4, 0.2, 0.0],
    [4.7, 3.2, 1.6, 0.2, 0.0],
    [4.8, 3.1, 1.6, 0.2, 0.0],
    [5.4, 3.4, 1.5, 0.4, 0.0],
    [5.2, 4.1, 1.5, 0.1, 0.0],
    [5.5, 4.2, 1.4, 0.2, 0.0],
    [4.9, 3.1, 1.5, 0.2, 0.0],
    [5.0, 3.2, 1.2, 0.2, 0.0],
    [5.5, 3.5, 1.3, 0.2, 0.0],
    [4.9, 3.6, 1.4, 0.1, 0.0],
    [4.4, 3.0, 1.3, 0.2, 0.0],
    [5.1, 3.4, 1.5, 0.2, 0.0],
    [5.0, 3.5, 1.3, 0.3, 0.0],
    [4.5, 2.3, 1.3, 0.3, 0.0],
    [4.4, 3.2, 1.3, 0.2, 0.0],
    [5.0, 3.5, 1.6, 0.6, 0.0],
    [5.1, 3.8, 1.9, 0.4, 0.0],
    [4.8, 3.0, 1.4, 0.3, 0.0],
    [5.1, 3.8, 1.6, 0.2, 0.0],
    [4.6, 3.2, 1.4, 0.2, 0.0],
    [5.3, 3.7, 1.5, 0.2, 0.0],
    [5.0, 3.3, 1.4, 0.2, 0.0],
    [7.0, 3.2, 4.7, 1.4, 1.0],
    [6.4, 3.2, 4.5, 1.5, 1.0],
    [6.9, 3.1, 4.9, 1.5, 1.0],
    [5.5, 2.3, 4.0, 1.3, 1.0],
    [6.5, 2.8, 4.6, 1.5, 1.0],
    [5.7, 2.8, 4.5, 1.3, 1.0],
    [6.3, 3.3, 4.7, 1.6, 1.0],
    [4.9, 2.4, 3.3, 1.0, 1.0],
    [6.6, 2.9, 4.6, 1.3, 1.0],
    [5.2, 2.7, 3.9, 1.4, 1.0],
    [5.0, 2.0, 3.5, 1.0, 1.0],
    [5.9, 3.0, 4.2, 1.5, 1.0],
    [6.0, 2.2, 4.0, 1.0, 1.0],
    [6.1, 2.9, 4.7, 1.4, 1.0],
    [5.6, 2.9, 3.6, 1.3, 1.0],
    [6.7, 3.1, 4.4, 1.4, 1.0],
    [5.6, 3.0, 4.5, 1.5, 1.0],
    [5.8, 2.7, 4.1, 1.0, 1.0],
    [6.2, 2.2, 4.5, 1.5, 1.0],
    [5.6, 2.5, 3.9, 1.1, 1.0],
    [5.9, 3.2, 4.8, 1.8, 1.0],
    [6.1, 2.8, 4.0, 1.3, 1.0],
    [6.3, 2.5, 4.9, 1.5, 1.0],
    [6.1, 2.8, 4.7, 1.2, 1.0],
    [6.4, 2.9, 4.3, 1.3, 1.0],
    [6.6, 3.0, 4.4, 1.4, 1.0],
    [6.8, 2.8, 4.8, 1.4, 1.0],
    [6.7, 3.0, 5.0, 1.7, 1.0],
    [6.0, 2.9, 4.5, 1.5, 1.0],
    [5.7, 2.6, 3.5, 1.0, 1.0],
    [5.5, 2.4, 3.8, 1.1, 1.0],
    [5.5, 2.4, 3.7, 1.0, 1.0],
    [5.8, 2.7, 3.9, 1.2, 1.0],
    [6.0, 2.7, 5.1, 1.6, 1.0],
    [5.4, 3.0, 4.5, 1.5, 1.0],
    [6.0, 3.4, 4.5, 1.6, 1.0],
    [6.7, 3.1, 4.7, 1.5, 1.0],
    [6.3, 2.3, 4.4, 1.3, 1.0],
    [5.6, 3.0, 4.1, 1.3, 1.0],
    [5.5, 2.5, 4.0, 1.3, 1.0],
    [5.5, 2.6, 4.4, 1.2, 1.0],
    [6.1, 3.0, 4.6, 1.4, 1.0],
    [5.8, 2.6, 4.0, 1.2, 1.0],
    [5.0, 2.3, 3.3, 1.0, 1.0],
    [5.6, 2.7, 4.2, 1.3, 1.0],
    [5.7, 3.0, 4.2, 1.2, 1.0],
    [5.7, 2.9, 4.2, 1.3, 1.0],
    [6.2, 2.9, 4.3, 1.3, 1.0],
    [5.1, 2.5, 3.0, 1.1, 1.0],
    [5.7, 2.8, 4.1, 1.3, 1.0],
    [6.3, 3.3, 6.0, 2.5, 2.0],
    [5.8, 2.7, 5.1, 1.9, 2.0],
    [7.1, 3.0, 5.9, 2.1, 2.0],
    [6.3, 2.9, 5.6, 1.8, 2.0],
    [6.5, 3.0, 5.8, 2.2, 2.0],
    [7.6, 3.0, 6.6, 2.1, 2.0],
    [4.9, 2.5, 4.5, 1.7, 2.0],
    [7.3, 2.9, 6.3, 1.8, 2.0],
    [6.7, 2.5, 5.8, 1.8, 2.0],
    [7.2, 3.6, 6.1, 2.5, 2.0],
    [6.5, 3.2, 5.1, 2.0, 2.0],
    [6.4, 2.7, 5.3, 1.9, 2.0],
    [6.8, 3.0, 5.5, 2.1, 2.0],
    [5.7, 2.5, 5.0, 2.0, 2.0],
    [5.8, 2.8, 5.1, 2.4, 2.0],
    [6.4, 3.2, 5.3, 2.3, 2.0],
    [6.5, 3.0, 5.5, 1.8, 2.0],
    [7.7, 3.8, 6.7, 2.2, 2.0],
    [7.7, 2.6, 6.9, 2.3, 2.0],
    [6.0, 2.2, 5.0, 1.5, 2.0],
    [6.9, 3.2, 5.7, 2.3, 2.0],
    [5.6, 2.8, 4.9, 2.0, 2.0],
    [7.7, 2.8, 6.7, 2.0, 2.0],
    [6.3, 2.7, 4.9, 1.8, 2.0],
    [6.7, 3.3, 5.7, 2.1, 2.0],
    [7.2, 3.2, 6.0, 1.8, 2.0],
    [6.2, 2.8, 4.8, 1.8, 2.0],
    [6.1, 3.0, 4.9, 1.8, 2.0],
    [6.4, 2.8, 5.6, 2.1, 2.0],
    [7.2, 3.0, 5.8, 1.6, 2.0],
    [7.4, 2.8, 6.1, 1.9, 2.0],
    [7.9, 3.8, 6.4, 2.0, 2.0],
    [6.4, 2.8, 5.6, 2.2, 2.0],
    [6.3, 2.8, 5.1, 1.5, 2.0],
    [6.1, 2.6, 5.6, 1.4, 2.0],
    [7.7, 3.0, 6.1, 2.3, 2.0],
    [6.3, 3.4, 5.6, 2.4, 2.0],
    [6.4, 3.1, 5.5, 1.8, 2.0],
    [6.0, 3.0, 4.8, 1.8, 2.0],
    [6.9, 3.1, 5.4, 2.1, 2.0],
    [6.7, 3.1, 5.6, 2.4, 2.0],
    [6.9, 3.1, 5.1, 2.3, 2.0],
    [5.8, 2.7, 5.1, 1.9, 2.0],
    [6.8, 3.2, 5.9, 2.3, 2.0],
    [6.7, 3.3, 5.7, 2.5, 2.0],
    [6.7, 3.0, 5.2, 2.3, 2.0],
    [6.3, 2.5, 5.0, 1.9, 2.0],
    [6.5, 3.0, 5.2, 2.0, 2.0],
    [6.2, 3.4, 5.4, 2.3, 2.0],
    [5.9, 3.0, 5.1, 1.8, 2.0],
];

/// Load the 150-sample Iris dataset
pub fn load_iris() -> Result<Dataset> {
    let data = Array2::from_shape_vec(
        (IRIS.len(), 4),
        IRIS.iter().flat_map(|row| row[..4].iter().copied()).collect(),
    )?;
    let target = IRIS.iter().map(|row| row[4]).collect();

    Ok(Dataset {
        data,
        target,
        feature_names: ["sepal length (cm)", "sepal width (cm)", "petal length (cm)", "petal width (cm)"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        target_names: ["setosa", "versicolor", "virginica"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    })
}

/// Load a numeric CSV with a header row; `target` names the label column and
/// every other column becomes a feature.
pub fn load_csv(path: &Path, target: &str) -> Result<Dataset> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let feature_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != target)
        .map(|s| s.to_string())
        .collect();
    if feature_names.len() == df.width() {
        return Err(StackingError::DataError(format!(
            "target column '{}' not found in {}",
            target,
            path.display()
        )));
    }

    let target_values = numeric_column(&df, target)?;
    let target_names = {
        let mut classes = target_values.clone();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        classes.iter().map(|c| c.to_string()).collect()
    };

    let columns: Vec<Vec<f64>> = feature_names
        .iter()
        .map(|name| numeric_column(&df, name))
        .collect::<Result<_>>()?;
    let data = Array2::from_shape_fn((df.height(), columns.len()), |(r, c)| columns[c][r]);

    Ok(Dataset {
        data,
        target: Array1::from_vec(target_values),
        feature_names,
        target_names,
    })
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                StackingError::DataError(format!(
                    "column '{}' has a missing or non-numeric value at row {}",
                    name, row
                ))
            })
        })
        .collect()
}
