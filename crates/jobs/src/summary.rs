// crates/jobs/src/summary.rs
//! Raw alignment results and the summary derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Student × worksheet matrix returned by the alignment endpoint.
///
/// Only the identifier lists are interpreted; everything else is carried
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignMatrix {
    #[serde(default, deserialize_with = "null_as_default")]
    pub students: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub worksheets: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw response of the alignment endpoint.
///
/// `row_averages` has one entry per worksheet and `column_averages` one per
/// student. Entries stay raw JSON so that non-numeric values survive until
/// the summary filters them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub matrix: AlignMatrix,
    #[serde(default, deserialize_with = "null_as_default")]
    pub row_averages: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub column_averages: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Summary computed once from an [`AlignResult`].
///
/// A `None` average marks an entry whose source value was missing or not a
/// number; the key is still present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub student_count: usize,
    pub worksheet_count: usize,
    pub avg_per_student: BTreeMap<String, Option<f64>>,
    pub avg_per_worksheet: BTreeMap<String, Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
}

impl JobSummary {
    pub fn from_result(result: &AlignResult) -> Self {
        let students = &result.matrix.students;
        let worksheets = &result.matrix.worksheets;

        let avg_per_worksheet = worksheets
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), result.row_averages.get(i).and_then(numeric)))
            .collect();
        let avg_per_student = students
            .iter()
            .enumerate()
            .map(|(j, s)| (s.clone(), result.column_averages.get(j).and_then(numeric)))
            .collect();

        let values: Vec<f64> = result
            .row_averages
            .iter()
            .chain(&result.column_averages)
            .filter_map(numeric)
            .collect();
        let overall = (!values.is_empty())
            .then(|| round_one_decimal(values.iter().sum::<f64>() / values.len() as f64));

        Self {
            student_count: students.len(),
            worksheet_count: worksheets.len(),
            avg_per_student,
            avg_per_worksheet,
            overall,
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    value.as_f64().filter(|x| !x.is_nan())
}

/// Round half up to one decimal place.
fn round_one_decimal(x: f64) -> f64 {
    (x * 10.0 + 0.5).floor() / 10.0
}
