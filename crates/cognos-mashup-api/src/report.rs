// Report data models
//
// `fmt=DataSetJSON` responses carry one or more data tables, each an
// ordered list of rows whose shape is defined by the report itself.
// Rows are therefore kept as raw `serde_json::Value`s until a caller
// asks for a concrete type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, preview};

/// A decoded report: one data set holding the report's tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ReportWire")]
pub struct Report {
    #[serde(rename = "dataSet")]
    pub data_set: DataSet,
}

/// Ordered collection of data tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    #[serde(rename = "dataTable")]
    pub data_tables: Vec<DataTable>,
}

/// One named table. Row order is the order the service returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub id: String,
    #[serde(rename = "row", default)]
    pub rows: Vec<Value>,
}

/// Both wire shapes the dispatcher is known to produce: the data set
/// wrapped in a `dataSet` object, or the bare `{"dataTable": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReportWire {
    Wrapped {
        #[serde(rename = "dataSet", alias = "DataSet", alias = "dataset")]
        data_set: DataSet,
    },
    Bare(DataSet),
}

impl From<ReportWire> for Report {
    fn from(wire: ReportWire) -> Self {
        match wire {
            ReportWire::Wrapped { data_set } | ReportWire::Bare(data_set) => Self { data_set },
        }
    }
}

impl Report {
    /// Decode a `DataSetJSON` response body.
    pub fn from_json(body: &str) -> Result<Self, Error> {
        serde_json::from_str(body).map_err(|e| {
            Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(body)),
                body: body.to_owned(),
            }
        })
    }

    /// All tables, in report order.
    pub fn tables(&self) -> &[DataTable] {
        &self.data_set.data_tables
    }

    /// Select a table by its 1-based position.
    pub fn table(&self, index: usize) -> Result<&DataTable, Error> {
        let count = self.data_set.data_tables.len();
        index
            .checked_sub(1)
            .and_then(|i| self.data_set.data_tables.get(i))
            .ok_or(Error::TableIndex { index, count })
    }

    /// Consume the report, keeping only the table at the 1-based `index`.
    pub fn into_table(self, index: usize) -> Result<DataTable, Error> {
        let mut tables = self.data_set.data_tables;
        let count = tables.len();
        if index == 0 || index > count {
            return Err(Error::TableIndex { index, count });
        }
        Ok(tables.swap_remove(index - 1))
    }

    /// Find a table by its `id`.
    pub fn table_by_id(&self, id: &str) -> Option<&DataTable> {
        self.data_set.data_tables.iter().find(|t| t.id == id)
    }
}

impl DataTable {
    /// Decode every row into `T`.
    pub fn rows_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                T::deserialize(row).map_err(|e| Error::Deserialization {
                    message: format!("row {} of table {:?}: {e}", i + 1, self.id),
                    body: row.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_bare_data_set() {
        let report = Report::from_json(r#"{"dataTable":[{"id":"1","row":[1,2,3]}]}"#).unwrap();
        assert_eq!(report.tables().len(), 1);
        assert_eq!(report.table(1).unwrap().rows, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn decodes_wrapped_data_set() {
        let body = json!({
            "dataSet": {
                "dataTable": [
                    { "id": "List1", "row": [{ "Region": "EMEA", "Revenue": 10.5 }] },
                    { "id": "List2", "row": [] }
                ]
            }
        });
        let report = Report::from_json(&body.to_string()).unwrap();
        assert_eq!(report.tables().len(), 2);
        assert_eq!(report.table_by_id("List2").unwrap().rows.len(), 0);

        let upper = Report::from_json(r#"{"DataSet":{"dataTable":[{"id":"a"}]}}"#).unwrap();
        assert_eq!(upper.table(1).unwrap().id, "a");
        assert!(upper.table(1).unwrap().rows.is_empty());
    }

    #[test]
    fn table_index_bounds() {
        let report = Report::from_json(r#"{"dataTable":[{"id":"1","row":[1,2,3]}]}"#).unwrap();
        assert!(matches!(
            report.table(0),
            Err(Error::TableIndex { index: 0, count: 1 })
        ));
        assert!(matches!(
            report.table(2),
            Err(Error::TableIndex { index: 2, count: 1 })
        ));
        assert!(matches!(
            report.clone().into_table(2),
            Err(Error::TableIndex { index: 2, count: 1 })
        ));
        assert_eq!(report.into_table(1).unwrap().id, "1");

        let empty = Report::default();
        assert!(matches!(
            empty.table(1),
            Err(Error::TableIndex { index: 1, count: 0 })
        ));
    }

    #[test]
    fn json_round_trip() {
        let report = Report {
            data_set: DataSet {
                data_tables: vec![
                    DataTable {
                        id: "t1".into(),
                        rows: vec![json!({"a": 1}), json!({"a": 2})],
                    },
                    DataTable {
                        id: "t2".into(),
                        rows: vec![json!("x"), json!(null)],
                    },
                ],
            },
        };
        let encoded = serde_json::to_string(&report).unwrap();
        assert!(encoded.starts_with(r#"{"dataSet":{"dataTable":"#));
        assert_eq!(Report::from_json(&encoded).unwrap(), report);
    }

    #[test]
    fn malformed_body_is_deserialization_error() {
        let err = Report::from_json("<html>login required</html>").unwrap_err();
        match err {
            Error::Deserialization { body, .. } => assert!(body.contains("login required")),
            other => panic!("expected Deserialization, got {other:?}"),
        }

        let err = Report::from_json(r#"{"unexpected": true}"#).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn rows_as_typed() {
        #[derive(Debug, Deserialize)]
        struct Sale {
            #[serde(rename = "Region")]
            region: String,
            #[serde(rename = "Revenue")]
            revenue: f64,
        }

        let table = DataTable {
            id: "List1".into(),
            rows: vec![json!({"Region": "EMEA", "Revenue": 10.5})],
        };
        let rows: Vec<Sale> = table.rows_as().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region, "EMEA");
        assert!((rows[0].revenue - 10.5).abs() < f64::EPSILON);

        let bad: Result<Vec<u32>, _> = table.rows_as();
        assert!(matches!(bad, Err(Error::Deserialization { ref message, .. }) if message.contains("row 1")));
    }
}
