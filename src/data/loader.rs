use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{Array, ArrayRef, Float32Array, Int32Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use super::model::{Dataset, Interner, Observation, OptionalColumn, Table};

/// Extensions a dataset version may be stored under, in lookup order.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["csv", "parquet", "pq", "json"];

/// Columns every source must carry.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "region",
    "variables",
    "year",
    "val",
    "sector",
    "model",
    "scenario",
];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a projection dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one observation per line (primary format)
/// * `.parquet` – flat columns with the same names as the CSV header
/// * `.json`    – `[{ "region": "EU", "year": 2020, "val": 1.0, ... }, ...]`
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Raw record shared by all formats
// ---------------------------------------------------------------------------

/// One row before its categorical cells are interned.
#[derive(Debug, Deserialize)]
struct RawRecord {
    region: String,
    variables: String,
    year: i32,
    /// Empty cells are missing values.
    val: Option<f32>,
    sector: String,
    model: String,
    scenario: String,
    #[serde(default)]
    powertrain: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    construction_year: Option<String>,
}

impl RawRecord {
    fn into_observation(self, interner: &mut Interner) -> Observation {
        Observation {
            region: interner.intern(self.region.trim()),
            sector: interner.intern(self.sector.trim()),
            model: interner.intern(self.model.trim()),
            scenario: interner.intern(self.scenario.trim()),
            variables: interner.intern(self.variables.trim()),
            year: self.year,
            val: self.val.unwrap_or(f32::NAN),
            powertrain: interner.intern_opt(self.powertrain.as_deref()),
            size: interner.intern_opt(self.size.as_deref()),
            construction_year: interner.intern_opt(self.construction_year.as_deref()),
        }
    }
}

fn finish(columns: BTreeSet<OptionalColumn>, rows: Vec<Observation>) -> Dataset {
    Dataset::from_table(Table::new(columns, rows))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with at least the [`REQUIRED_COLUMNS`], optionally
/// `powertrain`, `size` and `construction_year`. Unknown columns are ignored.
fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            bail!("CSV missing '{required}' column");
        }
    }
    let columns: BTreeSet<OptionalColumn> = headers
        .iter()
        .filter_map(|h| OptionalColumn::from_name(h))
        .collect();

    let mut interner = Interner::default();
    let mut rows = Vec::new();

    for (row_no, result) in reader.deserialize::<RawRecord>().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.into_observation(&mut interner));
    }

    Ok(finish(columns, rows))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON. Optional dimension cells may be strings or
/// numbers; a dimension column counts as present when any record has it.
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut interner = Interner::default();
    let mut columns = BTreeSet::new();
    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        for column in OptionalColumn::ALL {
            if obj.contains_key(column.name()) {
                columns.insert(column);
            }
        }

        let record = RawRecord {
            region: json_required_text(obj, "region", i)?,
            variables: json_required_text(obj, "variables", i)?,
            year: json_year(obj, i)?,
            val: json_val(obj, i)?,
            sector: json_required_text(obj, "sector", i)?,
            model: json_required_text(obj, "model", i)?,
            scenario: json_required_text(obj, "scenario", i)?,
            powertrain: obj.get("powertrain").and_then(json_text),
            size: obj.get("size").and_then(json_text),
            construction_year: obj.get("construction_year").and_then(json_text),
        };
        rows.push(record.into_observation(&mut interner));
    }

    Ok(finish(columns, rows))
}

fn json_text(val: &JsonValue) -> Option<String> {
    match val {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_required_text(obj: &Map<String, JsonValue>, key: &str, row: usize) -> Result<String> {
    obj.get(key)
        .and_then(json_text)
        .with_context(|| format!("Row {row}: missing or invalid '{key}'"))
}

fn json_year(obj: &Map<String, JsonValue>, row: usize) -> Result<i32> {
    let year = match obj.get("year") {
        Some(JsonValue::Number(n)) => n.as_i64(),
        Some(JsonValue::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .with_context(|| format!("Row {row}: missing or invalid 'year'"))?;
    i32::try_from(year).with_context(|| format!("Row {row}: year {year} out of range"))
}

/// `null`, an absent key or an empty string is a missing value.
fn json_val(obj: &Map<String, JsonValue>, row: usize) -> Result<Option<f32>> {
    let val = match obj.get("val") {
        None | Some(JsonValue::Null) => return Ok(None),
        Some(JsonValue::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .with_context(|| format!("Row {row}: invalid 'val'"))?;
    Ok(Some(val as f32))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per field.
///
/// Categorical columns may be stored as Utf8, LargeUtf8 or dictionary
/// encoded; `year` as any integer and `val` as any float type, nulls meaning missing. Everything is
/// cast to Utf8 / Int32 / Float32 before rows are built.
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;

    let schema = builder.schema().clone();
    for required in REQUIRED_COLUMNS {
        if schema.index_of(required).is_err() {
            bail!("Parquet file missing '{required}' column");
        }
    }
    let columns: BTreeSet<OptionalColumn> = OptionalColumn::ALL
        .into_iter()
        .filter(|c| schema.index_of(c.name()).is_ok())
        .collect();

    let reader = builder.build().context("building parquet reader")?;

    let mut interner = Interner::default();
    let mut rows = Vec::new();
    let mut offset = 0usize;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;

        let region = cast_column(&batch, "region", &DataType::Utf8)?;
        let variables = cast_column(&batch, "variables", &DataType::Utf8)?;
        let sector = cast_column(&batch, "sector", &DataType::Utf8)?;
        let model = cast_column(&batch, "model", &DataType::Utf8)?;
        let scenario = cast_column(&batch, "scenario", &DataType::Utf8)?;
        let year = cast_column(&batch, "year", &DataType::Int32)?;
        let val = cast_column(&batch, "val", &DataType::Float32)?;

        let region = as_strings(&region, "region")?;
        let variables = as_strings(&variables, "variables")?;
        let sector = as_strings(&sector, "sector")?;
        let model = as_strings(&model, "model")?;
        let scenario = as_strings(&scenario, "scenario")?;
        let year = year
            .as_any()
            .downcast_ref::<Int32Array>()
            .context("expected Int32 'year' column")?;
        let val = val
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("expected Float32 'val' column")?;

        let mut dims = Vec::with_capacity(OptionalColumn::ALL.len());
        for column in OptionalColumn::ALL {
            let arr = if columns.contains(&column) {
                Some(cast_column(&batch, column.name(), &DataType::Utf8)?)
            } else {
                None
            };
            dims.push(arr);
        }
        let dim_strings = dims
            .iter()
            .zip(OptionalColumn::ALL)
            .map(|(arr, column)| arr.as_ref().map(|a| as_strings(a, column.name())).transpose())
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            let abs_row = offset + row;
            if year.is_null(row) {
                bail!("Row {abs_row}: null 'year'");
            }
            let optional = |idx: usize| -> Option<String> {
                dim_strings[idx]
                    .and_then(|arr| string_at(arr, row))
                    .map(str::to_string)
            };
            let record = RawRecord {
                region: required_string(region, row, abs_row, "region")?,
                variables: required_string(variables, row, abs_row, "variables")?,
                year: year.value(row),
                val: (!val.is_null(row)).then(|| val.value(row)),
                sector: required_string(sector, row, abs_row, "sector")?,
                model: required_string(model, row, abs_row, "model")?,
                scenario: required_string(scenario, row, abs_row, "scenario")?,
                powertrain: optional(0),
                size: optional(1),
                construction_year: optional(2),
            };
            rows.push(record.into_observation(&mut interner));
        }
        offset += batch.num_rows();
    }

    Ok(finish(columns, rows))
}

// -- Parquet / Arrow helpers --

fn cast_column(batch: &RecordBatch, name: &str, to: &DataType) -> Result<ArrayRef> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| anyhow!("Parquet file missing '{name}' column"))?;
    cast(batch.column(idx).as_ref(), to)
        .with_context(|| format!("casting column '{name}' to {to:?}"))
}

fn as_strings<'a>(arr: &'a ArrayRef, name: &str) -> Result<&'a StringArray> {
    arr.as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("expected Utf8 '{name}' column"))
}

fn string_at(arr: &StringArray, row: usize) -> Option<&str> {
    if arr.is_null(row) {
        None
    } else {
        Some(arr.value(row))
    }
}

fn required_string(arr: &StringArray, row: usize, abs_row: usize, name: &str) -> Result<String> {
    string_at(arr, row)
        .map(str::to_string)
        .with_context(|| format!("Row {abs_row}: null '{name}'"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::*;

    fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_with_optional_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "data.csv",
            "region,variables,year,val,sector,model,scenario,powertrain,size\n\
             EU,car-bev,2020,1.5,Transport: passenger cars,remind,SSP2-Base,BEV,Large\n\
             US,car-icev,2020,2.5,Transport: passenger cars,remind,SSP2-Base,,Small\n",
        );

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.table.has_column(OptionalColumn::Powertrain));
        assert!(ds.table.has_column(OptionalColumn::Size));
        assert!(!ds.table.has_column(OptionalColumn::ConstructionYear));

        let first = &ds.table.rows[0];
        assert_eq!(&*first.region, "EU");
        assert_eq!(first.year, 2020);
        assert_eq!(first.val, 1.5);
        assert_eq!(first.powertrain.as_deref(), Some("BEV"));
        assert_eq!(ds.table.rows[1].powertrain, None);
        // Categorical cells are shared between rows.
        assert!(Arc::ptr_eq(&ds.table.rows[0].sector, &ds.table.rows[1].sector));
    }

    #[test]
    fn csv_missing_required_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "data.csv",
            "region,variables,year,sector,model,scenario\nEU,pop,2020,Population,M,SSP2-Base\n",
        );
        let err = load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("'val'"));
    }

    #[test]
    fn csv_bad_year_names_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "data.csv",
            "region,variables,year,val,sector,model,scenario\n\
             EU,pop,2020,1,Population,M,SSP2-Base\n\
             EU,pop,soon,1,Population,M,SSP2-Base\n",
        );
        let err = load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("CSV row 1"));
    }

    #[test]
    fn csv_empty_value_is_missing_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "data.csv",
            "region,variables,year,val,sector,model,scenario\n\
             EU,pop,2020,4,Population,M,SSP2-RCP26\n\
             US,pop,2020,,Population,M,SSP2-RCP26\n",
        );
        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.table.rows[0].val, 4.0);
        assert!(ds.table.rows[1].val.is_nan());
    }

    #[test]
    fn json_null_value_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "data.json",
            r#"[{"region": "EU", "variables": "pop", "year": 2020, "val": null,
                 "sector": "Population", "model": "M", "scenario": "SSP2-RCP26"}]"#,
        );
        let ds = load_file(&path).unwrap();
        assert!(ds.table.rows[0].val.is_nan());
    }

    #[test]
    fn json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "data.json",
            r#"[
                {"region": "EU", "variables": "pop", "year": 2020, "val": 10,
                 "sector": "Population", "model": "M", "scenario": "SSP2-RCP26",
                 "construction_year": 2015},
                {"region": "US", "variables": "pop", "year": "2030", "val": 20.5,
                 "sector": "Population", "model": "M", "scenario": "SSP2-RCP26"}
            ]"#,
        );
        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.table.has_column(OptionalColumn::ConstructionYear));
        assert_eq!(ds.table.rows[0].construction_year.as_deref(), Some("2015"));
        assert_eq!(ds.table.rows[1].year, 2030);
        assert_eq!(ds.table.rows[1].val, 20.5);
    }

    #[test]
    fn unsupported_extension() {
        let err = load_file(Path::new("data.xlsx")).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file extension: .xlsx");
    }

    #[test]
    fn parquet_roundtrip_from_arrow_batch() {
        use arrow::array::{Float64Array, Int64Array};
        use arrow::datatypes::{Field, Schema};
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("region", DataType::Utf8, false),
            Field::new("variables", DataType::Utf8, false),
            Field::new("year", DataType::Int64, false),
            Field::new("val", DataType::Float64, false),
            Field::new("sector", DataType::Utf8, false),
            Field::new("model", DataType::Utf8, false),
            Field::new("scenario", DataType::Utf8, false),
            Field::new("powertrain", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["EU", "World"])),
                Arc::new(StringArray::from(vec!["truck", "truck"])),
                Arc::new(Int64Array::from(vec![2020, 2030])),
                Arc::new(Float64Array::from(vec![1.0, 4.0])),
                Arc::new(StringArray::from(vec!["Transport: freight"; 2])),
                Arc::new(StringArray::from(vec!["image"; 2])),
                Arc::new(StringArray::from(vec!["SSP1-RCP19"; 2])),
                Arc::new(StringArray::from(vec![Some("FCEV"), None])),
            ],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.table.has_column(OptionalColumn::Powertrain));
        assert_eq!(ds.table.rows[1].year, 2030);
        assert_eq!(ds.table.rows[1].val, 4.0);
        assert_eq!(ds.table.rows[0].powertrain.as_deref(), Some("FCEV"));
        assert_eq!(ds.table.rows[1].powertrain, None);
    }
}
