use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Float32Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
struct Row {
    region: String,
    variables: String,
    year: i32,
    val: f32,
    sector: String,
    model: String,
    scenario: String,
    powertrain: Option<String>,
    size: Option<String>,
    construction_year: Option<String>,
}

#[derive(Serialize)]
struct SectorInfo {
    label: &'static str,
    expl_text: &'static str,
}

#[derive(Serialize)]
struct Description {
    name: &'static str,
    description: &'static str,
}

/// Minimal deterministic PRNG (xoshiro256**). The sample files only need
/// reproducible jitter, so a fixed seed here keeps them byte-identical across
/// runs without pulling a random-number crate into the build.
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Uniform in [0, 1).
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Multiplicative jitter around 1.0.
    fn jitter(&mut self, spread: f64) -> f64 {
        1.0 + (self.next_f64() - 0.5) * 2.0 * spread
    }
}

const REGIONS: [(&str, f64); 4] = [("EUR", 1.0), ("USA", 0.8), ("CHA", 2.2), ("IND", 2.0)];
const YEARS: [i32; 5] = [2020, 2030, 2040, 2050, 2060];
const POPULATION: &str = "Population";
const EMISSIONS: &str = "Carbon dioxide emissions";
const EFFICIENCY: &str = "Electricity - Efficiency";
const CARS: &str = "Transport: passenger cars";

const MODELS: [&str; 2] = ["remind", "image"];
const SCENARIOS: [(&str, f64); 3] = [("SSP2-Base", 1.0), ("SSP2-RCP26", 0.6), ("SSP1-RCP19", 0.35)];

#[allow(clippy::too_many_arguments)]
fn row(
    region: &str,
    variables: &str,
    year: i32,
    val: f64,
    sector: &str,
    model: &str,
    scenario: &str,
    transport: Option<(&str, &str, i32)>,
) -> Row {
    Row {
        region: region.to_string(),
        variables: variables.to_string(),
        year,
        val: val as f32,
        sector: sector.to_string(),
        model: model.to_string(),
        scenario: scenario.to_string(),
        powertrain: transport.map(|(p, _, _)| p.to_string()),
        size: transport.map(|(_, s, _)| s.to_string()),
        construction_year: transport.map(|(_, _, c)| c.to_string()),
    }
}

fn generate_rows(rng: &mut SimpleRng) -> Vec<Row> {
    let mut rows = Vec::new();
    for model in MODELS {
        for (scenario, ambition) in SCENARIOS {
            for (t, &year) in YEARS.iter().enumerate() {
                let progress = t as f64 / (YEARS.len() - 1) as f64;

                let mut push = |region: &str, variables: &str, val: f64, sector: &str| {
                    rows.push(row(region, variables, year, val, sector, model, scenario, None));
                };

                // Population: World present but zero in 2020, absent later.
                if year == 2020 {
                    push("World", "population", 0.0, POPULATION);
                }
                for (region, scale) in REGIONS {
                    let pop = 400.0 * scale * (1.0 + 0.1 * progress) * rng.jitter(0.02);
                    push(region, "population", pop, POPULATION);
                }

                // Emissions decline with mitigation ambition; no World rows at all.
                for (region, scale) in REGIONS {
                    let co2 = 3.0 * scale * (1.0 - (1.0 - ambition) * progress) * rng.jitter(0.05);
                    push(region, "CO2", co2, EMISSIONS);
                    // A gas that is always zero and should never be charted.
                    push(region, "SF6", 0.0, EMISSIONS);
                }

                // Plant efficiency, drawn as lines.
                for (region, _) in REGIONS {
                    for (tech, base) in [("coal", 0.38), ("natural gas", 0.52)] {
                        let eff = (base + 0.05 * progress) * rng.jitter(0.01);
                        push(region, tech, eff, EFFICIENCY);
                    }
                }

                // Passenger cars by powertrain and size.
                for (region, scale) in REGIONS {
                    for (powertrain, share) in [
                        ("ICEV-p", 1.0 - progress * (1.0 - ambition * 0.5)),
                        ("BEV", progress * (1.2 - ambition)),
                        ("PHEV-p", 0.1 + 0.1 * progress),
                    ] {
                        for (size, size_share) in [("Small", 0.4), ("Large", 0.6)] {
                            let km = 500.0 * scale * share.max(0.0) * size_share * rng.jitter(0.03);
                            let name = format!("{powertrain}, {size}");
                            rows.push(row(
                                region,
                                &name,
                                year,
                                km,
                                CARS,
                                model,
                                scenario,
                                Some((powertrain, size, year)),
                            ));
                        }
                    }
                }
            }
        }
    }
    rows
}

fn write_csv(path: &Path, rows: &[Row]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for r in rows {
        writer.serialize(r)?;
    }
    writer.flush()?;
    Ok(())
}

fn string_column(rows: &[Row], f: impl Fn(&Row) -> Option<&str>) -> StringArray {
    rows.iter().map(f).collect()
}

fn write_parquet(path: &Path, rows: &[Row]) -> anyhow::Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("region", DataType::Utf8, false),
        Field::new("variables", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("val", DataType::Float32, false),
        Field::new("sector", DataType::Utf8, false),
        Field::new("model", DataType::Utf8, false),
        Field::new("scenario", DataType::Utf8, false),
        Field::new("powertrain", DataType::Utf8, true),
        Field::new("size", DataType::Utf8, true),
        Field::new("construction_year", DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(string_column(rows, |r| Some(r.region.as_str()))),
            Arc::new(string_column(rows, |r| Some(r.variables.as_str()))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
            Arc::new(Float32Array::from_iter_values(rows.iter().map(|r| r.val))),
            Arc::new(string_column(rows, |r| Some(r.sector.as_str()))),
            Arc::new(string_column(rows, |r| Some(r.model.as_str()))),
            Arc::new(string_column(rows, |r| Some(r.scenario.as_str()))),
            Arc::new(string_column(rows, |r| r.powertrain.as_deref())),
            Arc::new(string_column(rows, |r| r.size.as_deref())),
            Arc::new(string_column(rows, |r| r.construction_year.as_deref())),
        ],
    )?;

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_metadata(dir: &Path) -> anyhow::Result<()> {
    let units: BTreeMap<&str, SectorInfo> = BTreeMap::from([
        (POPULATION, SectorInfo {
            label: "million people",
            expl_text: "Number of inhabitants per region.",
        }),
        (EMISSIONS, SectorInfo {
            label: "Gt CO2/year",
            expl_text: "Annual fossil CO2 emissions.",
        }),
        (EFFICIENCY, SectorInfo {
            label: "net conversion efficiency",
            expl_text: "Average efficiency of thermal power plants.",
        }),
        (CARS, SectorInfo {
            label: "billion vehicle-km",
            expl_text: "Distance driven by passenger cars, by powertrain.",
        }),
    ]);
    let ssp: BTreeMap<&str, Description> = BTreeMap::from([
        ("SSP1", Description {
            name: "SSP1 - Sustainability",
            description: "Low challenges to mitigation and adaptation.",
        }),
        ("SSP2", Description {
            name: "SSP2 - Middle of the road",
            description: "Social, economic and technological trends follow historical patterns.",
        }),
    ]);
    let rcp: BTreeMap<&str, Description> = BTreeMap::from([
        ("Base", Description {
            name: "Baseline",
            description: "No additional climate policy.",
        }),
        ("RCP26", Description {
            name: "RCP 2.6",
            description: "Radiative forcing of 2.6 W/m2 by 2100.",
        }),
        ("RCP19", Description {
            name: "RCP 1.9",
            description: "Radiative forcing of 1.9 W/m2 by 2100.",
        }),
    ]);

    std::fs::write(dir.join("units.yaml"), serde_yaml::to_string(&units)?)?;
    std::fs::write(dir.join("ssp_descriptions.yaml"), serde_yaml::to_string(&ssp)?)?;
    std::fs::write(dir.join("rcp_descriptions.yaml"), serde_yaml::to_string(&rcp)?)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    let out_dir = Path::new(&out_dir);
    std::fs::create_dir_all(out_dir)?;

    let mut rng = SimpleRng::new(42);
    let rows = generate_rows(&mut rng);

    write_csv(&out_dir.join("structured_data.csv"), &rows)?;

    // A second version under a punctuated key, in Parquet.
    let mut rng = SimpleRng::new(7);
    let rows_v2 = generate_rows(&mut rng);
    write_parquet(&out_dir.join("structured_data_('3.10', '2.1').parquet"), &rows_v2)?;

    write_metadata(out_dir)?;

    println!(
        "Wrote {} + {} observations and metadata to {}",
        rows.len(),
        rows_v2.len(),
        out_dir.display()
    );
    Ok(())
}
