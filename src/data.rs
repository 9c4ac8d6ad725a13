use memmap2::Mmap;
use std::{
    collections::HashMap,
    fmt,
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    config::{DataConfig, DatasetConfig},
    error::{LoadError, RenderError},
};

pub const STEP_COLUMN: &str = "step";
pub const POSITION_COLUMNS: [&str; 3] = ["xi", "yi", "zi"];
pub const BOUNDS_COLUMNS: [&str; 6] = ["xlo", "xhi", "ylo", "yhi", "zlo", "zhi"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quantity {
    Vx,
    Vy,
    Syy,
    Entropy,
}

impl Quantity {
    /// Pane order.
    pub const ALL: [Quantity; 4] = [Quantity::Vx, Quantity::Vy, Quantity::Syy, Quantity::Entropy];

    pub fn label(self) -> &'static str {
        match self {
            Quantity::Vx => "Vx",
            Quantity::Vy => "Vy",
            Quantity::Syy => "Syy",
            Quantity::Entropy => "S",
        }
    }

    /// Field column in the exported snapshot csv.
    pub fn column(self) -> &'static str {
        self.label()
    }

    pub fn index(self) -> usize {
        match self {
            Quantity::Vx => 0,
            Quantity::Vy => 1,
            Quantity::Syy => 2,
            Quantity::Entropy => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        })
    }
}

/// Inclusive step range spanned by the loaded data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepRange {
    pub min: i64,
    pub max: i64,
}

impl StepRange {
    pub fn clamp(&self, step: i64) -> i64 {
        step.clamp(self.min, self.max)
    }

    pub fn contains(&self, step: i64) -> bool {
        (self.min..=self.max).contains(&step)
    }

    pub fn len(&self) -> u64 {
        self.max.abs_diff(self.min).saturating_add(1)
    }

    fn union(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(Self {
                min: a.min.min(b.min),
                max: a.max.max(b.max),
            }),
            (a, None) => a,
            (None, b) => b,
        }
    }

    fn of_steps(steps: impl IntoIterator<Item = i64>) -> Option<Self> {
        steps.into_iter().fold(None, |acc, s| {
            Self::union(acc, Some(Self { min: s, max: s }))
        })
    }
}

/// Memory-mapped csv file with header-resolved columns.
struct CsvSource {
    path: PathBuf,
    mmap: Mmap,
}

impl CsvSource {
    fn open(path: &Path) -> Result<Self, LoadError> {
        let io_err = |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        if file.metadata().map_err(io_err)?.len() == 0 {
            return Err(LoadError::Empty {
                path: path.to_path_buf(),
            });
        }
        let mmap = unsafe { Mmap::map(&file).map_err(io_err)? };
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    fn csv_err(&self, source: csv::Error) -> LoadError {
        LoadError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    /// Calls `f(record_no, fields)` with the requested columns in order.
    fn for_each_record<const N: usize>(
        &self,
        columns: [&str; N],
        mut f: impl FnMut(u64, [&str; N]) -> Result<(), LoadError>,
    ) -> Result<(), LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(&self.mmap[..]);
        let headers = reader.headers().map_err(|e| self.csv_err(e))?.clone();
        let mut idx = [0usize; N];
        for (slot, name) in idx.iter_mut().zip(columns) {
            *slot = headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| LoadError::MissingColumn {
                    path: self.path.clone(),
                    column: name.to_string(),
                })?;
        }

        let mut record = csv::StringRecord::new();
        let mut n = 0u64;
        while reader.read_record(&mut record).map_err(|e| self.csv_err(e))? {
            n += 1;
            let fields = idx.map(|i| record.get(i).unwrap_or(""));
            f(n, fields)?;
        }
        Ok(())
    }

    fn bad_value(&self, column: &str, record: u64, value: &str) -> LoadError {
        LoadError::BadValue {
            path: self.path.clone(),
            column: column.to_string(),
            record,
            value: value.to_string(),
        }
    }

    fn parse_step(&self, record: u64, raw: &str) -> Result<i64, LoadError> {
        if let Ok(v) = raw.parse::<i64>() {
            return Ok(v);
        }
        // Some exports write integral steps as floats ("12.0").
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as i64),
            _ => Err(self.bad_value(STEP_COLUMN, record, raw)),
        }
    }

    fn parse_f64(&self, column: &str, record: u64, raw: &str) -> Result<f64, LoadError> {
        raw.parse::<f64>()
            .map_err(|_| self.bad_value(column, record, raw))
    }
}

/// One physical quantity, all steps, stored column-wise.
#[derive(Debug, Clone)]
pub struct SnapshotTable {
    pub quantity: Quantity,
    steps: Vec<i64>,
    positions: Vec<[f32; 3]>,
    values: Vec<f32>,
    step_index: HashMap<i64, Vec<u32>>,
}

impl SnapshotTable {
    pub fn load(path: &Path, quantity: Quantity) -> Result<Self, LoadError> {
        let src = CsvSource::open(path)?;
        let field = quantity.column();
        let columns = [
            STEP_COLUMN,
            POSITION_COLUMNS[0],
            POSITION_COLUMNS[1],
            POSITION_COLUMNS[2],
            field,
        ];
        let mut rows = Vec::new();
        src.for_each_record(columns, |n, [step, xi, yi, zi, value]| {
            let step = src.parse_step(n, step)?;
            let pos = [
                src.parse_f64(POSITION_COLUMNS[0], n, xi)? as f32,
                src.parse_f64(POSITION_COLUMNS[1], n, yi)? as f32,
                src.parse_f64(POSITION_COLUMNS[2], n, zi)? as f32,
            ];
            // Blank field cells are missing values, not malformed rows.
            let value = if value.is_empty() {
                f32::NAN
            } else {
                src.parse_f64(field, n, value)? as f32
            };
            rows.push((step, pos, value));
            Ok(())
        })?;

        let table = Self::from_rows(quantity, rows);
        tracing::debug!(
            path = %path.display(),
            quantity = quantity.label(),
            rows = table.len(),
            steps = table.step_index.len(),
            "loaded snapshot table"
        );
        Ok(table)
    }

    pub fn from_rows(quantity: Quantity, rows: impl IntoIterator<Item = (i64, [f32; 3], f32)>) -> Self {
        let mut steps = Vec::new();
        let mut positions = Vec::new();
        let mut values = Vec::new();
        let mut step_index: HashMap<i64, Vec<u32>> = HashMap::new();
        for (i, (step, pos, value)) in rows.into_iter().enumerate() {
            steps.push(step);
            positions.push(pos);
            values.push(value);
            step_index.entry(step).or_default().push(i as u32);
        }
        Self {
            quantity,
            steps,
            positions,
            values,
            step_index,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Row ids whose step equals `step` exactly, in file order.
    pub fn rows_for_step(&self, step: i64) -> &[u32] {
        self.step_index.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn position(&self, row: u32) -> [f32; 3] {
        self.positions[row as usize]
    }

    pub fn value(&self, row: u32) -> f32 {
        self.values[row as usize]
    }

    pub fn step_range(&self) -> Option<StepRange> {
        StepRange::of_steps(self.step_index.keys().copied())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundsRow {
    pub step: i64,
    pub xlo: f64,
    pub xhi: f64,
    pub ylo: f64,
    pub yhi: f64,
    pub zlo: f64,
    pub zhi: f64,
}

impl BoundsRow {
    pub fn span(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::X => (self.xlo, self.xhi),
            Axis::Y => (self.ylo, self.yhi),
            Axis::Z => (self.zlo, self.zhi),
        }
    }

    /// Domain extents `hi - lo` per axis.
    pub fn dims(&self) -> Result<[f64; 3], RenderError> {
        let mut out = [0.0; 3];
        for (slot, axis) in out.iter_mut().zip(Axis::ALL) {
            let (lo, hi) = self.span(axis);
            let d = hi - lo;
            if !(d.is_finite() && d >= 0.0) {
                return Err(RenderError::DataIntegrity {
                    step: self.step,
                    axis,
                    lo,
                    hi,
                });
            }
            *slot = d;
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoundsTable {
    rows: Vec<BoundsRow>,
    by_step: HashMap<i64, usize>,
    duplicates: usize,
}

impl BoundsTable {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let src = CsvSource::open(path)?;
        let columns = [
            STEP_COLUMN,
            BOUNDS_COLUMNS[0],
            BOUNDS_COLUMNS[1],
            BOUNDS_COLUMNS[2],
            BOUNDS_COLUMNS[3],
            BOUNDS_COLUMNS[4],
            BOUNDS_COLUMNS[5],
        ];
        let mut rows = Vec::new();
        src.for_each_record(columns, |n, [step, xlo, xhi, ylo, yhi, zlo, zhi]| {
            rows.push(BoundsRow {
                step: src.parse_step(n, step)?,
                xlo: src.parse_f64(BOUNDS_COLUMNS[0], n, xlo)?,
                xhi: src.parse_f64(BOUNDS_COLUMNS[1], n, xhi)?,
                ylo: src.parse_f64(BOUNDS_COLUMNS[2], n, ylo)?,
                yhi: src.parse_f64(BOUNDS_COLUMNS[3], n, yhi)?,
                zlo: src.parse_f64(BOUNDS_COLUMNS[4], n, zlo)?,
                zhi: src.parse_f64(BOUNDS_COLUMNS[5], n, zhi)?,
            });
            Ok(())
        })?;

        let table = Self::from_rows(rows);
        if table.duplicate_count() > 0 {
            tracing::warn!(
                path = %path.display(),
                duplicates = table.duplicate_count(),
                "bounding-box table repeats steps; first row per step wins"
            );
        }
        tracing::debug!(path = %path.display(), rows = table.rows.len(), "loaded bounds table");
        Ok(table)
    }

    pub fn from_rows(rows: impl IntoIterator<Item = BoundsRow>) -> Self {
        let rows: Vec<BoundsRow> = rows.into_iter().collect();
        let mut by_step = HashMap::with_capacity(rows.len());
        let mut duplicates = 0;
        for (i, row) in rows.iter().enumerate() {
            if by_step.contains_key(&row.step) {
                duplicates += 1;
            } else {
                by_step.insert(row.step, i);
            }
        }
        Self {
            rows,
            by_step,
            duplicates,
        }
    }

    /// First row recorded for `step`.
    pub fn get(&self, step: i64) -> Option<&BoundsRow> {
        self.by_step.get(&step).map(|&i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }

    pub fn step_range(&self) -> Option<StepRange> {
        StepRange::of_steps(self.by_step.keys().copied())
    }
}

/// Four quantity tables that share a step domain.
#[derive(Debug)]
pub struct Dataset {
    pub name: String,
    pub label: String,
    tables: [Arc<SnapshotTable>; 4],
}

impl Dataset {
    pub fn new(name: impl Into<String>, label: impl Into<String>, tables: [Arc<SnapshotTable>; 4]) -> Self {
        debug_assert!(Quantity::ALL
            .iter()
            .zip(&tables)
            .all(|(q, t)| t.quantity == *q));
        Self {
            name: name.into(),
            label: label.into(),
            tables,
        }
    }

    /// Loads all four tables or nothing. Tables already in `shared` (keyed by
    /// resolved path) are reused.
    fn load(
        cfg: &DatasetConfig,
        data: &DataConfig,
        shared: &mut HashMap<PathBuf, Arc<SnapshotTable>>,
    ) -> Result<Self, LoadError> {
        let mut table = |quantity: Quantity, path: &Path| -> Result<Arc<SnapshotTable>, LoadError> {
            let path = data.resolve(path);
            if let Some(t) = shared.get(&path).filter(|t| t.quantity == quantity) {
                return Ok(t.clone());
            }
            let t = Arc::new(SnapshotTable::load(&path, quantity)?);
            if t.is_empty() {
                tracing::warn!(path = %path.display(), "snapshot table has no rows");
            }
            shared.insert(path, t.clone());
            Ok(t)
        };
        let tables = [
            table(Quantity::Vx, &cfg.vx)?,
            table(Quantity::Vy, &cfg.vy)?,
            table(Quantity::Syy, &cfg.syy)?,
            table(Quantity::Entropy, &cfg.ent)?,
        ];
        Ok(Self::new(&cfg.name, cfg.display_label(), tables))
    }

    pub fn table(&self, quantity: Quantity) -> &SnapshotTable {
        &self.tables[quantity.index()]
    }

    pub fn step_range(&self) -> Option<StepRange> {
        self.tables
            .iter()
            .fold(None, |acc, t| StepRange::union(acc, t.step_range()))
    }
}

/// Everything the viewer reads, loaded once at startup.
#[derive(Debug)]
pub struct DataStore {
    bounds: BoundsTable,
    datasets: Vec<Arc<Dataset>>,
    step_range: StepRange,
}

impl DataStore {
    pub fn load(config: &DataConfig) -> Result<Self, LoadError> {
        let bounds_path = config.resolve(&config.bounds);
        let bounds = BoundsTable::load(&bounds_path)?;

        let mut shared = HashMap::new();
        let mut datasets = Vec::new();
        for cfg in &config.datasets {
            match Dataset::load(cfg, config, &mut shared) {
                Ok(ds) => {
                    tracing::info!(dataset = %ds.name, "dataset ready");
                    datasets.push(ds);
                }
                Err(err) => {
                    tracing::error!(dataset = %cfg.name, error = %err, "dataset unavailable");
                }
            }
        }
        Self::from_parts(bounds, datasets)
    }

    pub fn from_parts(bounds: BoundsTable, datasets: Vec<Dataset>) -> Result<Self, LoadError> {
        if datasets.is_empty() {
            return Err(LoadError::NoDatasets);
        }
        if bounds.is_empty() {
            tracing::warn!("bounding-box table has no rows; no step can be rendered");
        }
        let range = datasets
            .iter()
            .fold(bounds.step_range(), |acc, ds| StepRange::union(acc, ds.step_range()));
        let step_range = range.unwrap_or_else(|| {
            tracing::warn!("loaded tables contain no rows");
            StepRange { min: 0, max: 0 }
        });
        Ok(Self {
            bounds,
            datasets: datasets.into_iter().map(Arc::new).collect(),
            step_range,
        })
    }

    pub fn dataset(&self, name: &str) -> Option<&Arc<Dataset>> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn datasets(&self) -> &[Arc<Dataset>] {
        &self.datasets
    }

    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.iter().map(|d| d.name.as_str())
    }

    pub fn default_dataset(&self) -> &Arc<Dataset> {
        &self.datasets[0]
    }

    pub fn bounds(&self) -> &BoundsTable {
        &self.bounds
    }

    pub fn step_range(&self) -> StepRange {
        self.step_range
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn snapshot_csv(field: &str, rows: &[(i64, f32)]) -> String {
        let mut s = format!("step,xi,yi,zi,{field}\n");
        for (i, (step, v)) in rows.iter().enumerate() {
            s.push_str(&format!("{step},{i}.0,{}.5,-{i}.25,{v}\n", i * 2));
        }
        s
    }

    #[test]
    fn snapshot_load_indexes_steps_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "vx.csv",
            &snapshot_csv("Vx", &[(3, 0.5), (4, 1.0), (3, -2.0), (3, 7.0)]),
        );
        let t = SnapshotTable::load(&path, Quantity::Vx).unwrap();
        assert_eq!(t.len(), 4);
        assert_eq!(t.rows_for_step(3), &[0, 2, 3]);
        assert_eq!(t.rows_for_step(4), &[1]);
        assert!(t.rows_for_step(5).is_empty());
        assert_eq!(t.position(2), [2.0, 4.5, -2.25]);
        assert_eq!(t.value(2), -2.0);
        assert_eq!(t.step_range(), Some(StepRange { min: 3, max: 4 }));
    }

    #[test]
    fn snapshot_columns_resolve_by_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "ent.csv",
            ",S,zi,yi,xi,step,extra\n0, 0.25 ,3,2,1,12.0,x\n1,,6,5,4,12,y\n",
        );
        let t = SnapshotTable::load(&path, Quantity::Entropy).unwrap();
        assert_eq!(t.rows_for_step(12), &[0, 1]);
        assert_eq!(t.position(0), [1.0, 2.0, 3.0]);
        assert_eq!(t.value(0), 0.25);
        assert!(t.value(1).is_nan());
    }

    #[test]
    fn snapshot_missing_field_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "vy.csv", &snapshot_csv("Vx", &[(1, 0.0)]));
        let err = SnapshotTable::load(&path, Quantity::Vy).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column, .. } if column == "Vy"));
    }

    #[test]
    fn snapshot_rejects_bad_numbers_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "syy.csv", "step,xi,yi,zi,Syy\n1,0,zero,0,1\n");
        let err = SnapshotTable::load(&path, Quantity::Syy).unwrap_err();
        assert!(matches!(err, LoadError::BadValue { ref column, record: 1, .. } if column == "yi"));

        let err = SnapshotTable::load(&dir.path().join("absent.csv"), Quantity::Syy).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));

        let empty = write_file(dir.path(), "empty.csv", "");
        let err = SnapshotTable::load(&empty, Quantity::Syy).unwrap_err();
        assert!(matches!(err, LoadError::Empty { .. }));
    }

    #[test]
    fn bounds_first_row_wins_on_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "bounds.csv",
            "step,xlo,xhi,ylo,yhi,zlo,zhi\n5,0,10,0,20,0,100\n6,0,1,0,1,0,1\n5,0,99,0,99,0,99\n",
        );
        let b = BoundsTable::load(&path).unwrap();
        assert_eq!(b.len(), 3);
        assert_eq!(b.duplicate_count(), 1);
        assert_eq!(b.get(5).unwrap().xhi, 10.0);
        assert!(b.get(7).is_none());
        assert_eq!(b.step_range(), Some(StepRange { min: 5, max: 6 }));
    }

    #[test]
    fn bounds_dims_flag_inverted_axis() {
        let row = BoundsRow {
            step: 9,
            xlo: 0.0,
            xhi: 4.0,
            ylo: 3.0,
            yhi: 1.0,
            zlo: 0.0,
            zhi: 1.0,
        };
        let err = row.dims().unwrap_err();
        assert_eq!(
            err,
            RenderError::DataIntegrity {
                step: 9,
                axis: Axis::Y,
                lo: 3.0,
                hi: 1.0
            }
        );

        let flat = BoundsRow { yhi: 3.0, ..row };
        assert_eq!(flat.dims().unwrap(), [4.0, 0.0, 1.0]);
    }

    #[test]
    fn bounds_dims_reject_undefined_extents() {
        let row = BoundsRow {
            step: 2,
            xlo: 0.0,
            xhi: 10.0,
            ylo: 0.0,
            yhi: 20.0,
            zlo: 0.0,
            zhi: 100.0,
        };
        let nan = BoundsRow { zhi: f64::NAN, ..row }.dims().unwrap_err();
        assert!(matches!(nan, RenderError::DataIntegrity { step: 2, axis: Axis::Z, .. }));

        let inf = BoundsRow { xhi: f64::INFINITY, ..row }.dims().unwrap_err();
        assert!(matches!(inf, RenderError::DataIntegrity { axis: Axis::X, .. }));

        let both = BoundsRow {
            ylo: f64::NEG_INFINITY,
            yhi: f64::INFINITY,
            ..row
        };
        assert!(matches!(
            both.dims().unwrap_err(),
            RenderError::DataIntegrity { axis: Axis::Y, .. }
        ));
    }

    #[test]
    fn bounds_load_parses_inf_but_dims_refuse_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "bounds.csv",
            "step,xlo,xhi,ylo,yhi,zlo,zhi\n4,0,inf,0,1,0,1\n",
        );
        let b = BoundsTable::load(&path).unwrap();
        let err = b.get(4).unwrap().dims().unwrap_err();
        assert!(matches!(err, RenderError::DataIntegrity { step: 4, axis: Axis::X, .. }));
    }

    #[test]
    fn bounds_missing_column_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "bounds.csv",
            "step,xlo,xhi,ylo,yhi,zlo\n1,0,1,0,1,0\n",
        );
        let err = BoundsTable::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column, .. } if column == "zhi"));
    }

    #[test]
    fn step_range_len_survives_extreme_steps() {
        let full = StepRange { min: i64::MIN, max: i64::MAX };
        assert_eq!(full.len(), u64::MAX);
        let wide = StepRange { min: -1, max: i64::MAX };
        assert_eq!(wide.len(), 1 << 63 | 1);
        assert_eq!(StepRange { min: -3, max: 4 }.len(), 8);
    }

    fn write_dataset(dir: &Path, prefix: &str, ent: &str) -> DatasetConfig {
        for (q, file) in [("Vx", "vx"), ("Vy", "vy"), ("Syy", "syy")] {
            write_file(
                dir,
                &format!("{prefix}_{file}.csv"),
                &snapshot_csv(q, &[(1, 0.1), (2, 0.2)]),
            );
        }
        DatasetConfig {
            name: prefix.to_string(),
            label: String::new(),
            vx: format!("{prefix}_vx.csv").into(),
            vy: format!("{prefix}_vy.csv").into(),
            syy: format!("{prefix}_syy.csv").into(),
            ent: ent.into(),
        }
    }

    #[test]
    fn store_skips_datasets_that_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "bounds.csv",
            "step,xlo,xhi,ylo,yhi,zlo,zhi\n1,0,1,0,1,0,1\n2,0,1,0,1,0,1\n",
        );
        write_file(dir.path(), "ent.csv", &snapshot_csv("S", &[(1, 0.0), (3, 1.0)]));
        let good = write_dataset(dir.path(), "a", "ent.csv");
        let mut broken = write_dataset(dir.path(), "b", "ent.csv");
        broken.syy = "missing.csv".into();
        let shared_ent = write_dataset(dir.path(), "c", "ent.csv");

        let config = DataConfig {
            base_dir: dir.path().to_path_buf(),
            bounds: "bounds.csv".into(),
            datasets: vec![good, broken, shared_ent],
        };
        let store = DataStore::load(&config).unwrap();
        let names: Vec<_> = store.dataset_names().collect();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(store.default_dataset().name, "a");
        assert_eq!(store.dataset("a").unwrap().label, "a");
        assert!(store.dataset("b").is_none());
        assert_eq!(store.step_range(), StepRange { min: 1, max: 3 });

        let a = store.dataset("a").unwrap().table(Quantity::Entropy) as *const SnapshotTable;
        let c = store.dataset("c").unwrap().table(Quantity::Entropy) as *const SnapshotTable;
        assert_eq!(a, c, "entropy table is shared between datasets");
    }

    #[test]
    fn store_requires_bounds_and_a_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let config = DataConfig {
            base_dir: dir.path().to_path_buf(),
            bounds: "bounds.csv".into(),
            datasets: Vec::new(),
        };
        assert!(matches!(DataStore::load(&config), Err(LoadError::Io { .. })));

        write_file(dir.path(), "bounds.csv", "step,xlo,xhi,ylo,yhi,zlo,zhi\n");
        assert!(matches!(DataStore::load(&config), Err(LoadError::NoDatasets)));
    }

    #[test]
    fn step_range_clamps() {
        let r = StepRange { min: 1, max: 89 };
        assert_eq!(r.clamp(0), 1);
        assert_eq!(r.clamp(120), 89);
        assert!(r.contains(45));
        assert_eq!(r.len(), 89);
    }
}
