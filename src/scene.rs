//! Builds the four scatter descriptors shown for one step of one dataset.
//!
//! Output depends only on `(step, dataset)` and the loaded tables, so results
//! can be memoized with [`RenderCache`].

use colorous::Gradient;
use glam::{Mat4, Vec3};
use std::{collections::HashMap, sync::Arc};

use crate::{
    color::{gradient_map, ValueRange},
    config::{CameraPose, ViewConfig},
    data::{DataStore, Quantity, SnapshotTable},
    error::RenderError,
};

/// Scene box proportions (plotly `aspectratio` in manual mode).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AspectRatio {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AspectRatio {
    pub fn from_dims(dims: [f64; 3], divisors: [f64; 3]) -> Self {
        Self {
            x: dims[0] / divisors[0],
            y: dims[1] / divisors[1],
            z: dims[2] / divisors[2],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerStyle {
    pub size: f32,
    pub opacity: f32,
}

/// Per-axis min/max of the plotted points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent3 {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Extent3 {
    fn of(points: &[[f32; 3]]) -> Option<Self> {
        let first = *points.first()?;
        Some(points.iter().fold(
            Self {
                min: first,
                max: first,
            },
            |mut e, p| {
                for a in 0..3 {
                    e.min[a] = e.min[a].min(p[a]);
                    e.max[a] = e.max[a].max(p[a]);
                }
                e
            },
        ))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScatterFigure {
    pub quantity: Quantity,
    pub title: String,
    pub positions: Vec<[f32; 3]>,
    pub values: Vec<f32>,
    /// Packed rgba8, one per point.
    pub colors: Vec<u32>,
    pub color_range: Option<ValueRange>,
    pub marker: MarkerStyle,
    pub camera: CameraPose,
    pub aspect: AspectRatio,
    pub extent: Option<Extent3>,
}

impl ScatterFigure {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Maps data coordinates into the scene box: each axis' data extent is
    /// centered and stretched to span `[-aspect, aspect]`.
    pub fn scene_transform(&self) -> Mat4 {
        let Some(extent) = self.extent else {
            return Mat4::IDENTITY;
        };
        let aspect = [self.aspect.x as f32, self.aspect.y as f32, self.aspect.z as f32];
        let mut scale = [1.0f32; 3];
        let mut mid = [0.0f32; 3];
        for a in 0..3 {
            let span = extent.max[a] - extent.min[a];
            mid[a] = 0.5 * (extent.min[a] + extent.max[a]);
            // A flat axis has no extent to stretch; leave it at unit scale.
            scale[a] = if span > 1e-12 { 2.0 * aspect[a] / span } else { 1.0 };
        }
        Mat4::from_scale(Vec3::from(scale)) * Mat4::from_translation(-Vec3::from(mid))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepFigures {
    pub step: i64,
    pub dataset: String,
    pub aspect: AspectRatio,
    /// In [`Quantity::ALL`] order.
    pub figures: [ScatterFigure; 4],
}

impl StepFigures {
    pub fn figure(&self, quantity: Quantity) -> &ScatterFigure {
        &self.figures[quantity.index()]
    }
}

pub struct Renderer<'a> {
    store: &'a DataStore,
    view: &'a ViewConfig,
    gradient: Gradient,
}

impl<'a> Renderer<'a> {
    /// `gradient` is the resolved `view.colorscale`.
    pub fn new(store: &'a DataStore, view: &'a ViewConfig, gradient: Gradient) -> Self {
        Self {
            store,
            view,
            gradient,
        }
    }

    pub fn render(&self, step: i64, dataset: &str) -> Result<StepFigures, RenderError> {
        let ds = self
            .store
            .dataset(dataset)
            .ok_or_else(|| RenderError::UnknownDataset {
                name: dataset.to_string(),
            })?;

        let bounds = self
            .store
            .bounds()
            .get(step)
            .ok_or(RenderError::MissingBounds { step })?;
        let aspect = AspectRatio::from_dims(bounds.dims()?, self.view.aspect_divisors);

        let figures = Quantity::ALL.map(|q| self.scatter(ds.table(q), step, aspect));
        Ok(StepFigures {
            step,
            dataset: ds.name.clone(),
            aspect,
            figures,
        })
    }

    fn scatter(&self, table: &SnapshotTable, step: i64, aspect: AspectRatio) -> ScatterFigure {
        let rows = table.rows_for_step(step);
        let positions: Vec<[f32; 3]> = rows.iter().map(|&r| table.position(r)).collect();
        let values: Vec<f32> = rows.iter().map(|&r| table.value(r)).collect();

        let color_range = ValueRange::of(&values);
        let colors = match color_range {
            Some(range) => gradient_map(&values, range, &self.gradient),
            // No finite value to anchor the scale; everything maps to "missing".
            None => gradient_map(&values, ValueRange { min: 0.0, max: 1.0 }, &self.gradient),
        };

        ScatterFigure {
            quantity: table.quantity,
            title: format!("{} for Step: {}", table.quantity.label(), step),
            extent: Extent3::of(&positions),
            positions,
            values,
            colors,
            color_range,
            marker: MarkerStyle {
                size: self.view.marker_size,
                opacity: self.view.marker_opacity,
            },
            camera: self.view.camera,
            aspect,
        }
    }
}

pub type RenderResult = Arc<Result<StepFigures, RenderError>>;

const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Memoizes render results by `(step, dataset)`. Cleared wholesale when full.
pub struct RenderCache {
    entries: HashMap<(i64, String), RenderResult>,
    capacity: usize,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl RenderCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_render(&mut self, renderer: &Renderer<'_>, step: i64, dataset: &str) -> RenderResult {
        if let Some(hit) = self.entries.get(&(step, dataset.to_string())) {
            return hit.clone();
        }
        if self.entries.len() >= self.capacity {
            self.entries.clear();
        }
        let result = Arc::new(renderer.render(step, dataset));
        if let Err(err) = result.as_ref() {
            tracing::warn!(step, dataset, error = %err, "step cannot be rendered");
        }
        self.entries.insert((step, dataset.to_string()), result.clone());
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
