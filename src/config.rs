use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{color, error::ConfigError};

pub const CONFIG_ENV: &str = "SNAPVIZ_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "snapviz.toml";

pub const DEFAULT_MARKER_SIZE: f32 = 3.5;
/// Translucency keeps dense clouds readable.
pub const DEFAULT_MARKER_OPACITY: f32 = 0.35;
pub const DEFAULT_CAMERA_UP: [f32; 3] = [0.0, 1.0, 0.0];
pub const DEFAULT_CAMERA_CENTER: [f32; 3] = [0.0, 0.0, 0.0];
pub const DEFAULT_CAMERA_EYE: [f32; 3] = [0.0, 5.0, 250.0];
/// Extents are divided by these per axis: in-plane axes are halved
/// relative to the extension axis.
pub const DEFAULT_ASPECT_DIVISORS: [f64; 3] = [2.0, 2.0, 1.0];
pub const DEFAULT_COLORSCALE: &str = "viridis";
pub const DEFAULT_FOV_Y_DEG: f32 = 45.0;
pub const DEFAULT_BACKGROUND: [u8; 3] = [236, 240, 241];
pub const DEFAULT_STEPS_PER_SECOND: f32 = 4.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    /// Shown under the title, above the step slider.
    pub hint: String,
    pub notes: Vec<String>,
    pub data: DataConfig,
    pub view: ViewConfig,
    pub window: WindowConfig,
    pub playback: PlaybackConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Interactive 3D plots for De = 9 during the extension: velocity (Vx, Vy), \
                    Stress (Syy), and crystal clusters"
                .to_string(),
            hint: "To update the visualization, please control the time slider (min = 2.25 and \
                   max = 3 in Hencky strain, in which nucleation seems to be appeared)"
                .to_string(),
            notes: vec![
                "Use the dataset selector to choose the filtered subset, e.g. '10%' keeps \
                 only the top 10% of points in vx, vy and syy."
                    .to_string(),
                "De and Hencky strain is reported for the C1000 relaxation time (will be \
                 corrected later)"
                    .to_string(),
                "Drag inside a plot to orbit, scroll to zoom.".to_string(),
            ],
            data: DataConfig::default(),
            view: ViewConfig::default(),
            window: WindowConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Relative table paths resolve against this directory.
    pub base_dir: PathBuf,
    pub bounds: PathBuf,
    pub datasets: Vec<DatasetConfig>,
}

impl Default for DataConfig {
    fn default() -> Self {
        let subset = |name: &str, label: &str, pct: &str| DatasetConfig {
            name: name.to_string(),
            label: label.to_string(),
            vx: format!("filtered{pct}percent_vx_13e6to17e6.csv").into(),
            vy: format!("filtered{pct}percent_vy_13e6to17e6.csv").into(),
            syy: format!("filtered{pct}percent_syy_13e6to17e6.csv").into(),
            ent: "filtered_ent_13e6to17e6.csv".into(),
        };
        Self {
            base_dir: PathBuf::from("."),
            bounds: PathBuf::from("d0_dxdydz.csv"),
            datasets: vec![
                subset("10percent", "10% Filtered Data", "10"),
                subset("20percent", "20% Filtered Data", "20"),
            ],
        }
    }
}

impl DataConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub vx: PathBuf,
    pub vy: PathBuf,
    pub syy: PathBuf,
    pub ent: PathBuf,
}

impl DatasetConfig {
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraPose {
    pub up: [f32; 3],
    pub center: [f32; 3],
    pub eye: [f32; 3],
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            up: DEFAULT_CAMERA_UP,
            center: DEFAULT_CAMERA_CENTER,
            eye: DEFAULT_CAMERA_EYE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub marker_size: f32,
    pub marker_opacity: f32,
    pub camera: CameraPose,
    pub aspect_divisors: [f64; 3],
    pub colorscale: String,
    pub fov_y_deg: f32,
    pub background: [u8; 3],
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            marker_size: DEFAULT_MARKER_SIZE,
            marker_opacity: DEFAULT_MARKER_OPACITY,
            camera: CameraPose::default(),
            aspect_divisors: DEFAULT_ASPECT_DIVISORS,
            colorscale: DEFAULT_COLORSCALE.to_string(),
            fov_y_deg: DEFAULT_FOV_Y_DEG,
            background: DEFAULT_BACKGROUND,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1400.0,
            height: 900.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub steps_per_second: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            steps_per_second: DEFAULT_STEPS_PER_SECOND,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// `$SNAPVIZ_CONFIG`, then `./snapviz.toml`, then built-in defaults.
    pub fn discover() -> Result<(Self, Option<PathBuf>), ConfigError> {
        let explicit = std::env::var_os(CONFIG_ENV)
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);
        if let Some(path) = explicit {
            let config = Self::load(&path)?;
            return Ok((config, Some(path)));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            let config = Self::load(&local)?;
            return Ok((config, Some(local)));
        }
        Ok((Self::default(), None))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if color::gradient_named(&self.view.colorscale).is_none() {
            return Err(ConfigError::UnknownColorscale(self.view.colorscale.clone()));
        }
        let divisors = self.view.aspect_divisors;
        if !divisors.iter().all(|d| d.is_finite() && *d > 0.0) {
            return Err(ConfigError::BadAspectDivisors(divisors));
        }
        let mut seen = std::collections::HashSet::new();
        for ds in &self.data.datasets {
            if !seen.insert(ds.name.as_str()) {
                return Err(ConfigError::DuplicateDataset(ds.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_view() {
        let view = ViewConfig::default();
        assert_eq!(view.marker_size, 3.5);
        assert_eq!(view.marker_opacity, 0.35);
        assert_eq!(view.camera.eye, [0.0, 5.0, 250.0]);
        assert_eq!(view.camera.up, [0.0, 1.0, 0.0]);
        assert_eq!(view.aspect_divisors, [2.0, 2.0, 1.0]);

        let data = DataConfig::default();
        let names: Vec<_> = data.datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["10percent", "20percent"]);
        assert_eq!(data.datasets[1].vx, PathBuf::from("filtered20percent_vx_13e6to17e6.csv"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let text = r#"
            title = "run 7"

            [data]
            base_dir = "/data/run7"
            bounds = "bounds.csv"

            [[data.datasets]]
            name = "all"
            vx = "vx.csv"
            vy = "vy.csv"
            syy = "syy.csv"
            ent = "ent.csv"

            [view]
            marker_opacity = 0.5
            colorscale = "plasma"
        "#;
        let cfg = AppConfig::from_toml_str(text, Path::new("inline.toml")).unwrap();
        assert_eq!(cfg.title, "run 7");
        assert_eq!(cfg.view.marker_opacity, 0.5);
        assert_eq!(cfg.view.marker_size, DEFAULT_MARKER_SIZE);
        assert_eq!(cfg.data.datasets.len(), 1);
        assert_eq!(cfg.data.datasets[0].display_label(), "all");
        assert_eq!(
            cfg.data.resolve(&cfg.data.datasets[0].vx),
            PathBuf::from("/data/run7/vx.csv")
        );
        assert_eq!(cfg.playback.steps_per_second, DEFAULT_STEPS_PER_SECOND);
    }

    #[test]
    fn rejects_unknown_colorscale() {
        let err = AppConfig::from_toml_str("[view]\ncolorscale = \"rainbow9000\"", Path::new("x"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownColorscale(name) if name == "rainbow9000"));
    }

    #[test]
    fn rejects_degenerate_aspect_divisors() {
        for text in [
            "[view]\naspect_divisors = [0.0, -2.0, 1.0]",
            "[view]\naspect_divisors = [2.0, 2.0, -1.0]",
            "[view]\naspect_divisors = [2.0, inf, 1.0]",
            "[view]\naspect_divisors = [nan, 2.0, 1.0]",
        ] {
            let err = AppConfig::from_toml_str(text, Path::new("x")).unwrap_err();
            assert!(matches!(err, ConfigError::BadAspectDivisors(_)), "{text}");
        }
        let cfg = AppConfig::from_toml_str("[view]\naspect_divisors = [4.0, 4.0, 0.5]", Path::new("x"))
            .unwrap();
        assert_eq!(cfg.view.aspect_divisors, [4.0, 4.0, 0.5]);
    }

    #[test]
    fn default_text_carries_strain_notes() {
        let cfg = AppConfig::default();
        assert!(cfg.hint.contains("min = 2.25 and max = 3 in Hencky strain"));
        assert!(cfg
            .notes
            .iter()
            .any(|n| n.starts_with("De and Hencky strain is reported for the C1000 relaxation time")));
    }

    #[test]
    fn rejects_duplicate_dataset_names() {
        let text = r#"
            [[data.datasets]]
            name = "a"
            vx = "vx.csv"
            vy = "vy.csv"
            syy = "syy.csv"
            ent = "ent.csv"

            [[data.datasets]]
            name = "a"
            vx = "vx.csv"
            vy = "vy.csv"
            syy = "syy.csv"
            ent = "ent.csv"
        "#;
        let err = AppConfig::from_toml_str(text, Path::new("x")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateDataset(name) if name == "a"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
