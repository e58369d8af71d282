//! JSON configuration for the command-line front-end.
//!
//! The flat integer keys keep the names and defaults of the legacy settings
//! file; everything else is grouped under `stages`, `match` and `limits`.
//! Missing keys fall back to their defaults.

use glyphtrigger::{
    load_template, DetectionPlan, DevicePreference, LoopLimits, MatchParams, Point, Rectangle,
    Stage, TieBreak, TriggerResult, DEFAULT_THRESHOLD, PIXEL_TOLERANCE,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendConfig {
    Gpu,
    Cpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePreferenceConfig {
    GpuThenCpu,
    GpuOnly,
    CpuOnly,
}

impl From<DevicePreferenceConfig> for DevicePreference {
    fn from(value: DevicePreferenceConfig) -> Self {
        match value {
            DevicePreferenceConfig::GpuThenCpu => DevicePreference::GpuThenCpu,
            DevicePreferenceConfig::GpuOnly => DevicePreference::GpuOnly,
            DevicePreferenceConfig::CpuOnly => DevicePreference::CpuOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakConfig {
    FirstFound,
    RowMajor,
}

impl From<TieBreakConfig> for TieBreak {
    fn from(value: TieBreakConfig) -> Self {
        match value {
            TieBreakConfig::FirstFound => TieBreak::FirstFound,
            TieBreakConfig::RowMajor => TieBreak::RowMajor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaConfig {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub template_path: String,
    /// Overrides the detect area for this stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<AreaConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfigJson {
    pub backend: BackendConfig,
    pub device: DevicePreferenceConfig,
    pub threshold: f32,
    pub tolerance: f32,
    pub tie_break: TieBreakConfig,
    /// Host backend only: spread candidates over the thread pool.
    pub parallel: bool,
}

impl Default for MatchConfigJson {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Gpu,
            device: DevicePreferenceConfig::GpuThenCpu,
            threshold: DEFAULT_THRESHOLD,
            tolerance: PIXEL_TOLERANCE,
            tie_break: TieBreakConfig::RowMajor,
            parallel: true,
        }
    }
}

impl MatchConfigJson {
    pub fn params(&self) -> MatchParams {
        MatchParams {
            threshold: self.threshold,
            tolerance: self.tolerance,
            tie_break: self.tie_break.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_attempts: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub poll_interval_ms: u64,
}

impl From<&LimitsConfig> for LoopLimits {
    fn from(value: &LimitsConfig) -> Self {
        LoopLimits {
            max_attempts: value.max_attempts,
            timeout: value.timeout_ms.map(Duration::from_millis),
            poll_interval: Duration::from_millis(value.poll_interval_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor_number: usize,
    pub detect_area_x: i32,
    pub detect_area_y: i32,
    pub detect_area_width: u32,
    pub detect_area_height: u32,
    pub mouse_click_x: i32,
    pub mouse_click_y: i32,
    pub action_delay_ms: u64,
    pub stages: Vec<StageConfig>,
    #[serde(rename = "match")]
    pub match_cfg: MatchConfigJson,
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_number: 0,
            detect_area_x: 375,
            detect_area_y: 160,
            detect_area_width: 550,
            detect_area_height: 950,
            mouse_click_x: 2500,
            mouse_click_y: 1100,
            action_delay_ms: 100,
            stages: vec![
                StageConfig {
                    name: "target_a".into(),
                    template_path: "target_a.png".into(),
                    area: None,
                },
                StageConfig {
                    name: "target_b".into(),
                    template_path: "target_b.png".into(),
                    area: None,
                },
            ],
            match_cfg: MatchConfigJson::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn detect_area(&self) -> TriggerResult<Rectangle> {
        Rectangle::new(
            self.detect_area_x,
            self.detect_area_y,
            self.detect_area_width,
            self.detect_area_height,
        )
    }

    pub fn click_point(&self) -> Point {
        Point::new(self.mouse_click_x, self.mouse_click_y)
    }

    /// Loads every stage template and assembles the detection plan.
    ///
    /// Relative template paths resolve against `base_dir`.
    pub fn build_plan(&self, base_dir: &Path) -> TriggerResult<DetectionPlan> {
        let default_area = self.detect_area()?;
        let stages = self
            .stages
            .iter()
            .map(|stage| {
                let region = match stage.area {
                    Some(a) => Rectangle::new(a.x, a.y, a.width, a.height)?,
                    None => default_area,
                };
                let template = load_template(base_dir.join(&stage.template_path))?;
                Ok(Stage::new(stage.name.clone(), template, region))
            })
            .collect::<TriggerResult<Vec<_>>>()?;

        Ok(DetectionPlan {
            monitor_index: self.monitor_number,
            stages,
            click_point: self.click_point(),
            params: self.match_cfg.params(),
            limits: (&self.limits).into(),
        })
    }
}
