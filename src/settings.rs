use std::path::{Path, PathBuf};

use anyhow::Context;
use glam::Mat3;
use serde::Deserialize;
use thiserror::Error;

/// The shading strategies the renderer can produce a frame with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderMode {
    Deferred,
    Forward,
    DebugDepthCubemap,
    DebugIrradiance,
    DebugBrdf,
}

impl RenderMode {
    /// All render modes ordered by their selection index.
    pub const ALL: [RenderMode; 5] = [
        RenderMode::Deferred,
        RenderMode::Forward,
        RenderMode::DebugDepthCubemap,
        RenderMode::DebugIrradiance,
        RenderMode::DebugBrdf,
    ];

    /// Get the selection index of this render mode.
    pub fn index(self) -> u32 {
        match self {
            RenderMode::Deferred => 0,
            RenderMode::Forward => 1,
            RenderMode::DebugDepthCubemap => 2,
            RenderMode::DebugIrradiance => 3,
            RenderMode::DebugBrdf => 4,
        }
    }
}

impl TryFrom<u32> for RenderMode {
    type Error = UnknownRenderMode;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or(UnknownRenderMode(index))
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RenderMode::Deferred => "deferred",
            RenderMode::Forward => "forward",
            RenderMode::DebugDepthCubemap => "debug depth cubemap",
            RenderMode::DebugIrradiance => "debug irradiance",
            RenderMode::DebugBrdf => "debug brdf lut",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("render mode {0} does not exist")]
pub struct UnknownRenderMode(pub u32);

/// Named 3x3 convolution kernels applied during post-processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelPreset {
    Identity,
    Sharpen,
    Blur,
    EdgeDetect,
}

impl KernelPreset {
    pub const ALL: [KernelPreset; 4] = [
        KernelPreset::Identity,
        KernelPreset::Sharpen,
        KernelPreset::Blur,
        KernelPreset::EdgeDetect,
    ];

    /// Get the kernel weights. Column `i` row `j` weighs the texel at offset
    /// `(i - 1, j - 1)`.
    pub fn kernel(self) -> Mat3 {
        match self {
            KernelPreset::Identity => {
                Mat3::from_cols_array(&[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0])
            }
            KernelPreset::Sharpen => {
                Mat3::from_cols_array(&[-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0])
            }
            KernelPreset::Blur => Mat3::from_cols_array(&[
                1.0 / 16.0,
                2.0 / 16.0,
                1.0 / 16.0,
                2.0 / 16.0,
                4.0 / 16.0,
                2.0 / 16.0,
                1.0 / 16.0,
                2.0 / 16.0,
                1.0 / 16.0,
            ]),
            KernelPreset::EdgeDetect => {
                Mat3::from_cols_array(&[1.0, 1.0, 1.0, 1.0, -8.0, 1.0, 1.0, 1.0, 1.0])
            }
        }
    }

    /// Get the preset that follows this one, wrapping around at the end.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

/// Values that can change from frame to frame without recreating any GPU
/// resources. A copy is handed to the renderer each frame.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    /// Index of the render mode to draw with, see `RenderMode::try_from`.
    pub render_mode: u32,
    exposure: f32,
    gamma: f32,
    pub kernel: Mat3,
    /// Draw every vertex normal of the scene as a line.
    pub visualize_normals: bool,
}

impl FrameSettings {
    pub const MIN_EXPOSURE: f32 = 0.0;
    pub const MAX_EXPOSURE: f32 = 10.0;
    pub const MIN_GAMMA: f32 = 0.1;

    /// Resolve the selected render mode.
    pub fn mode(&self) -> Result<RenderMode, UnknownRenderMode> {
        RenderMode::try_from(self.render_mode)
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode.index();
    }

    pub fn exposure(&self) -> f32 {
        self.exposure.clamp(Self::MIN_EXPOSURE, Self::MAX_EXPOSURE)
    }

    /// Set the HDR exposure, clamped to `[MIN_EXPOSURE, MAX_EXPOSURE]`.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure.clamp(Self::MIN_EXPOSURE, Self::MAX_EXPOSURE);
    }

    pub fn gamma(&self) -> f32 {
        self.gamma.max(Self::MIN_GAMMA)
    }

    pub fn set_gamma(&mut self, gamma: f32) {
        self.gamma = gamma.max(Self::MIN_GAMMA);
    }
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Deferred.index(),
            exposure: 1.0,
            gamma: 2.2,
            kernel: KernelPreset::Identity.kernel(),
            visualize_normals: false,
        }
    }
}

/// Startup configuration, optionally read from a JSON file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub window_width: u32,
    pub window_height: u32,
    /// Equirectangular Radiance HDR image used as the environment. A
    /// procedural sky is generated when this is not set.
    pub panorama_path: Option<PathBuf>,
    /// OBJ model placed at the origin of the demo scene.
    pub model_path: Option<PathBuf>,
    pub model_scale: f32,
    pub frame: FrameSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 600,
            panorama_path: None,
            model_path: Some(PathBuf::from("models/icosahedron.obj")),
            model_scale: 0.5,
            frame: FrameSettings::default(),
        }
    }
}

impl RenderSettings {
    /// Parse settings from JSON text. Missing fields take their defaults.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("failed to parse render settings")
    }

    /// Load settings from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;

        Self::from_json(&text).with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Load settings from the first command line argument, or use the defaults
    /// when no argument was given.
    pub fn from_args<I: Iterator<Item = String>>(mut args: I) -> anyhow::Result<Self> {
        // Skip the program name.
        args.next();

        match args.next() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_mode_round_trips_through_index() {
        for mode in RenderMode::ALL {
            assert_eq!(Ok(mode), RenderMode::try_from(mode.index()));
        }
    }

    #[test]
    fn unknown_render_mode_is_an_error() {
        assert_eq!(Err(UnknownRenderMode(5)), RenderMode::try_from(5));
        assert_eq!(Err(UnknownRenderMode(42)), RenderMode::try_from(42));

        let settings = FrameSettings {
            render_mode: 9,
            ..Default::default()
        };

        assert_eq!(
            "render mode 9 does not exist",
            settings.mode().unwrap_err().to_string()
        );
    }

    #[test]
    fn normals_are_hidden_unless_enabled() {
        assert!(!FrameSettings::default().visualize_normals);

        let settings: RenderSettings =
            serde_json::from_str(r#"{ "frame": { "visualize_normals": true } }"#).unwrap();
        assert!(settings.frame.visualize_normals);
        assert_eq!(2.2, settings.frame.gamma());
    }

    #[test]
    fn exposure_is_clamped() {
        let mut settings = FrameSettings::default();

        settings.set_exposure(12.0);
        assert_eq!(10.0, settings.exposure());

        settings.set_exposure(-1.0);
        assert_eq!(0.0, settings.exposure());

        settings.set_exposure(2.5);
        assert_eq!(2.5, settings.exposure());
    }

    #[test]
    fn gamma_never_reaches_zero() {
        let mut settings = FrameSettings::default();
        settings.set_gamma(0.0);
        assert_eq!(FrameSettings::MIN_GAMMA, settings.gamma());
    }

    #[test]
    fn identity_kernel_only_weighs_center() {
        let k = KernelPreset::Identity.kernel();
        assert_eq!(1.0, k.col(1).y);
        assert_eq!(1.0, k.to_cols_array().iter().sum::<f32>());
    }

    #[test]
    fn blur_kernel_preserves_brightness() {
        let sum: f32 = KernelPreset::Blur.kernel().to_cols_array().iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn kernel_presets_cycle() {
        let mut preset = KernelPreset::Identity;

        for _ in 0..KernelPreset::ALL.len() {
            preset = preset.next();
        }

        assert_eq!(KernelPreset::Identity, preset);
    }

    #[test]
    fn parse_partial_settings_json() {
        let settings = RenderSettings::from_json(
            r#"{ "window_width": 1280, "frame": { "render_mode": 1, "exposure": 2.0 } }"#,
        )
        .unwrap();

        assert_eq!(1280, settings.window_width);
        assert_eq!(600, settings.window_height);
        assert_eq!(Ok(RenderMode::Forward), settings.frame.mode());
        assert_eq!(2.0, settings.frame.exposure());
        assert_eq!(2.2, settings.frame.gamma());
    }

    #[test]
    fn parse_kernel_from_json() {
        let settings = RenderSettings::from_json(
            r#"{ "frame": { "kernel": [0, 0, 0, 0, 2, 0, 0, 0, 0] } }"#,
        )
        .unwrap();

        assert_eq!(2.0, settings.frame.kernel.col(1).y);
    }

    #[test]
    fn malformed_settings_json_is_an_error() {
        assert!(RenderSettings::from_json("{ window_width: ").is_err());
    }

    #[test]
    fn missing_settings_file_is_an_error() {
        let args = ["lumen", "/definitely/not/a/real/settings.json"]
            .into_iter()
            .map(String::from);

        assert!(RenderSettings::from_args(args).is_err());
    }

    #[test]
    fn no_arguments_use_defaults() {
        let args = ["lumen"].into_iter().map(String::from);
        assert_eq!(
            RenderSettings::default(),
            RenderSettings::from_args(args).unwrap()
        );
    }
}
