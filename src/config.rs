use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// カメラデバイス番号
    #[serde(default)]
    pub index: i32,
    /// 要求解像度（省略時はデバイス任せ）
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// 人物検出モデルのパス
    #[serde(default = "default_person_model")]
    pub person: String,
    /// 姿勢推定モデルのパス
    #[serde(default = "default_pose_model")]
    pub pose: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    /// 検出信頼度の閾値。これ以下の検出は無視される
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    /// プレビューサーバーの待ち受けアドレス
    #[serde(default = "default_ui_addr")]
    pub addr: String,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: i32,
}

fn default_person_model() -> String { "models/person-detection.onnx".to_string() }
fn default_pose_model() -> String { "models/pose-estimation.onnx".to_string() }
fn default_alert_threshold() -> f32 { 0.5 }
fn default_ui_addr() -> String { "127.0.0.1:8080".to_string() }
fn default_jpeg_quality() -> i32 { 80 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self { index: 0, width: None, height: None }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { person: default_person_model(), pose: default_pose_model() }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self { alert_threshold: default_alert_threshold() }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { addr: default_ui_addr(), jpeg_quality: default_jpeg_quality() }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルが無い・壊れている場合はデフォルトで起動する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "failed to load {}: {e:#}; using defaults",
                    path.as_ref().display()
                );
                Config::default()
            }
        }
    }
}
