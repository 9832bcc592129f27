use anyhow::{Context, Result};

use crate::config::ModelConfig;
use crate::detect::PersonDetector;
use crate::pose::PoseEstimator;

/// セッション全体で使い回す2つのモデルハンドル
pub struct Models {
    pub person: PersonDetector,
    pub pose: PoseEstimator,
}

/// 人物検出・姿勢推定の両モデルを読み込む。
///
/// どちらかが欠けていれば起動エラー。代替モデルは無いので
/// リトライも部分動作もしない。
pub fn load_models(config: &ModelConfig) -> Result<Models> {
    let person = PersonDetector::new(&config.person)
        .with_context(|| format!("person detection model: {}", config.person))?;
    let pose = PoseEstimator::new(&config.pose)
        .with_context(|| format!("pose estimation model: {}", config.pose))?;
    Ok(Models { person, pose })
}
