use anyhow::{Context, Result};
use ndarray::Array4;
use opencv::{
    core::{Mat, Size, CV_32FC3},
    imgproc,
    prelude::*,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use crate::pipeline::PoseModel;

use super::keypoint::Keypoint;

/// 姿勢推定モデルの固定入力解像度
pub const POSE_INPUT_SIZE: i32 = 256;

/// 人物クロップ1枚からキーポイント列を推定する検出器。
///
/// モデルはデコード済みキーポイント [1, 18, 3] (x, y, score) を出力する
/// ONNXアーティファクトを想定。座標はクロップ内の正規化値。
pub struct PoseEstimator {
    session: Session,
}

impl PoseEstimator {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load pose estimation ONNX model")?;

        Ok(Self { session })
    }

    /// BGR Mat → NCHW [1, 3, 256, 256] テンソルに変換
    ///
    /// モデルはBGR・0〜255入力で学習されているため、チャネル入れ替えも
    /// 正規化も行わない。
    fn preprocess(&self, crop: &Mat) -> Result<Array4<f32>> {
        let size = POSE_INPUT_SIZE;

        let mut resized = Mat::default();
        imgproc::resize(
            crop,
            &mut resized,
            Size::new(size, size),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut float_mat = Mat::default();
        resized.convert_to(&mut float_mat, CV_32FC3, 1.0, 0.0)?;

        let s = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, s, s));
        let data = float_mat.data_bytes()?;
        let step = float_mat.mat_step().get(0);
        for y in 0..s {
            let row_ptr = unsafe {
                std::slice::from_raw_parts(data.as_ptr().add(y * step) as *const f32, s * 3)
            };
            for x in 0..s {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = row_ptr[x * 3 + c];
                }
            }
        }

        Ok(tensor)
    }
}

impl PoseModel for PoseEstimator {
    fn estimate(&mut self, crop: &Mat) -> Result<Vec<Keypoint>> {
        let input = self.preprocess(crop)?;

        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["image" => input_tensor])
            .context("Pose estimation inference failed")?;

        let output: ndarray::ArrayViewD<f32> = outputs["keypoints"]
            .try_extract_array()
            .context("Failed to extract pose estimation output")?;

        Ok(parse_keypoints(&output))
    }
}

/// モデル出力 [1, K, 3] (x, y, score) をキーポイント列に変換
pub fn parse_keypoints(output: &ndarray::ArrayViewD<'_, f32>) -> Vec<Keypoint> {
    let count = output.shape()[1];
    (0..count)
        .map(|i| {
            Keypoint::new(
                output[[0, i, 0]],
                output[[0, i, 1]],
                output[[0, i, 2]],
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_parse_keypoints() {
        let raw = Array3::from_shape_vec(
            (1, 2, 3),
            vec![0.4, 0.9, 0.8, 0.5, 0.85, 0.7],
        )
        .unwrap();
        let dyn_view = raw.view().into_dyn();

        let keypoints = parse_keypoints(&dyn_view);
        assert_eq!(keypoints.len(), 2);
        assert_eq!(keypoints[0], Keypoint::new(0.4, 0.9, 0.8));
        assert_eq!(keypoints[1], Keypoint::new(0.5, 0.85, 0.7));
    }

    #[test]
    fn test_parse_keypoints_empty() {
        let raw = Array3::<f32>::zeros((1, 0, 3));
        let dyn_view = raw.view().into_dyn();
        assert!(parse_keypoints(&dyn_view).is_empty());
    }
}
