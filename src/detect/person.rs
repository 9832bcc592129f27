use anyhow::{Context, Result};
use ndarray::Array4;
use opencv::{
    core::{Mat, Rect, Size, CV_32FC3},
    imgproc,
    prelude::*,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use crate::pipeline::PersonModel;

/// 人物検出モデルの固定入力解像度
pub const DETECTOR_INPUT_WIDTH: i32 = 640;
pub const DETECTOR_INPUT_HEIGHT: i32 = 480;

/// 正規化座標のバウンディングボックス（0.0〜1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxNorm {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoxNorm {
    /// フレーム実寸のピクセル矩形に変換する。
    ///
    /// 座標は[0,1]にクランプし、クランプ後に面積が無い・反転している
    /// ボックスはNone。
    pub fn to_pixel_rect(&self, frame_w: i32, frame_h: i32) -> Option<Rect> {
        let fw = frame_w as f32;
        let fh = frame_h as f32;
        let x0 = (self.xmin.clamp(0.0, 1.0) * fw) as i32;
        let y0 = (self.ymin.clamp(0.0, 1.0) * fh) as i32;
        let x1 = (self.xmax.clamp(0.0, 1.0) * fw) as i32;
        let y1 = (self.ymax.clamp(0.0, 1.0) * fh) as i32;

        let width = x1 - x0;
        let height = y1 - y0;
        if width < 1 || height < 1 {
            return None;
        }
        Some(Rect::new(x0, y0, width, height))
    }
}

/// 人物候補1件
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: u32,
    pub confidence: f32,
    pub bbox: BoxNorm,
}

/// SSD系モデルを使用した人物検出器。
///
/// 出力は [1, 1, N, 7] で、各行は
/// [image_id, label, confidence, xmin, ymin, xmax, ymax]。
pub struct PersonDetector {
    session: Session,
}

impl PersonDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load person detection ONNX model")?;
        Ok(Self { session })
    }

    /// BGR Mat → NCHW [1, 3, 480, 640] テンソルに変換
    ///
    /// モデルはBGR・0〜255入力。アスペクト比は無視してリサイズする
    /// （既知の忠実度ギャップ、参照実装と同じ挙動）。
    fn preprocess(&self, frame: &Mat) -> Result<Array4<f32>> {
        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            Size::new(DETECTOR_INPUT_WIDTH, DETECTOR_INPUT_HEIGHT),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut float_mat = Mat::default();
        resized.convert_to(&mut float_mat, CV_32FC3, 1.0, 0.0)?;

        let w = DETECTOR_INPUT_WIDTH as usize;
        let h = DETECTOR_INPUT_HEIGHT as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
        let data = float_mat.data_bytes()?;
        let step = float_mat.mat_step().get(0);
        for y in 0..h {
            let row_ptr = unsafe {
                std::slice::from_raw_parts(data.as_ptr().add(y * step) as *const f32, w * 3)
            };
            for x in 0..w {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = row_ptr[x * 3 + c];
                }
            }
        }

        Ok(tensor)
    }
}

impl PersonModel for PersonDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>> {
        let input = self.preprocess(frame)?;

        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["image" => input_tensor])
            .context("Person detection inference failed")?;

        let output: ndarray::ArrayViewD<f32> = outputs["detection_out"]
            .try_extract_array()
            .context("Failed to extract person detection output")?;

        Ok(parse_detections(&output))
    }
}

/// モデル出力 [1, 1, N, 7] を検出リストに変換する。
///
/// image_id < 0 の行が終端マーカー。順序はモデルの出力順のまま
/// （信頼度でのソートは保証しない）。
pub fn parse_detections(output: &ndarray::ArrayViewD<'_, f32>) -> Vec<Detection> {
    let rows = output.shape()[2];
    let mut detections = Vec::new();

    for i in 0..rows {
        let image_id = output[[0, 0, i, 0]];
        if image_id < 0.0 {
            break;
        }
        detections.push(Detection {
            label: output[[0, 0, i, 1]] as u32,
            confidence: output[[0, 0, i, 2]],
            bbox: BoxNorm {
                xmin: output[[0, 0, i, 3]],
                ymin: output[[0, 0, i, 4]],
                xmax: output[[0, 0, i, 5]],
                ymax: output[[0, 0, i, 6]],
            },
        });
    }

    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4 as NdArray4;

    fn raw_output(rows: Vec<[f32; 7]>) -> NdArray4<f32> {
        let n = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        NdArray4::from_shape_vec((1, 1, n, 7), flat).unwrap()
    }

    #[test]
    fn test_parse_detections() {
        let raw = raw_output(vec![
            [0.0, 1.0, 0.9, 0.1, 0.2, 0.3, 0.4],
            [0.0, 1.0, 0.4, 0.5, 0.5, 0.7, 0.9],
        ]);
        let dyn_view = raw.view().into_dyn();

        let detections = parse_detections(&dyn_view);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, 1);
        assert!((detections[0].confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(
            detections[0].bbox,
            BoxNorm { xmin: 0.1, ymin: 0.2, xmax: 0.3, ymax: 0.4 }
        );
    }

    #[test]
    fn test_parse_detections_sentinel_row_terminates() {
        let raw = raw_output(vec![
            [0.0, 1.0, 0.9, 0.1, 0.2, 0.3, 0.4],
            [-1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.8, 0.5, 0.5, 0.7, 0.9],
        ]);
        let dyn_view = raw.view().into_dyn();

        let detections = parse_detections(&dyn_view);
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_to_pixel_rect() {
        let bbox = BoxNorm { xmin: 0.25, ymin: 0.25, xmax: 0.75, ymax: 0.75 };
        let rect = bbox.to_pixel_rect(640, 480).unwrap();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (160, 120, 320, 240));
    }

    #[test]
    fn test_to_pixel_rect_clamps_out_of_range() {
        let bbox = BoxNorm { xmin: -0.5, ymin: -0.1, xmax: 1.5, ymax: 0.5 };
        let rect = bbox.to_pixel_rect(640, 480).unwrap();
        assert_eq!((rect.x, rect.y), (0, 0));
        assert_eq!((rect.width, rect.height), (640, 240));
    }

    #[test]
    fn test_to_pixel_rect_inverted_is_none() {
        let bbox = BoxNorm { xmin: 0.8, ymin: 0.2, xmax: 0.2, ymax: 0.8 };
        assert!(bbox.to_pixel_rect(640, 480).is_none());
    }

    #[test]
    fn test_to_pixel_rect_zero_area_is_none() {
        let bbox = BoxNorm { xmin: 0.5, ymin: 0.2, xmax: 0.5, ymax: 0.8 };
        assert!(bbox.to_pixel_rect(640, 480).is_none());
    }
}
