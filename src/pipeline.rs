use anyhow::Result;
use opencv::{
    core::{Mat, Rect, Scalar},
    imgproc,
    prelude::*,
};

use crate::alert::AlertSink;
use crate::detect::Detection;
use crate::fall::is_fall;
use crate::pose::Keypoint;

/// 人物検出モデルの呼び出し口
pub trait PersonModel {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>>;
}

/// 姿勢推定モデルの呼び出し口
pub trait PoseModel {
    fn estimate(&mut self, crop: &Mat) -> Result<Vec<Keypoint>>;
}

/// 1フレーム処理の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// 描画した人物数（閾値通過分）
    pub persons: usize,
    /// うち転倒と判定した人数
    pub falls: usize,
}

const BOX_THICKNESS: i32 = 2;

fn box_color(fall: bool) -> Scalar {
    if fall {
        // BGR: 赤
        Scalar::new(0.0, 0.0, 255.0, 0.0)
    } else {
        // BGR: 緑
        Scalar::new(0.0, 255.0, 0.0, 0.0)
    }
}

fn draw_box(frame: &mut Mat, rect: Rect, fall: bool) -> Result<()> {
    imgproc::rectangle(frame, rect, box_color(fall), BOX_THICKNESS, imgproc::LINE_8, 0)?;
    Ok(())
}

/// 1フレームを処理する: 検出 → クロップ → 姿勢推定 → 転倒判定 → 描画。
///
/// フレームはその場で注釈付けされる。閾値以下の検出はクロップも推論も
/// 描画もしない。転倒が1人でもいればアラートをフレームにつき1回だけ送る。
pub fn process_frame(
    frame: &mut Mat,
    person: &mut dyn PersonModel,
    pose: &mut dyn PoseModel,
    threshold: f32,
    alert: &mut dyn AlertSink,
) -> Result<FrameReport> {
    let frame_w = frame.cols();
    let frame_h = frame.rows();

    let detections = person.detect(frame)?;

    let mut report = FrameReport::default();
    let mut fall_in_frame = false;

    for detection in &detections {
        if detection.confidence <= threshold {
            continue;
        }

        // ピクセル座標はリサイズ前のフレーム実寸で計算する。
        // 不正なボックスはスキップして残りの検出を処理する。
        let Some(rect) = detection.bbox.to_pixel_rect(frame_w, frame_h) else {
            log::debug!("skipping degenerate bbox: {:?}", detection.bbox);
            continue;
        };

        let crop = Mat::roi(frame, rect)?.try_clone()?;
        let keypoints = pose.estimate(&crop)?;
        let fall = is_fall(&keypoints);

        draw_box(frame, rect, fall)?;
        report.persons += 1;
        if fall {
            report.falls += 1;
            fall_in_frame = true;
        }
    }

    if fall_in_frame {
        alert.send_alert();
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoxNorm, Detection};
    use opencv::core::{Vec3b, CV_8UC3};

    struct StubPerson(Vec<Detection>);

    impl PersonModel for StubPerson {
        fn detect(&mut self, _frame: &Mat) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    struct StubPose {
        keypoints: Vec<Keypoint>,
        calls: usize,
    }

    impl StubPose {
        fn new(keypoints: Vec<Keypoint>) -> Self {
            Self { keypoints, calls: 0 }
        }
    }

    impl PoseModel for StubPose {
        fn estimate(&mut self, _crop: &Mat) -> Result<Vec<Keypoint>> {
            self.calls += 1;
            Ok(self.keypoints.clone())
        }
    }

    #[derive(Default)]
    struct CountingAlert {
        count: usize,
    }

    impl AlertSink for CountingAlert {
        fn send_alert(&mut self) {
            self.count += 1;
        }
    }

    fn blank_frame() -> Mat {
        Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn detection(confidence: f32, bbox: BoxNorm) -> Detection {
        Detection { label: 1, confidence, bbox }
    }

    fn centered_box() -> BoxNorm {
        BoxNorm { xmin: 0.25, ymin: 0.25, xmax: 0.75, ymax: 0.75 }
    }

    fn keypoints(head_y: f32, torso_y: f32) -> Vec<Keypoint> {
        vec![
            Keypoint::new(0.5, head_y, 0.9),
            Keypoint::new(0.5, torso_y, 0.9),
        ]
    }

    fn pixel(frame: &Mat, y: i32, x: i32) -> [u8; 3] {
        let px = frame.at_2d::<Vec3b>(y, x).unwrap();
        [px[0], px[1], px[2]]
    }

    #[test]
    fn test_fall_draws_red_box_and_alerts_once() {
        let mut frame = blank_frame();
        let mut person = StubPerson(vec![detection(0.9, centered_box())]);
        let mut pose = StubPose::new(keypoints(0.85, 0.82));
        let mut alert = CountingAlert::default();

        let report =
            process_frame(&mut frame, &mut person, &mut pose, 0.5, &mut alert).unwrap();

        assert_eq!(report, FrameReport { persons: 1, falls: 1 });
        assert_eq!(alert.count, 1);
        // 枠の左上角 (x=160, y=120) は赤 (BGR)
        assert_eq!(pixel(&frame, 120, 160), [0, 0, 255]);
        // 上辺の中央も赤
        assert_eq!(pixel(&frame, 120, 320), [0, 0, 255]);
    }

    #[test]
    fn test_no_fall_draws_green_box_without_alert() {
        let mut frame = blank_frame();
        let mut person = StubPerson(vec![detection(0.9, centered_box())]);
        let mut pose = StubPose::new(keypoints(0.3, 0.82));
        let mut alert = CountingAlert::default();

        let report =
            process_frame(&mut frame, &mut person, &mut pose, 0.5, &mut alert).unwrap();

        assert_eq!(report, FrameReport { persons: 1, falls: 0 });
        assert_eq!(alert.count, 0);
        assert_eq!(pixel(&frame, 120, 160), [0, 255, 0]);
    }

    #[test]
    fn test_below_threshold_is_not_cropped_or_drawn() {
        let mut frame = blank_frame();
        let before = frame.try_clone().unwrap();
        let mut person = StubPerson(vec![detection(0.3, centered_box())]);
        let mut pose = StubPose::new(keypoints(0.9, 0.9));
        let mut alert = CountingAlert::default();

        let report =
            process_frame(&mut frame, &mut person, &mut pose, 0.5, &mut alert).unwrap();

        assert_eq!(report, FrameReport::default());
        assert_eq!(pose.calls, 0);
        assert_eq!(alert.count, 0);
        assert_eq!(frame.data_bytes().unwrap(), before.data_bytes().unwrap());
    }

    #[test]
    fn test_empty_detections_leave_frame_untouched() {
        let mut frame = blank_frame();
        let before = frame.try_clone().unwrap();
        let mut person = StubPerson(vec![]);
        let mut pose = StubPose::new(keypoints(0.9, 0.9));
        let mut alert = CountingAlert::default();

        process_frame(&mut frame, &mut person, &mut pose, 0.5, &mut alert).unwrap();

        assert_eq!(pose.calls, 0);
        assert_eq!(alert.count, 0);
        assert_eq!(frame.data_bytes().unwrap(), before.data_bytes().unwrap());
    }

    #[test]
    fn test_multiple_fallers_alert_once() {
        let mut frame = blank_frame();
        let left = BoxNorm { xmin: 0.05, ymin: 0.25, xmax: 0.45, ymax: 0.75 };
        let right = BoxNorm { xmin: 0.55, ymin: 0.25, xmax: 0.95, ymax: 0.75 };
        let mut person = StubPerson(vec![detection(0.9, left), detection(0.8, right)]);
        let mut pose = StubPose::new(keypoints(0.9, 0.85));
        let mut alert = CountingAlert::default();

        let report =
            process_frame(&mut frame, &mut person, &mut pose, 0.5, &mut alert).unwrap();

        assert_eq!(report, FrameReport { persons: 2, falls: 2 });
        assert_eq!(alert.count, 1);
    }

    #[test]
    fn test_degenerate_box_is_skipped_rest_processed() {
        let mut frame = blank_frame();
        let inverted = BoxNorm { xmin: 0.8, ymin: 0.2, xmax: 0.2, ymax: 0.8 };
        let mut person =
            StubPerson(vec![detection(0.9, inverted), detection(0.9, centered_box())]);
        let mut pose = StubPose::new(keypoints(0.3, 0.3));
        let mut alert = CountingAlert::default();

        let report =
            process_frame(&mut frame, &mut person, &mut pose, 0.5, &mut alert).unwrap();

        // 反転ボックスは飛ばし、正常な検出だけ処理される
        assert_eq!(report, FrameReport { persons: 1, falls: 0 });
        assert_eq!(pose.calls, 1);
    }
}
