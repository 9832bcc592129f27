use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use opencv::core::Mat;

use crate::alert::AlertSink;
use crate::camera::FrameSource;
use crate::pipeline::{self, FrameReport, PersonModel, PoseModel};

/// キャプチャループ: フレーム読み取り → パイプライン → 出力。
///
/// `running` は各イテレーションの先頭で確認する明示的なキャンセル
/// トークン。カメラは値で受け取るため、正常停止・読み取り失敗・
/// エラーのどの経路でもDropで解放される。
pub fn run_capture_loop<S, F>(
    mut source: S,
    person: &mut dyn PersonModel,
    pose: &mut dyn PoseModel,
    threshold: f32,
    alert: &mut dyn AlertSink,
    running: &AtomicBool,
    mut publish: F,
) -> Result<()>
where
    S: FrameSource,
    F: FnMut(&Mat, &FrameReport) -> Result<()>,
{
    while running.load(Ordering::Acquire) {
        let mut frame = source.read_frame()?;
        let report = pipeline::process_frame(&mut frame, person, pose, threshold, alert)?;
        publish(&frame, &report)?;
    }
    log::info!("capture loop stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::pose::Keypoint;
    use opencv::core::{Scalar, CV_8UC3};

    struct ScriptedSource {
        frames_left: usize,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Mat> {
            if self.frames_left == 0 {
                anyhow::bail!("camera stream ended");
            }
            self.frames_left -= 1;
            Ok(Mat::new_rows_cols_with_default(48, 64, CV_8UC3, Scalar::all(0.0))?)
        }
    }

    struct NoPerson;

    impl PersonModel for NoPerson {
        fn detect(&mut self, _frame: &Mat) -> Result<Vec<Detection>> {
            Ok(vec![])
        }
    }

    struct NoPose;

    impl PoseModel for NoPose {
        fn estimate(&mut self, _crop: &Mat) -> Result<Vec<Keypoint>> {
            Ok(vec![])
        }
    }

    struct SilentAlert;

    impl AlertSink for SilentAlert {
        fn send_alert(&mut self) {}
    }

    #[test]
    fn test_stop_token_observed_before_first_frame() {
        let running = AtomicBool::new(false);
        let mut published = 0;

        let result = run_capture_loop(
            ScriptedSource { frames_left: 10 },
            &mut NoPerson,
            &mut NoPose,
            0.5,
            &mut SilentAlert,
            &running,
            |_, _| {
                published += 1;
                Ok(())
            },
        );

        assert!(result.is_ok());
        assert_eq!(published, 0);
    }

    #[test]
    fn test_stop_after_one_frame() {
        let running = AtomicBool::new(true);
        let mut published = 0;

        let result = run_capture_loop(
            ScriptedSource { frames_left: 10 },
            &mut NoPerson,
            &mut NoPose,
            0.5,
            &mut SilentAlert,
            &running,
            |_, _| {
                published += 1;
                running.store(false, Ordering::Release);
                Ok(())
            },
        );

        assert!(result.is_ok());
        assert_eq!(published, 1);
    }

    #[test]
    fn test_read_failure_terminates_loop() {
        let running = AtomicBool::new(true);
        let mut published = 0;

        let result = run_capture_loop(
            ScriptedSource { frames_left: 0 },
            &mut NoPerson,
            &mut NoPose,
            0.5,
            &mut SilentAlert,
            &running,
            |_, _| {
                published += 1;
                Ok(())
            },
        );

        assert!(result.is_err());
        assert_eq!(published, 0);
    }
}
