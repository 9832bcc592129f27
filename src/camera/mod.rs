pub mod capture;

pub use capture::OpenCvCamera;

use anyhow::Result;
use opencv::core::Mat;

/// キャプチャループへのフレーム供給源。
///
/// 実カメラ以外（テスト用スタブ等）を差し込めるようにする。
pub trait FrameSource {
    /// 次のフレームをBGR形式で返す。読み取り失敗はエラー。
    fn read_frame(&mut self) -> Result<Mat>;
}
