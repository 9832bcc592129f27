use std::time::Instant;

use anyhow::Result;

use mimamori::alert::AlertSink;
use mimamori::camera::{FrameSource, OpenCvCamera};
use mimamori::config::Config;
use mimamori::models;
use mimamori::pipeline;

struct SilentAlert;

impl AlertSink for SilentAlert {
    fn send_alert(&mut self) {}
}

/// パイプライン全体のフレームあたり所要時間を計測する
fn main() -> Result<()> {
    let config = Config::load_or_default("config.toml");
    let mut models = models::load_models(&config.models)?;
    let mut camera = OpenCvCamera::open_with_resolution(
        config.camera.index,
        Some(640),
        Some(480),
    )?;
    let mut alert = SilentAlert;

    // カメラのみ
    let iterations = 50;
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = camera.read_frame()?;
    }
    let capture_ms = start.elapsed().as_millis() as f64 / iterations as f64;

    // キャプチャ + 検出 + 姿勢推定 + 描画
    let start = Instant::now();
    let mut persons = 0;
    for _ in 0..iterations {
        let mut frame = camera.read_frame()?;
        let report = pipeline::process_frame(
            &mut frame,
            &mut models.person,
            &mut models.pose,
            config.detection.alert_threshold,
            &mut alert,
        )?;
        persons += report.persons;
    }
    let pipeline_ms = start.elapsed().as_millis() as f64 / iterations as f64;

    println!("Camera capture:  {:.2}ms/frame = {:.1} FPS", capture_ms, 1000.0 / capture_ms);
    println!(
        "Full pipeline:   {:.2}ms/frame = {:.1} FPS ({} persons over {} frames)",
        pipeline_ms,
        1000.0 / pipeline_ms,
        persons,
        iterations
    );

    Ok(())
}
