use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};

use mimamori::alert::ConsoleAlert;
use mimamori::camera::OpenCvCamera;
use mimamori::config::Config;
use mimamori::models;
use mimamori::runner;
use mimamori::web::{self, FramePacket, UiState};

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::load_or_default(CONFIG_PATH);

    println!("Mimamori Fall Monitor ({})", env!("GIT_VERSION"));
    println!(
        "[config] camera={} threshold={} ui={}",
        config.camera.index, config.detection.alert_threshold, config.ui.addr
    );

    // モデルはここで一度だけ読み込み、全フレームで使い回す。
    // 欠けていれば起動失敗。
    let mut models =
        models::load_models(&config.models).context("failed to load model artifacts")?;
    println!(
        "[models] person={} pose={}",
        config.models.person, config.models.pose
    );

    let state = UiState::new();
    let _server = web::spawn_ui_server(state.clone(), &config.ui.addr)?;
    println!("[ui] open http://{} and press Start", config.ui.addr);

    let mut alert = ConsoleAlert;
    let mut frame_number: u64 = 0;

    // Startが押されるまで待機し、押されたらカメラを開いてループを回す。
    // ループはStop・カメラ失敗・エラーのいずれかで抜け、カメラは解放される。
    loop {
        if !state.running.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(50));
            continue;
        }

        log::info!("detection started");
        let result = OpenCvCamera::open_with_resolution(
            config.camera.index,
            config.camera.width,
            config.camera.height,
        )
        .and_then(|camera| {
            runner::run_capture_loop(
                camera,
                &mut models.person,
                &mut models.pose,
                config.detection.alert_threshold,
                &mut alert,
                &state.running,
                |frame, report| {
                    let jpeg = web::jpeg_encode(frame, config.ui.jpeg_quality)?;
                    frame_number += 1;
                    let mut latest = state.latest.lock().unwrap();
                    *latest = Some(FramePacket {
                        jpeg,
                        frame_number,
                        falls: report.falls,
                    });
                    Ok(())
                },
            )
        });

        match result {
            Ok(()) => log::info!("detection stopped"),
            Err(e) => {
                log::warn!("capture loop ended: {e:#}");
                if let Ok(mut message) = state.message.lock() {
                    *message = Some(format!("camera error: {e:#}"));
                }
            }
        }
        state.running.store(false, Ordering::Release);
    }
}
