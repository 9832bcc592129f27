use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoCaptureAPIs};

/// 接続されているカメラを順に開いて、このパイプラインが気にする
/// プロパティ（解像度・FPS・チャネル数）を表示する。
fn main() {
    println!("=== カメラプローブ ===");
    println!();

    for index in 0..5 {
        print!("index {}: ", index);
        let mut cap = match VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32) {
            Ok(c) => c,
            Err(_) => {
                println!("open failed");
                break;
            }
        };
        if !cap.is_opened().unwrap_or(false) {
            println!("not available");
            break;
        }

        let prop_w = cap.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let prop_h = cap.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        let prop_fps = cap.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        let backend = cap.get_backend_name().unwrap_or_default();

        println!("prop: {}x{} fps={} backend={}", prop_w, prop_h, prop_fps, backend);

        let mut frame = Mat::default();
        match cap.read(&mut frame) {
            Ok(true) if !frame.empty() => {
                println!(
                    "       frame: {}x{} ch={} depth={}",
                    frame.cols(),
                    frame.rows(),
                    frame.channels(),
                    frame.depth()
                );
            }
            Ok(_) => println!("       frame: EMPTY"),
            Err(e) => println!("       frame err: {}", e),
        }
        println!();
    }
}
