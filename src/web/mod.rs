//! ブラウザ向けプレビューサーバー。
//!
//! パイプラインのホットパスから切り離すため、専用スレッドでactixを
//! 動かし、最新フレームと開始/停止フラグだけを共有する。

pub mod page;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::{
    web::{self, Bytes},
    App, HttpResponse, HttpServer,
};
use anyhow::{Context, Result};
use async_stream::stream;
use opencv::{
    core::{Mat, Vector},
    imgcodecs, imgproc,
    prelude::*,
};
use serde::Serialize;
use tokio::sync::oneshot;

/// ストリーム用にエンコード済みの1フレーム
#[derive(Clone)]
pub struct FramePacket {
    pub jpeg: Vec<u8>,
    pub frame_number: u64,
    pub falls: usize,
}

pub type SharedFrame = Arc<Mutex<Option<FramePacket>>>;

/// パイプラインスレッドとUIスレッドの共有状態
#[derive(Clone)]
pub struct UiState {
    pub latest: SharedFrame,
    /// 検出ループの実行フラグ = キャンセルトークン
    pub running: Arc<AtomicBool>,
    /// カメラ失敗などをページに表示するためのメッセージ
    pub message: Arc<Mutex<Option<String>>>,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            latest: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            message: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

/// BGR Mat をJPEGにエンコードする
pub fn jpeg_encode(frame: &Mat, quality: i32) -> Result<Vec<u8>> {
    let params = Vector::from_iter([imgcodecs::IMWRITE_JPEG_QUALITY, quality]);
    let mut buf: Vector<u8> = Vector::new();

    // imencodeはBGR 8UC3を期待する。BGRAなら変換
    let mat = if frame.channels() == 4 {
        let mut bgr = Mat::default();
        imgproc::cvt_color_def(frame, &mut bgr, imgproc::COLOR_BGRA2BGR)?;
        bgr
    } else {
        frame.clone()
    };

    imgcodecs::imencode(".jpg", &mat, &mut buf, &params)?;
    Ok(buf.to_vec())
}

/// UIサーバースレッドのハンドル
pub struct UiServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl UiServer {
    /// サーバーを停止してスレッド終了を待つ
    pub fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}

/// 専用スレッドでUIサーバーを起動する
pub fn spawn_ui_server(state: UiState, addr: &str) -> Result<UiServer> {
    let addr = addr.to_string();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = std::thread::Builder::new()
        .name("mimamori-ui".into())
        .spawn(move || {
            if let Err(err) = actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(web::Data::new(state.clone()))
                        .route("/", web::get().to(index_route))
                        .route("/stream.mjpg", web::get().to(stream_handler))
                        .route("/start", web::post().to(start_handler))
                        .route("/stop", web::post().to(stop_handler))
                        .route("/status", web::get().to(status_handler))
                })
                .bind(addr.as_str())?
                .run();

                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                server.await
            }) {
                log::error!("UI server error: {err}");
            }
        })
        .context("Failed to spawn UI server thread")?;

    Ok(UiServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

async fn index_route() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page::INDEX_HTML)
}

/// 最新フレームをMJPEGのmultipartレスポンスとして流す
async fn stream_handler(state: web::Data<UiState>) -> HttpResponse {
    let state = state.clone();
    let stream = stream! {
        let mut interval = actix_web::rt::time::interval(Duration::from_millis(33));
        loop {
            interval.tick().await;
            let packet = state
                .latest
                .lock()
                .ok()
                .and_then(|guard| guard.clone());
            if let Some(packet) = packet {
                let mut payload = Vec::with_capacity(packet.jpeg.len() + 64);
                payload.extend_from_slice(b"--frame\r\n");
                payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
                payload.extend_from_slice(&packet.jpeg);
                payload.extend_from_slice(b"\r\n");
                yield Ok::<Bytes, actix_web::Error>(Bytes::from(payload));
            }
        }
    };

    HttpResponse::Ok()
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Content-Type", "multipart/x-mixed-replace; boundary=frame"))
        .streaming(stream)
}

async fn start_handler(state: web::Data<UiState>) -> HttpResponse {
    if let Ok(mut message) = state.message.lock() {
        *message = None;
    }
    state.running.store(true, Ordering::Release);
    log::info!("detection start requested");
    HttpResponse::Ok().finish()
}

async fn stop_handler(state: web::Data<UiState>) -> HttpResponse {
    state.running.store(false, Ordering::Release);
    log::info!("detection stop requested");
    HttpResponse::Ok().finish()
}

#[derive(Serialize)]
struct StatusResponse {
    running: bool,
    frame_number: u64,
    falls: usize,
    message: Option<String>,
}

async fn status_handler(state: web::Data<UiState>) -> HttpResponse {
    let (frame_number, falls) = state
        .latest
        .lock()
        .ok()
        .and_then(|guard| guard.as_ref().map(|p| (p.frame_number, p.falls)))
        .unwrap_or((0, 0));
    let message = state.message.lock().ok().and_then(|m| m.clone());

    HttpResponse::Ok().json(StatusResponse {
        running: state.running.load(Ordering::Acquire),
        frame_number,
        falls,
        message,
    })
}
