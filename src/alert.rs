/// 転倒検出時の通知先。
///
/// SMS・メール等の実装はここに差し替える。失敗時の再送ポリシーは
/// 実装側が定義する。
pub trait AlertSink {
    fn send_alert(&mut self);
}

/// コンソール出力のみのプレースホルダー実装
#[derive(Debug, Default)]
pub struct ConsoleAlert;

impl AlertSink for ConsoleAlert {
    fn send_alert(&mut self) {
        println!("Alert: Fall detected. Notifying caregivers.");
    }
}
