/// OpenPose系の 18 キーポイントインデックス
///
/// 先頭2点（鼻・首）を転倒判定が頭部・胴体として参照する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    Neck = 1,
    RightShoulder = 2,
    RightElbow = 3,
    RightWrist = 4,
    LeftShoulder = 5,
    LeftElbow = 6,
    LeftWrist = 7,
    RightHip = 8,
    RightKnee = 9,
    RightAnkle = 10,
    LeftHip = 11,
    LeftKnee = 12,
    LeftAnkle = 13,
    RightEye = 14,
    LeftEye = 15,
    RightEar = 16,
    LeftEar = 17,
}

impl KeypointIndex {
    pub const COUNT: usize = 18;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Nose),
            1 => Some(Self::Neck),
            2 => Some(Self::RightShoulder),
            3 => Some(Self::RightElbow),
            4 => Some(Self::RightWrist),
            5 => Some(Self::LeftShoulder),
            6 => Some(Self::LeftElbow),
            7 => Some(Self::LeftWrist),
            8 => Some(Self::RightHip),
            9 => Some(Self::RightKnee),
            10 => Some(Self::RightAnkle),
            11 => Some(Self::LeftHip),
            12 => Some(Self::LeftKnee),
            13 => Some(Self::LeftAnkle),
            14 => Some(Self::RightEye),
            15 => Some(Self::LeftEye),
            16 => Some(Self::RightEar),
            17 => Some(Self::LeftEar),
            _ => None,
        }
    }
}

/// 単一キーポイント（クロップ内の正規化座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0)
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// ピクセル座標に変換
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            confidence: 0.0,
        }
    }
}
