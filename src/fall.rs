use crate::pose::{Keypoint, KeypointIndex};

/// 「地面付近」とみなすY座標の下限（クロップ内正規化座標）
pub const GROUND_BAND_Y: f32 = 0.8;

/// 頭部と胴体のキーポイントがともにクロップ下部20%にあれば転倒とみなす。
///
/// 2つの固定インデックス（鼻=頭部、首=胴体）の独立した閾値比較のAND。
/// キーポイントが2点未満の場合は常にfalse。
pub fn is_fall(keypoints: &[Keypoint]) -> bool {
    let head = keypoints.get(KeypointIndex::Nose as usize);
    let torso = keypoints.get(KeypointIndex::Neck as usize);
    match (head, torso) {
        (Some(head), Some(torso)) => head.y > GROUND_BAND_Y && torso.y > GROUND_BAND_Y,
        _ => false,
    }
}
