pub mod estimator;
pub mod keypoint;

pub use estimator::{parse_keypoints, PoseEstimator, POSE_INPUT_SIZE};
pub use keypoint::{Keypoint, KeypointIndex};
