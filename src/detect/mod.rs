pub mod person;

pub use person::{
    parse_detections, BoxNorm, Detection, PersonDetector, DETECTOR_INPUT_HEIGHT,
    DETECTOR_INPUT_WIDTH,
};
