use serde::{Deserialize, Serialize};

/// A location fix from the positioning producer.
///
/// Negative `speed` or `course` mean the platform had no valid value. The fix
/// carries no timestamp: the latest one is treated as current.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub horizontal_accuracy: f64,
    pub speed: f64,
    pub course: f64,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, horizontal_accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy,
            speed: -1.0,
            course: -1.0,
        }
    }

    pub fn with_motion(mut self, speed: f64, course: f64) -> Self {
        self.speed = speed;
        self.course = course;
        self
    }
}
