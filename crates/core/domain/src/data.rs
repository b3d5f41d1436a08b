use serde::{Deserialize, Serialize};

/// 一次定位结果（由定位源产生，适配器原样转发）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// 纬度（度）
    pub latitude: f64,
    /// 经度（度）
    pub longitude: f64,
    /// 海拔（米）
    pub altitude_m: Option<f64>,
    /// 水平精度（米，越小越好）
    pub horizontal_accuracy_m: f64,
    /// 垂直精度（米）
    pub vertical_accuracy_m: Option<f64>,
    /// 速度（米/秒）
    pub speed_mps: Option<f64>,
    /// 航向（度，正北为 0）
    pub course_deg: Option<f64>,
    /// 定位时间戳（毫秒）
    pub timestamp_ms: i64,
}

impl PositionSample {
    /// 仅含经纬度与精度的样本。
    pub fn new(latitude: f64, longitude: f64, horizontal_accuracy_m: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: None,
            horizontal_accuracy_m,
            vertical_accuracy_m: None,
            speed_mps: None,
            course_deg: None,
            timestamp_ms,
        }
    }
}
