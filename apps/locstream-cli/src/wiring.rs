//! 定位链路装配模块
//!
//! 根据配置构建模拟权限提供者与模拟定位源，并把它们交给适配器。
//! 真实平台接入时只需替换这里的两个协作方实现。

use locstream_config::AppConfig;
use locstream_location::LocationStreamAdapter;
use locstream_location::simulated::{
    SimulatedPermissionProvider, SimulatedPositionSource, SimulatedTrack,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 装配完成的定位链路。
pub struct Wiring {
    pub adapter: LocationStreamAdapter,
    pub permission: Arc<SimulatedPermissionProvider>,
    pub source: Arc<SimulatedPositionSource>,
}

/// 由配置构建模拟协作方与适配器。
pub fn build(config: &AppConfig) -> Wiring {
    let permission = Arc::new(SimulatedPermissionProvider::with_prompt(
        config.sim_initial_status,
        config.sim_prompt_outcome,
        Duration::from_millis(config.sim_prompt_delay_ms),
    ));
    let track = SimulatedTrack {
        origin_lat: config.sim_origin_lat,
        origin_lon: config.sim_origin_lon,
        speed_mps: config.sim_speed_mps,
        course_deg: config.sim_course_deg,
        interval: Duration::from_millis(config.sim_interval_ms),
        batch_size: config.sim_batch_size,
        ..SimulatedTrack::default()
    };
    info!(
        target: "locstream.cli",
        initial_status = %config.sim_initial_status,
        prompt_outcome = ?config.sim_prompt_outcome.map(|status| status.as_str()),
        interval_ms = config.sim_interval_ms,
        batch_size = config.sim_batch_size,
        "simulated_collaborators_built"
    );
    let source = Arc::new(SimulatedPositionSource::new(track));
    let adapter = LocationStreamAdapter::new(permission.clone(), source.clone());
    Wiring {
        adapter,
        permission,
        source,
    }
}
