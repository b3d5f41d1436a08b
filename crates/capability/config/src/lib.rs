//! 应用运行配置加载。

use domain::AuthorizationStatus;
use std::env;
use std::str::FromStr;

/// 模拟定位源每批样本数上限。
pub const MAX_SIM_BATCH_SIZE: usize = 1000;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 权限弹窗中向用户展示的定位用途说明（宿主环境必须声明）。
    pub usage_description: String,
    pub sim_initial_status: AuthorizationStatus,
    /// 模拟弹窗的用户选择；`None` 表示永不应答。
    pub sim_prompt_outcome: Option<AuthorizationStatus>,
    pub sim_prompt_delay_ms: u64,
    pub sim_interval_ms: u64,
    pub sim_batch_size: usize,
    pub sim_origin_lat: f64,
    pub sim_origin_lon: f64,
    pub sim_speed_mps: f64,
    pub sim_course_deg: f64,
    /// 演示程序收到多少个样本后主动关闭流。
    pub sample_limit: Option<u64>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let usage_description = read_optional("LOCSTREAM_USAGE_DESCRIPTION")
            .ok_or_else(|| ConfigError::Missing("LOCSTREAM_USAGE_DESCRIPTION".to_string()))?;
        let sim_initial_status = read_parsed_with_default(
            "LOCSTREAM_SIM_INITIAL_STATUS",
            AuthorizationStatus::Undetermined,
        )?;
        // 显式设置为空字符串表示模拟弹窗永不应答
        let sim_prompt_outcome = match env::var("LOCSTREAM_SIM_PROMPT_OUTCOME") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(parse_value("LOCSTREAM_SIM_PROMPT_OUTCOME", value)?),
            Err(_) => Some(AuthorizationStatus::AuthorizedFull),
        };
        let sim_prompt_delay_ms: u64 = read_parsed_with_default("LOCSTREAM_SIM_PROMPT_DELAY_MS", 500)?;
        let sim_interval_ms: u64 = read_parsed_with_default("LOCSTREAM_SIM_INTERVAL_MS", 1000)?;
        let sim_batch_size = read_parsed_with_default("LOCSTREAM_SIM_BATCH_SIZE", 1usize)?.max(1);
        let sim_origin_lat: f64 = read_parsed_with_default("LOCSTREAM_SIM_ORIGIN_LAT", 37.3349)?;
        let sim_origin_lon: f64 = read_parsed_with_default("LOCSTREAM_SIM_ORIGIN_LON", -122.009)?;
        let sim_speed_mps: f64 = read_parsed_with_default("LOCSTREAM_SIM_SPEED_MPS", 1.4)?;
        let sim_course_deg: f64 = read_parsed_with_default("LOCSTREAM_SIM_COURSE_DEG", 90.0)?;
        let sample_limit: Option<u64> = read_optional_parsed("LOCSTREAM_SAMPLE_LIMIT")?;

        if sim_batch_size > MAX_SIM_BATCH_SIZE {
            return Err(ConfigError::Invalid(
                "LOCSTREAM_SIM_BATCH_SIZE".to_string(),
                sim_batch_size.to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&sim_origin_lat) {
            return Err(ConfigError::Invalid(
                "LOCSTREAM_SIM_ORIGIN_LAT".to_string(),
                sim_origin_lat.to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&sim_origin_lon) {
            return Err(ConfigError::Invalid(
                "LOCSTREAM_SIM_ORIGIN_LON".to_string(),
                sim_origin_lon.to_string(),
            ));
        }

        Ok(Self {
            usage_description,
            sim_initial_status,
            sim_prompt_outcome,
            sim_prompt_delay_ms,
            sim_interval_ms,
            sim_batch_size,
            sim_origin_lat,
            sim_origin_lon,
            sim_speed_mps,
            sim_course_deg,
            sample_limit,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_parsed_with_default<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    parse_value(key, value)
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn read_optional_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match read_optional(key) {
        Some(value) => parse_value(key, value).map(Some),
        None => Ok(None),
    }
}
