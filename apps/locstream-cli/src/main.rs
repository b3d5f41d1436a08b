//! 定位流演示程序：模拟权限弹窗与定位源，逐行输出 JSON 位置样本。

mod wiring;

use domain::PositionSample;
use locstream_config::AppConfig;
use locstream_location::LocationStream;
use locstream_telemetry::{init_tracing, metrics};
use tokio_stream::StreamExt;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();
    info!(
        target: "locstream.cli",
        usage_description = %config.usage_description,
        "location_usage_declared"
    );

    let wiring = wiring::build(&config);

    // 等待授权结果（模拟弹窗永不应答时此处一直挂起，Ctrl-C 退出）
    let stream = tokio::select! {
        result = wiring.adapter.start() => result,
        _ = tokio::signal::ctrl_c() => {
            info!(target: "locstream.cli", "interrupted_before_authorization");
            return Ok(());
        }
    };
    let stream = match stream {
        Ok(stream) => stream,
        Err(err) => {
            warn!(target: "locstream.cli", error = %err, "start_failed");
            return Err(err.into());
        }
    };

    let received = consume(stream, config.sample_limit).await?;
    // 消费方已关闭流，这里再次 stop 不会重复停止定位源
    wiring.adapter.stop();

    let snapshot = metrics().snapshot();
    info!(
        target: "locstream.cli",
        received = received,
        permission_requests = wiring.permission.request_count(),
        source_starts = wiring.source.start_count(),
        source_stops = wiring.source.stop_count(),
        sessions_started = snapshot.sessions_started,
        sessions_stopped = snapshot.sessions_stopped,
        samples_forwarded = snapshot.samples_forwarded,
        samples_dropped = snapshot.samples_dropped,
        "location_demo_finished"
    );
    Ok(())
}

/// 拉取样本直到达到上限、收到 Ctrl-C 或流结束；返回收到的样本数。
async fn consume(
    mut stream: LocationStream,
    limit: Option<u64>,
) -> Result<u64, serde_json::Error> {
    let mut received = 0u64;
    loop {
        if limit.is_some_and(|limit| received >= limit) {
            info!(target: "locstream.cli", received = received, "sample_limit_reached");
            break;
        }
        let sample = tokio::select! {
            sample = stream.next() => sample,
            _ = tokio::signal::ctrl_c() => {
                info!(target: "locstream.cli", "interrupted");
                break;
            }
        };
        let Some(sample) = sample else {
            info!(target: "locstream.cli", "stream_ended");
            break;
        };
        println!("{}", sample_line(&sample)?);
        received += 1;
    }
    stream.close();
    Ok(received)
}

fn sample_line(sample: &PositionSample) -> Result<String, serde_json::Error> {
    serde_json::to_string(sample)
}
