//! NetHub 客户端
//!
//! 基于 egui 的图形化前端，组合聊天、健康检测和链接检测

use anyhow::Result;
use nethub_client::ui::NetHubApp;
use nethub_client::ClientConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("nethub_client=debug".parse()?)
                .add_directive("protocol=debug".parse()?),
        )
        .init();

    let config = ClientConfig::from_env();
    info!(
        "Chat server {}, probe server {}",
        config.chat.server_addr, config.probe.server_addr
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 700.0])
            .with_title("NetHub Client"),
        ..Default::default()
    };

    eframe::run_native(
        "NetHub Client",
        options,
        Box::new(move |cc| {
            let app: Box<dyn eframe::App> = Box::new(NetHubApp::new(cc, config)?);
            Ok(app)
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))?;

    Ok(())
}
