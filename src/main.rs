mod audio;
mod config;
mod console;
mod report;
mod session;

use std::process::{self, ExitCode};

use tokio::signal;

use audio::AlsaDriver;
use config::Config;
use session::{QuitReason, Session};

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let config = Config::new().unwrap_or_else(|e| {
        log::warn!("{}, falling back to built-in defaults", e);
        Config::default()
    });
    log::debug!("Config: {:?}", config);

    let driver = AlsaDriver::new(config.capture_device.clone(), config.playback_device.clone());
    let settle_delay = config.settle_delay();
    let mut session = Session::new(config, driver);

    if let Err(e) = session.start() {
        eprintln!("{}", e);
        return ExitCode::from(1);
    }

    println!();
    println!("The audio codec test is started ...");
    println!("To complete, type q");

    let mut quit_rx = console::spawn_quit_listener();
    match session.wait_for_quit(&mut quit_rx).await {
        QuitReason::UserQuit => log::info!("Quit requested from console"),
        QuitReason::Interrupted => log::info!("Received Ctrl+C"),
        QuitReason::IterationsElapsed => log::info!("Poll rounds elapsed"),
    }
    println!();
    println!("Test complete");

    // 收尾阶段仍允许 Ctrl+C 强制退出
    let _guard = console::spawn_interrupt_guard(signal::ctrl_c(), || process::exit(130));

    // 给仍在队列中的帧留出播放时间
    tokio::time::sleep(settle_delay).await;
    println!("Ending the program ...");
    session.shutdown();
    log::debug!("Session {} ended in {:?}", session.id(), session.state());

    let report = session.report();
    log::debug!(
        "Session {}: {} packets, queue high-water {}, {} dropped",
        session.id(),
        report.stats.packets,
        report.queue_high_water,
        report.queue_dropped,
    );
    println!("{}", report);

    tokio::time::sleep(settle_delay).await;
    ExitCode::SUCCESS
}
