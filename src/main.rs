use aurora_shell::config::ShellConfig;
use aurora_shell::ipc::IpcServer;
use aurora_shell::shell::{DesktopShell, LifecycleEvent, ShellAction};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("Aurora shell starting");

    let cfg = match ShellConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {:#}", e);
            ShellConfig::default()
        }
    };

    // Supervisor는 shell이 소유하고 IPC 서버와 Arc로 공유
    let shell = DesktopShell::new(&cfg);

    if cfg.ipc.enabled {
        let addr = format!("127.0.0.1:{}", cfg.ipc.port);
        let ipc_server = IpcServer::new(shell.supervisor(), &addr);
        tokio::spawn(async move {
            if let Err(e) = ipc_server.start().await {
                tracing::error!("IPC server error: {}", e);
            }
        });
    }

    if let ShellAction::LoadUrl(url) = shell.handle(LifecycleEvent::WindowReady).await {
        tracing::info!("Main window loading {}", url);
    }

    // Ctrl+C = before-quit: 유예 시간 후 강제 종료까지 대기
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping backend...");

    shell.handle(LifecycleEvent::BeforeQuit).await;

    tracing::info!("Aurora shell exiting");
    Ok(())
}
