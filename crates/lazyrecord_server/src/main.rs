use lazyrecord_core::{init_logging, Backend, DbError};
use lazyrecord_server::{router, AppState, ConfigError, ServerConfig};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::process::ExitCode;

#[derive(Debug)]
enum StartupError {
    Config(ConfigError),
    Logging(String),
    Backend(DbError),
    Io(std::io::Error),
}

impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging init failed: {message}"),
            Self::Backend(err) => write!(f, "database open failed: {err}"),
            Self::Io(err) => write!(f, "http server error: {err}"),
        }
    }
}

impl Error for StartupError {}

impl From<ConfigError> for StartupError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for StartupError {
    fn from(value: DbError) -> Self {
        Self::Backend(value)
    }
}

impl From<std::io::Error> for StartupError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=server status=error");
            eprintln!("lazyrecord_server: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = ServerConfig::from_env()?;
    init_logging(config.logging.level(), config.logging.target()?)
        .map_err(StartupError::Logging)?;

    let backend = Backend::open(&config.database.path, &config.database.backend_options())?;
    let app = router(AppState::new(backend.clone(), config.store.timeout()));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        "event=server_start module=server status=ok address={}",
        address
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    backend.close();
    info!("event=server_stop module=server status=ok");
    served.map_err(StartupError::Io)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(
                "event=signal_install module=server status=error signal=ctrl_c error={}",
                err
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(
                    "event=signal_install module=server status=error signal=sigterm error={}",
                    err
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("event=server_shutdown module=server status=requested");
}
