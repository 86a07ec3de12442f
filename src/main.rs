use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use devicehub::api::{self, AppState};
use devicehub::config::{Settings, load_config};
use devicehub::persistence::SledStore;
use devicehub::registry::DeviceRegistry;
use devicehub::relay::MessageRelay;
use devicehub::router::MessageRouter;
use devicehub::topic::Topics;
use devicehub::transport::{DeviceSubscriber, MqttClient};
use devicehub::utils::logging;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.logger.level);
    info!(
        name = api::routes::SERVICE_NAME,
        version = api::routes::SERVICE_VERSION,
        "starting"
    );
    debug!(?settings, "configuration");

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<(), BoxError> {
    let store = SledStore::open(&settings.database.path)?;
    let timeout = Duration::from_millis(settings.database.timeout_ms);
    let registry = Arc::new(DeviceRegistry::new(
        store.clone(),
        timeout,
        settings.registry.liveness,
    ));
    info!(liveness = ?settings.registry.liveness, path = %settings.database.path, "registry ready");

    let topics = Topics::new(&settings.mqtt.topic_prefix);
    let router = Arc::new(MessageRouter::new(Arc::clone(&registry), topics.clone()));
    let relay = Arc::new(MessageRelay::new(
        settings.relay.message_buffer,
        move |message| {
            let router = Arc::clone(&router);
            async move { router.handle(message).await }
        },
    ));
    let subscriber = DeviceSubscriber::new(Arc::clone(&relay), topics, settings.mqtt.qos);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = api::router(
        AppState::new(Arc::clone(&registry), timeout),
        settings.server.provisioning,
    );
    let listener = TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;
    info!(address = %listener.local_addr()?, "http server listening");
    let server = tokio::spawn({
        let shutdown = stopped(shutdown_rx.clone());
        async move { axum::serve(listener, app).with_graceful_shutdown(shutdown).await }
    });

    relay.start();

    let (client, driver) = MqttClient::new(&settings.mqtt);
    let (connected_tx, mut connected_rx) = mpsc::channel(1);
    let mqtt = tokio::spawn(driver.run(connected_tx, stopped(shutdown_rx)));
    let on_connect = tokio::spawn({
        let client = client.clone();
        async move {
            while connected_rx.recv().await.is_some() {
                if let Err(err) = subscriber.handle_on_connect(&client).await {
                    error!("subscribe on connect: {err}");
                }
            }
        }
    });

    shutdown_signal().await;
    info!("shutting down");

    if let Err(err) = client.disconnect().await {
        warn!("mqtt disconnect: {err}");
    }
    let _ = shutdown_tx.send(true);

    match server.await {
        Ok(Ok(())) => info!("http server shutdown complete"),
        Ok(Err(err)) => error!("http server: {err}"),
        Err(err) => error!("http server task: {err}"),
    }
    if let Err(err) = mqtt.await {
        error!("mqtt task: {err}");
    }
    on_connect.abort();

    relay.stop().await;
    store.flush()?;
    info!("stopped");
    Ok(())
}

async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("listen for SIGTERM: {err}");
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
}
