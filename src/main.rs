use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use flowpay_backend::api::health::{health_check, HealthState};
use flowpay_backend::config::Config;
use flowpay_backend::database::merchant_repository::MerchantRepository;
use flowpay_backend::database::payment_repository::PaymentRepository;
use flowpay_backend::database::refund_repository::RefundRepository;
use flowpay_backend::database::repository::{
    DeliveryLogStore, MerchantStore, PaymentStore, RefundStore,
};
use flowpay_backend::database::webhook_repository::WebhookRepository;
use flowpay_backend::database::{self, PoolConfig};
use flowpay_backend::jobs::{JobDispatcher, PAYMENT_QUEUE, REFUND_QUEUE, WEBHOOK_QUEUE};
use flowpay_backend::queue::redis::{init_queue_pool, QueuePoolConfig, RedisJobQueue};
use flowpay_backend::queue::JobQueue;
use flowpay_backend::settlement::SimulatedSettlement;
use flowpay_backend::webhooks::HttpWebhookSender;
use flowpay_backend::workers::payment::PaymentWorker;
use flowpay_backend::workers::refund::RefundWorker;
use flowpay_backend::workers::webhook::WebhookWorker;
use flowpay_backend::workers::{run_worker, JobHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting Flowpay worker service");
    tracing::info!("Environment: {}", config.server.environment);

    // Durable store
    let pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        ..Default::default()
    };
    let db = database::init_pool(&config.database.url, Some(pool_config)).await?;

    // Job broker
    let queue_pool = init_queue_pool(QueuePoolConfig {
        redis_url: config.redis.url.clone(),
        ..Default::default()
    })
    .await?;
    let job_queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(queue_pool.clone()));
    let dispatcher = JobDispatcher::new(job_queue.clone());

    // Repositories
    let payments: Arc<dyn PaymentStore> = Arc::new(PaymentRepository::new(db.clone()));
    let refunds: Arc<dyn RefundStore> = Arc::new(RefundRepository::new(db.clone()));
    let merchants: Arc<dyn MerchantStore> = Arc::new(MerchantRepository::new(db.clone()));
    let delivery_log: Arc<dyn DeliveryLogStore> = Arc::new(WebhookRepository::new(db.clone()));

    // External collaborators
    let settlement = Arc::new(SimulatedSettlement::new(Duration::from_millis(
        config.settlement.delay_ms,
    )));
    let sender = Arc::new(HttpWebhookSender::new(config.webhook.request_timeout()));

    // One worker loop per job type, all owned by this process and drained
    // on shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let payment_worker: Arc<dyn JobHandler> = Arc::new(PaymentWorker::new(
        payments,
        settlement.clone(),
        dispatcher.clone(),
    ));
    let refund_worker: Arc<dyn JobHandler> =
        Arc::new(RefundWorker::new(refunds, settlement, dispatcher.clone()));
    let webhook_worker: Arc<dyn JobHandler> = Arc::new(WebhookWorker::new(
        merchants,
        delivery_log,
        sender,
        dispatcher,
        config.webhook.clone(),
    ));

    let workers = vec![
        tokio::spawn(run_worker(
            job_queue.clone(),
            PAYMENT_QUEUE,
            payment_worker,
            config.worker.clone(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(run_worker(
            job_queue.clone(),
            REFUND_QUEUE,
            refund_worker,
            config.worker.clone(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(run_worker(
            job_queue.clone(),
            WEBHOOK_QUEUE,
            webhook_worker,
            config.worker.clone(),
            shutdown_rx.clone(),
        )),
    ];

    // Operational surface
    let state = HealthState {
        db,
        queue: queue_pool,
        environment: config.server.environment.clone(),
    };
    let app = Router::new()
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Health endpoint listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        let shutdown = async move {
            let _ = server_shutdown.changed().await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("Health server error: {}", e);
        }
    });

    tracing::info!("Workers are listening for jobs");

    // Block until the process is asked to stop, then drain: workers stop
    // dequeuing and finish their in-flight handler.
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, draining workers");
    shutdown_tx.send(true).ok();

    for worker in workers {
        let _ = worker.await;
    }
    let _ = server.await;

    tracing::info!("Flowpay worker service stopped");
    Ok(())
}
