use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use leadflow::config::AppConfig;
use leadflow::error::AppError;
use leadflow::pipeline::{
    pipeline_router, Actor, LeadStatus, LimitCatalogue, MemoryStore, Money, NewLead,
    NoopNotifier, PaymentMethod, PaymentMethodId, PipelineService, PipelineStore, Role,
    SellerId, SellerLimits, UserId, ValueBounds,
};
use leadflow::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Lead Pipeline Engine",
    about = "Run the sales-CRM lead pipeline and settlement engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run a scripted lead-to-enrollment conversion against the in-memory
    /// store and print the resulting records
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

fn seed_payment_methods(store: &MemoryStore) -> Result<(), AppError> {
    let methods = [
        PaymentMethod {
            id: PaymentMethodId("pm-pix".to_string()),
            name: "Pix".to_string(),
            fee_percentage: 0.99,
            max_installments: 1,
            active: true,
            visible: true,
        },
        PaymentMethod {
            id: PaymentMethodId("pm-credit-card".to_string()),
            name: "Credit card".to_string(),
            fee_percentage: 2.99,
            max_installments: 12,
            active: true,
            visible: true,
        },
        PaymentMethod {
            id: PaymentMethodId("pm-bank-slip".to_string()),
            name: "Bank slip".to_string(),
            fee_percentage: 1.99,
            max_installments: 1,
            active: true,
            visible: true,
        },
    ];

    for method in methods {
        store
            .upsert_payment_method(method)
            .map_err(|err| AppError::Pipeline(err.into()))?;
    }
    Ok(())
}

fn seed_limits() -> LimitCatalogue {
    LimitCatalogue::default().with_seller(
        SellerLimits::new(SellerId("seller-ana".to_string()))
            .with_global(ValueBounds::between(
                Money::from_cents(29_990),
                Money::from_cents(199_990),
            ))
            .with_category(
                "postgraduate",
                ValueBounds::between(Money::from_cents(59_990), Money::from_cents(129_990)),
            ),
    )
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let store = Arc::new(MemoryStore::default());
    seed_payment_methods(&store)?;
    let service = Arc::new(PipelineService::new(
        store,
        Arc::new(NoopNotifier),
        seed_limits(),
        config.pipeline,
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(pipeline_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lead pipeline engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_demo() -> Result<(), AppError> {
    let store = Arc::new(MemoryStore::default());
    seed_payment_methods(&store)?;
    let service = PipelineService::new(
        store,
        Arc::new(NoopNotifier),
        seed_limits(),
        Default::default(),
    );

    let seller = Actor {
        id: UserId("ana".to_string()),
        role: Role::Seller,
    };
    let seller_id = SellerId("seller-ana".to_string());

    let lead = service.create_lead(
        NewLead {
            name: "Maria Silva".to_string(),
            email: Some("maria.silva@example.com".to_string()),
            phone: Some("+55 11 99999-0001".to_string()),
            seller_id: Some(seller_id.clone()),
            course: Some("MBA in Data Science".to_string()),
            category: Some("postgraduate".to_string()),
            quoted_price: Some(Money::from_cents(99_990)),
        },
        &seller,
    )?;

    println!("Lead pipeline demo");
    println!("Lead {} ({}) registered at {}", lead.id.0, lead.name, lead.status);

    service.change_status(&lead.id, LeadStatus::Contacted, &seller, None)?;
    service.change_status(&lead.id, LeadStatus::Negociating, &seller, None)?;
    println!("Lead advanced to negociating");

    let decision = service.check_value_limit(
        &seller_id,
        Some("postgraduate"),
        Money::from_cents(99_990),
    )?;
    println!("Value limit check for 999.90: {decision:?}");

    let link = service.issue_link(&lead.id, seller_id, &seller)?;
    println!("Enrollment link issued: {} (expires {})", link.path(), link.expires_at);

    let record = service.convert(
        &lead.id,
        &PaymentMethodId("pm-credit-card".to_string()),
        3,
        &seller,
    )?;

    println!("\nConversion settled");
    println!("- enrollment number: {}", record.enrollment.number);
    println!(
        "- ledger entry: amount {} = fee {} + net {}",
        record.ledger_entry.amount,
        record.ledger_entry.fee_amount,
        record.ledger_entry.net_amount
    );

    println!("\nAudit trail");
    for entry in service.history(&lead.id)? {
        let movement = match (entry.from, entry.to) {
            (Some(from), Some(to)) => format!(" [{from} -> {to}]"),
            _ => String::new(),
        };
        println!("- {}{} by {}", entry.action, movement, entry.actor_id.0);
    }

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
