use std::fs::File;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::ports::payment_gateway::PaymentGateway,
    application::use_cases::billing::{
        BillingUseCases, CustomerMappingRepo, OrderRepo, SubscriptionRepo,
    },
    infra::{config::AppConfig, db::init_db, stripe_gateway::StripeGateway},
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let postgres_arc = Arc::new(PostgresPersistence::new(pool));

    let customer_repo = postgres_arc.clone() as Arc<dyn CustomerMappingRepo>;
    let order_repo = postgres_arc.clone() as Arc<dyn OrderRepo>;
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;

    let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(
        config.stripe_secret_key.expose_secret().to_string(),
    ));

    let billing_use_cases =
        BillingUseCases::new(customer_repo, order_repo, subscription_repo, gateway);

    Ok(AppState {
        config: Arc::new(config),
        billing_use_cases: Arc::new(billing_use_cases),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "prankpay_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false) // don’t show target (module path)
        .with_level(true) // show log level
        .pretty(); // human-friendly, with colors

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
