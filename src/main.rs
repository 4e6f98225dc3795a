use order_desk::events::EventHub;
use order_desk::infra::{build, Config, MongoRep, TokenVerifier};
use rocket::launch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[launch]
fn rocket() -> _ {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().unwrap();
    let db = MongoRep::init(config.mongo_uri.clone(), &config.mongo_db).unwrap();
    info!(database = %config.mongo_db, "order store ready");
    build(db, TokenVerifier::new(config.jwt_secret), EventHub::default())
}
