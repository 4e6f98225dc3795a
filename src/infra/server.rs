use super::auth::TokenVerifier;
use super::mongo::MongoRep;
use super::routes::*;
use crate::events::EventHub;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{routes, Build, Request, Response, Rocket};

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Attaching CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new("Access-Control-Allow-Methods", "POST, GET, OPTIONS"));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

pub fn build(db: MongoRep, verifier: TokenVerifier, hub: EventHub) -> Rocket<Build> {
    rocket::build()
        .manage(db)
        .manage(verifier)
        .manage(hub)
        .mount(
            "/",
            routes![
                user_orders,
                place_order,
                cancel_order,
                rate_order,
                claim_order,
                update_status,
                order_events
            ],
        )
        .attach(CORS)
}
