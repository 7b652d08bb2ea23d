use rocket::{
    fairing::{Fairing, Info, Kind},
    http::Header,
    Request, Response, Route,
};

use crate::config::Config;

/// A fairing that lets browser clients on the configured origin call the API.
#[derive(Debug, Copy, Clone)]
pub struct CorsFairing;

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let origin = req
            .rocket()
            .state::<Config>()
            .map(|config| config.cors_origin().to_string())
            .unwrap_or_else(|| "*".to_string());
        res.set_header(Header::new("Access-Control-Allow-Origin", origin));
        res.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, OPTIONS",
        ));
        res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
    }
}

/// Answer every preflight request; the fairing adds the headers.
#[options("/<_..>")]
fn preflight() {}

pub fn routes() -> Vec<Route> {
    routes![preflight]
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{Header, Status},
        local::asynchronous::Client,
    };

    #[backend_test]
    async fn preflight_is_answered(client: Client) {
        let response = client
            .options("/elections/123/votes")
            .header(Header::new("Origin", "http://localhost:5173"))
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        let headers = response.headers();
        assert_eq!(headers.get_one("Access-Control-Allow-Origin"), Some("*"));
        assert!(headers
            .get_one("Access-Control-Allow-Methods")
            .unwrap()
            .contains("POST"));
    }

    #[backend_test]
    async fn ordinary_responses_carry_the_headers(client: Client) {
        let response = client.get("/elections").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            response.headers().get_one("Access-Control-Allow-Origin"),
            Some("*")
        );
    }
}
