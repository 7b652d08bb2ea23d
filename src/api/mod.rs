use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::{ErrorBody, ErrorKind};

mod elections;
mod voters;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(elections::routes());
    routes.extend(voters::routes());
    routes.extend(voting::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Errors raised by Rocket itself (unmatched routes, malformed bodies or
/// IDs) get the same JSON body as our own.
#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let kind = match status.code {
        404 => ErrorKind::NotFound,
        409 => ErrorKind::State,
        400..=499 => ErrorKind::Validation,
        _ => ErrorKind::Persistence,
    };
    let message = format!("{} {}: {}", req.method(), req.uri(), status.reason_lossy());
    (status, Json(ErrorBody { kind, message }))
}
