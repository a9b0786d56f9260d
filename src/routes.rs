use crate::dispatcher::Dispatcher;
use crate::path_utils::match_path;
use crate::server::Res;
use crate::store::Store;
use crate::telegram::Update;
use http::header::CONTENT_TYPE;
use http::{response::Builder, Method, Request, Response, StatusCode};
use tracing::{debug, warn};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// HTTP front of the bot: Telegram's webhook plus a health check.
pub fn route<S: Store>(
    dispatcher: &mut Dispatcher<S>,
    secret: &str,
    req: Request<String>,
    res: Builder,
) -> Res<Response<String>> {
    let path = req.uri().path().to_string();

    match (req.method(), path.as_str()) {
        (&Method::GET, path) if match_path(path, "/health").is_some() => {
            return Ok(res.status(StatusCode::OK).body("ok".to_string())?);
        }
        (&Method::POST, path) => {
            if let Some(vars) = match_path(path, "/webhook/{secret}") {
                if vars["secret"] != secret {
                    warn!("webhook call with unknown secret");
                    return not_found(res);
                }
                let header_matches = req
                    .headers()
                    .get(SECRET_HEADER)
                    .map(|value| value.as_bytes() == secret.as_bytes())
                    .unwrap_or(true);
                if !header_matches {
                    warn!("webhook call with mismatched secret token header");
                    return Ok(res.status(StatusCode::FORBIDDEN).body(String::new())?);
                }

                let update: Update = serde_json::from_str(req.body())?;
                debug!(update_id = update.update_id, "webhook update");
                return Ok(match dispatcher.handle(&update) {
                    Some(method) => res
                        .status(StatusCode::OK)
                        .header(CONTENT_TYPE, "application/json")
                        .body(serde_json::to_string(&method)?)?,
                    None => res.status(StatusCode::OK).body(String::new())?,
                });
            }
        }
        _ => {}
    }

    not_found(res)
}

fn not_found(res: Builder) -> Res<Response<String>> {
    Ok(res.status(StatusCode::NOT_FOUND).body(String::new())?)
}
