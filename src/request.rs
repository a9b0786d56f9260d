use crate::server::{HttpError, Res};
use http::status::StatusCode;
use http::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH};
use http::{Request, Response};

static CRLF: &str = "\r\n";
static HEAD_END: &[u8] = b"\r\n\r\n";

/// Upper bound on headers plus body. Telegram updates are a few KiB.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

pub fn serialize_response(res: Response<String>) -> String {
    // HTTP-Version Status-Code Reason-Phrase CRLF
    // headers CRLF
    // message-body
    let (mut parts, body) = res.into_parts();
    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    parts.headers.insert(CONNECTION, HeaderValue::from_static("close"));

    format!(
        "{:?} {} {}{}{}{}{}",
        parts.version,
        parts.status.as_str(),
        parts
            .status
            .canonical_reason()
            .unwrap_or(StatusCode::BAD_REQUEST.as_str()),
        CRLF,
        parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| format!("{}: {}{}", k.as_str(), v, CRLF)))
            .collect::<Vec<String>>()
            .join(""),
        CRLF,
        body
    )
}

/// Total byte length of the first request in `buff`, once all of it
/// (headers plus `Content-Length` bytes of body) has arrived.
///
/// Fails as soon as the request is known to exceed `MAX_REQUEST_BYTES` or
/// its `Content-Length` is unusable, without waiting for the rest.
pub fn request_len(buff: &[u8]) -> Res<Option<usize>> {
    let head_end = match buff
        .windows(HEAD_END.len())
        .position(|window| window == HEAD_END)
    {
        Some(pos) => pos + HEAD_END.len(),
        None if buff.len() > MAX_REQUEST_BYTES => {
            return Err(HttpError::TooLarge(MAX_REQUEST_BYTES))
        }
        None => return Ok(None),
    };
    let head = std::str::from_utf8(&buff[..head_end])?;
    let body_len = match head
        .split(CRLF)
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
    {
        Some((_, value)) => value
            .trim()
            .parse::<usize>()
            .map_err(|_| HttpError::Malformed(format!("bad content-length {:?}", value.trim())))?,
        None => 0,
    };

    let total = head_end
        .checked_add(body_len)
        .ok_or_else(|| HttpError::Malformed("content-length overflows".into()))?;
    if total > MAX_REQUEST_BYTES {
        return Err(HttpError::TooLarge(MAX_REQUEST_BYTES));
    }
    Ok(if buff.len() >= total { Some(total) } else { None })
}

pub fn deserialize_request(buff: &str) -> Res<Request<String>> {
    // Method Request-URI HTTP-Version CRLF
    // headers CRLF
    // message-body
    let (head, body) = buff
        .split_once("\r\n\r\n")
        .ok_or_else(|| HttpError::Malformed("missing end of headers".into()))?;
    let mut lines = head.split(CRLF);
    let mut request_line = lines
        .next()
        .ok_or_else(|| HttpError::Malformed("empty request".into()))?
        .split_whitespace();
    let method = request_line
        .next()
        .ok_or_else(|| HttpError::Malformed("missing method".into()))?;
    let uri = request_line
        .next()
        .ok_or_else(|| HttpError::Malformed("missing uri".into()))?;

    let req = match method {
        "GET" | "POST" => Request::builder().method(method).uri(uri),
        method => return Err(HttpError::Method(method.to_string())),
    };
    parse_parts(lines, body, req)
}

fn parse_parts<'a>(
    lines: impl Iterator<Item = &'a str>,
    body: &str,
    mut req: http::request::Builder,
) -> Res<Request<String>> {
    let headers = req
        .headers_mut()
        .ok_or_else(|| HttpError::Malformed("invalid request line".into()))?;
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HttpError::Malformed(format!("bad header line {:?}", line)))?;
        let header_name = HeaderName::from_bytes(name.trim().as_bytes())?;
        headers.append(header_name, value.trim().parse()?);
    }
    Ok(req.body(body.to_string())?)
}
