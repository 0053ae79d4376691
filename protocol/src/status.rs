//! HTTP 状态码描述与有效性判定

use std::borrow::Cow;

/// 状态码对应的简短描述，未收录的返回 `HTTP <code>`
pub fn status_phrase(code: i32) -> Cow<'static, str> {
    let phrase = match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found (Redirect)",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => return Cow::Owned(format!("HTTP {}", code)),
    };
    Cow::Borrowed(phrase)
}

/// 2xx 和 3xx 视为有效
pub fn is_valid_status(code: i32) -> bool {
    (200..400).contains(&code)
}
