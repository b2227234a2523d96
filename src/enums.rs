use std::fmt;

/// Enum reprsenting HTTP version.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum Version {
    Http10,
    Http11,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Version::Http10 => f.write_str("HTTP/1.0"),
            Version::Http11 => f.write_str("HTTP/1.1"),
        }
    }
}

/// Status codes the proxy itself works with.
///
/// The proxy synthesizes a few of these locally (the OPTIONS terminus and
/// error responses) and uses the table to resolve a default reason phrase
/// for origin replies that omit one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Created,
    Accepted,
    NoContent,
    MovedPermanently,
    Found,
    NotModified,
    BadRequest,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    RequestTimeout,
    LengthRequired,
    PayloadTooLarge,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
}

impl Status {
    pub fn code(&self) -> u16 {
        use self::Status::*;
        match *self {
            Ok => 200,
            Created => 201,
            Accepted => 202,
            NoContent => 204,
            MovedPermanently => 301,
            Found => 302,
            NotModified => 304,
            BadRequest => 400,
            Forbidden => 403,
            NotFound => 404,
            MethodNotAllowed => 405,
            RequestTimeout => 408,
            LengthRequired => 411,
            PayloadTooLarge => 413,
            InternalServerError => 500,
            NotImplemented => 501,
            BadGateway => 502,
            ServiceUnavailable => 503,
            GatewayTimeout => 504,
        }
    }
    pub fn reason(&self) -> &'static str {
        use self::Status::*;
        match *self {
            Ok => "OK",
            Created => "Created",
            Accepted => "Accepted",
            NoContent => "No Content",
            MovedPermanently => "Moved Permanently",
            Found => "Found",
            NotModified => "Not Modified",
            BadRequest => "Bad Request",
            Forbidden => "Forbidden",
            NotFound => "Not Found",
            MethodNotAllowed => "Method Not Allowed",
            RequestTimeout => "Request Timeout",
            LengthRequired => "Length Required",
            PayloadTooLarge => "Payload Too Large",
            InternalServerError => "Internal Server Error",
            NotImplemented => "Not Implemented",
            BadGateway => "Bad Gateway",
            ServiceUnavailable => "Service Unavailable",
            GatewayTimeout => "Gateway Timeout",
        }
    }
    /// Look up a known status by numeric code.
    pub fn from_code(code: u16) -> Option<Status> {
        use self::Status::*;
        match code {
            200 => Some(Ok),
            201 => Some(Created),
            202 => Some(Accepted),
            204 => Some(NoContent),
            301 => Some(MovedPermanently),
            302 => Some(Found),
            304 => Some(NotModified),
            400 => Some(BadRequest),
            403 => Some(Forbidden),
            404 => Some(NotFound),
            405 => Some(MethodNotAllowed),
            408 => Some(RequestTimeout),
            411 => Some(LengthRequired),
            413 => Some(PayloadTooLarge),
            500 => Some(InternalServerError),
            501 => Some(NotImplemented),
            502 => Some(BadGateway),
            503 => Some(ServiceUnavailable),
            504 => Some(GatewayTimeout),
            _ => None,
        }
    }
    /// Default reason phrase for a numeric code, for replies that carry none.
    pub fn reason_for(code: u16) -> &'static str {
        Status::from_code(code).map(|s| s.reason()).unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod test {
    use super::{Status, Version};

    #[test]
    fn version_display() {
        assert_eq!(format!("{}", Version::Http10), "HTTP/1.0");
        assert_eq!(format!("{}", Version::Http11), "HTTP/1.1");
    }

    #[test]
    fn code_round_trip() {
        for code in &[200, 204, 400, 404, 411, 500, 501] {
            assert_eq!(Status::from_code(*code).unwrap().code(), *code);
        }
        assert_eq!(Status::from_code(599), None);
    }

    #[test]
    fn default_reasons() {
        assert_eq!(Status::reason_for(204), "No Content");
        assert_eq!(Status::reason_for(501), "Not Implemented");
        assert_eq!(Status::reason_for(599), "Unknown");
    }
}
