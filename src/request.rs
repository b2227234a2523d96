use enums::Version;

/// A request as handed over to the origin side.
///
/// `path` is a literal path, the literal `"*"`, or absent (authority-form
/// targets carry no path at all). `host` is filled either from an
/// absolute-form request target or from the `Host` header; `port`
/// defaults to 80 when neither named one explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub path: Option<String>,
    pub version: Version,
}

impl Request {
    /// The origin-form target to put on an upstream request line.
    pub fn target(&self) -> &str {
        match self.path {
            Some(ref p) if !p.is_empty() => p,
            _ => "/",
        }
    }
}
