//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub const SERVICES: &str = "/services";
pub const EXPIRE_KEYS: &str = "/expire-keys";

pub mod proxy {
    /// Admission-controlled proxy route: the first segment selects the
    /// backend service, the remainder is forwarded as the backend path
    pub const ROUTE: &str = "/api/:service/*path";
}

/// Wildcard captures arrive without their leading slash; backends expect one
pub fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
