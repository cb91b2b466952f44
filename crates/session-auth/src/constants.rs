//! Backend constants
//!
//! Paths are relative to the API base URL and keep the trailing slash the
//! backend router requires.

use std::time::Duration;

/// API base URL used when neither config nor environment provide one
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/";

/// Obtain an access/refresh pair from username + password
pub const TOKEN_OBTAIN_PATH: &str = "token/";

/// Exchange a refresh token for a new access token
pub const TOKEN_REFRESH_PATH: &str = "token/refresh/";

/// Fixed timeout shared by ordinary requests and the refresh call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Login entry point the session failure handler redirects to
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Query parameter carrying the return target on the login redirect
pub const REDIRECT_PARAM: &str = "redirect";
