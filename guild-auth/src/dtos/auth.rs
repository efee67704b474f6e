use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct LoginQuery {
    /// Where to send the browser after a successful login
    #[param(example = "/dashboard")]
    pub redirect_uri: Option<String>,
}

/// Query Discord appends when redirecting back to us.
#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
