use std::env;

#[derive(Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Secret shared with the hosted authenticator; used only to validate
    /// the tokens it issues.
    pub jwt_secret: String,
    /// Base URL of the hosted data gateway. When unset the server runs
    /// against the in-memory gateway (development mode).
    pub gateway_url: Option<String>,
    /// Websocket URL of the gateway's live-query feed.
    pub gateway_ws_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let listen_addr =
            env::var("ORANGESLICE_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;

        let gateway_url = env::var("GATEWAY_URL").ok();
        let gateway_ws_url = env::var("GATEWAY_WS_URL").ok();

        if gateway_url.is_some() && gateway_ws_url.is_none() {
            return Err("GATEWAY_WS_URL must be set when GATEWAY_URL is set".to_string());
        }

        Ok(ServerConfig {
            listen_addr,
            jwt_secret,
            gateway_url,
            gateway_ws_url,
        })
    }
}
