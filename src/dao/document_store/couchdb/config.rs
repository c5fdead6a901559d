use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "buzzer_beater";

/// Connection settings for the CouchDB backend.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server URL, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding the game and question documents.
    pub database: String,
    /// Basic-auth credentials, when the server requires them.
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    /// Read `COUCH_BASE_URL` (required), `COUCH_DB` and the optional
    /// `COUCH_USERNAME` / `COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = std::env::var("COUCH_BASE_URL").map_err(|_| {
            CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            }
        })?;
        let database = std::env::var("COUCH_DB").unwrap_or_else(|_| DEFAULT_DATABASE.into());
        let credentials = std::env::var("COUCH_USERNAME")
            .ok()
            .zip(std::env::var("COUCH_PASSWORD").ok());

        Ok(Self {
            base_url,
            database,
            credentials,
        })
    }
}
