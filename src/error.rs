use thiserror::Error;

/// Failure of a single round trip to the photo library.
///
/// Every variant is treated as transient by the caches: the sampler burns an
/// attempt and moves on, the shuffler keeps serving its previous sequence.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid library URL for {path}: {source}")]
    InvalidUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{id:?} is not a valid {endpoint} id")]
    InvalidId { endpoint: &'static str, id: String },
}

impl LibraryError {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Decode { endpoint, .. }
            | Self::InvalidId { endpoint, .. } => endpoint,
            Self::InvalidUrl { path, .. } => path,
        }
    }
}
