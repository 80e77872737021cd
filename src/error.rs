#[derive(Debug)]
pub enum Error {
    InvalidAddress(String),
    DuplicateAddress(String),
    AddressNotFound(String),
    UrlParseError(url::ParseError),
    TungsteniteError(tokio_tungstenite::tungstenite::Error),
    SessionDied,
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::UrlParseError(err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::TungsteniteError(err)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
