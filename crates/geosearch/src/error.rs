use thiserror::Error;

use crate::index::IndexError;
use crate::search::SearchError;

#[derive(Error, Debug)]
pub enum GeoSearchError {
    #[error("Backfill error: {0}")]
    BackfillError(#[from] crate::backfill::BackfillError),
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),
    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] geosearch_data_processing::DataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GeoSearchError {
    /// The index directory holds no committed index.
    pub const fn is_index_not_found(&self) -> bool {
        matches!(
            self.index_error(),
            Some(IndexError::IndexNotFound(_))
        )
    }

    /// The caller passed an out-of-range argument.
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::SearchError(SearchError::InvalidArgument(_)) | Self::ConfigError(_)
        )
    }

    /// A source line could not be parsed into a record.
    pub const fn is_malformed_record(&self) -> bool {
        match self {
            Self::DataProcessing(e) => e.is_malformed_record(),
            _ => match self.index_error() {
                Some(e) => e.is_malformed_record(),
                None => false,
            },
        }
    }

    const fn index_error(&self) -> Option<&IndexError> {
        match self {
            Self::IndexError(e)
            | Self::SearchError(SearchError::IndexError(e))
            | Self::BackfillError(crate::backfill::BackfillError::IndexError(e)) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoSearchError>;
