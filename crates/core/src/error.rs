use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("optical recognition failed: {0}")]
    OcrFailed(String),

    #[error("unsupported embedding model: {0}")]
    UnsupportedModel(String),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("index is empty")]
    Empty,

    #[error("k must be positive")]
    ZeroK,

    #[error("vector dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("vector at position {position} has dimension {found}, expected {expected}")]
    RaggedInput {
        position: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not an index artifact (bad magic)")]
    BadMagic,

    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),

    #[error("index artifact is truncated or corrupt: {0}")]
    Corrupt(String),

    #[error("index holds {index} vectors but metadata lists {metadata} chunks")]
    CountMismatch { index: usize, metadata: usize },

    #[error("metadata checksum does not match the one recorded in the index")]
    ChecksumMismatch,

    #[error("index build {index} does not match metadata build {metadata}")]
    BuildMismatch { index: String, metadata: String },

    #[error("artifacts were built with model {found}, configured model is {expected}")]
    ModelMismatch { expected: String, found: String },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("query stack not available: {0}")]
    NotReady(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
