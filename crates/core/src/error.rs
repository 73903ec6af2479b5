//! Error types for greenstack

use thiserror::Error;

/// Main error type for greenstack operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Geotransform mismatch for band '{label}'")]
    TransformMismatch { label: String },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Unsupported raster format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed input data: {0}")]
    DataFormat(String),

    #[error("Area of interest is empty or degenerate")]
    EmptyGeometry,

    #[error("Area of interest does not overlap the raster extent")]
    NoOverlap,

    #[error("No file found for band {band} in period '{period}'")]
    MissingBand { band: String, period: String },

    #[error("No input: {0}")]
    NoInput(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DataFormat(e.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::DataFormat(format!("XML: {}", e))
    }
}

/// Result type alias for greenstack operations
pub type Result<T> = std::result::Result<T, Error>;
