use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjError {
    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    #[error("Unknown datum transform id: {0}")]
    UnknownDatumTransform(i32),

    #[error("Transform failed: {0}")]
    TransformFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Error, Debug)]
pub enum ProjectorError {
    #[error("Projection error: {0}")]
    Projection(#[from] ProjError),

    #[error("No source raster attached to the projector")]
    MissingInput,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Source raster error: {0}")]
    Provider(String),

    #[error("Settings document error: {0}")]
    Settings(#[from] serde_json::Error),
}
