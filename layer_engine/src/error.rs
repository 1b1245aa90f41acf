use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Expression error: {0}")]
    Expression(String),
    #[error("JSONPath error: {0}")]
    JsonPath(String),
    #[error("Data error: {0}")]
    Data(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl LayerError {
    pub fn expression(msg: impl Into<String>) -> Self {
        LayerError::Expression(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        LayerError::Data(msg.into())
    }
}
