use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanopyError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("argument index {index} out of range for {supplied} supplied arguments")]
    ArgumentIndex { index: usize, supplied: usize },

    #[error("total fitness is zero, fitness-proportionate selection is undefined")]
    ZeroTotalFitness,

    #[error("fitness evaluator failed: {0}")]
    Evaluator(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CanopyError>;
