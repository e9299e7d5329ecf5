pub type Result<T> = std::result::Result<T, Error>;

/// A field value the wire format cannot carry
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{field} {value:?} is not numeric")]
    NotNumeric { field: &'static str, value: String },
}
