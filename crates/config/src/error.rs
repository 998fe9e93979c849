#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}
