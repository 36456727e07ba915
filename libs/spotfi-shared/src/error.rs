use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("malformed rpc envelope: {0}")]
    MalformedEnvelope(String),

    #[error("invalid topic: {0}")]
    InvalidTopic(String),
}
