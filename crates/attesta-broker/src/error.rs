/// Broker channel errors.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("broker command failed: {0}")]
    Command(String),

    #[error("channel {0} is closed")]
    ChannelClosed(String),
}
