use std::fmt;

#[derive(Debug)]
pub enum RateLimiterError {
    Store(String),
    Config(String),
    Serialization(String),
}

impl fmt::Display for RateLimiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimiterError::Store(msg) => write!(f, "store error: {}", msg),
            RateLimiterError::Config(msg) => write!(f, "config error: {}", msg),
            RateLimiterError::Serialization(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for RateLimiterError {}
