use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Caller ID (UUID)
    pub exp: usize,
    pub iat: usize,
}
