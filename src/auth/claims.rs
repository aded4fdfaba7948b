use serde::{Deserialize, Serialize};

/// JWT payload: who the bearer is and until when.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: i64,    // user ID
    pub exp: usize, // expires at (unix timestamp)
}
