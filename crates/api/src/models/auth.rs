//! Authentication-related types.

use serde::{Deserialize, Serialize};

/// A refresh/access JWT pair returned on login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}
