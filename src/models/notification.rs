use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}
