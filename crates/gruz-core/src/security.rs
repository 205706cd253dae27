use crate::domain::UserId;

pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if allowed_users.is_empty() {
        return false;
    }
    allowed_users.contains(&user_id.0)
}

/// Allow-list for the admin bot, built from configuration.
///
/// An empty list denies everyone; so does a message without a sender.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminPolicy {
    admin_ids: Vec<i64>,
}

impl AdminPolicy {
    pub fn new(admin_ids: impl Into<Vec<i64>>) -> Self {
        Self {
            admin_ids: admin_ids.into(),
        }
    }

    pub fn is_admin(&self, user_id: Option<UserId>) -> bool {
        is_authorized(user_id, &self.admin_ids)
    }

    pub fn is_empty(&self) -> bool {
        self.admin_ids.is_empty()
    }
}
