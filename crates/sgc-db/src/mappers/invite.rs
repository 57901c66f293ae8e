//! Invite entity <-> model mapper

use sgc_core::{DomainError, Invite, Role};

use crate::models::InviteModel;

impl TryFrom<InviteModel> for Invite {
    type Error = DomainError;

    fn try_from(model: InviteModel) -> Result<Self, Self::Error> {
        Ok(Invite {
            token: model.token,
            email: model.email,
            role: model.role.parse::<Role>()?,
            category: model.category,
            max_uses: model.max_uses,
            used_count: model.used_count,
            expires_at: model.expires_at,
            revoked_at: model.revoked_at,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
