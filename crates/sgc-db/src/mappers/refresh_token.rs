//! Refresh token record <-> model mapper

use sgc_core::RefreshTokenRecord;

use crate::models::RefreshTokenModel;

impl From<RefreshTokenModel> for RefreshTokenRecord {
    fn from(model: RefreshTokenModel) -> Self {
        RefreshTokenRecord {
            id: model.id,
            user_id: model.user_id,
            jti: model.jti,
            created_at: model.created_at,
            expires_at: model.expires_at,
            revoked: model.revoked,
        }
    }
}
