use serenity::{
    cache::Cache,
    model::{
        id::{GuildId, RoleId, UserId},
        permissions::Permissions,
    },
};
use tracing::debug;

/// Decides who may change per-guild settings.
#[cfg_attr(test, mockall::automock)]
pub trait Authorizer: Send + Sync {
    fn can_configure(&self, cache: &Cache, guild_id: GuildId, user_id: UserId, roles: &[RoleId])
        -> bool;
}

/// Guild owner, or any member holding a role with ADMINISTRATOR.
pub struct AdministratorAuthorizer;

impl Authorizer for AdministratorAuthorizer {
    fn can_configure(
        &self,
        cache: &Cache,
        guild_id: GuildId,
        user_id: UserId,
        roles: &[RoleId],
    ) -> bool {
        let Some(guild) = cache.guild(guild_id) else {
            debug!("Guild {} no está en caché, denegando permisos", guild_id);
            return false;
        };

        // @everyone shares the guild's id
        let everyone = RoleId::new(guild_id.get());
        let granted = std::iter::once(&everyone)
            .chain(roles.iter())
            .filter_map(|role_id| guild.roles.get(role_id))
            .map(|role| role.permissions);

        grants_admin(guild.owner_id, user_id, granted)
    }
}

fn grants_admin(
    owner_id: UserId,
    user_id: UserId,
    mut role_permissions: impl Iterator<Item = Permissions>,
) -> bool {
    owner_id == user_id || role_permissions.any(|p| p.administrator())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_always_allowed() {
        let owner = UserId::new(1);
        assert!(grants_admin(owner, owner, std::iter::empty()));
    }

    #[test]
    fn administrator_role_is_required_otherwise() {
        let owner = UserId::new(1);
        let member = UserId::new(2);

        assert!(!grants_admin(
            owner,
            member,
            [Permissions::SEND_MESSAGES, Permissions::CONNECT].into_iter()
        ));
        assert!(grants_admin(
            owner,
            member,
            [Permissions::SEND_MESSAGES, Permissions::ADMINISTRATOR].into_iter()
        ));
    }
}
