use std::sync::Arc;

use anyhow::{anyhow, Context};
use sqlx::PgPool;
use tracing::info;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::error::AppError;
use crate::friends::dto::{FriendProfile, PendingInvite};
use crate::friends::repo::{FriendStore, PgFriendStore};

/// Friendship invitation state machine: invite, accept (with
/// reciprocal-invite resolution), reject, and the listings around them.
pub struct FriendService {
    db: PgPool,
    friends: Arc<dyn FriendStore>,
    users: Arc<dyn UserStore>,
}

impl FriendService {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            friends: Arc::new(PgFriendStore),
            users: Arc::new(PgUserStore),
        }
    }

    /// Invite another user by name.
    ///
    /// A pending invite in the opposite direction is deliberately allowed to
    /// coexist; the pair is collapsed when either side accepts.
    pub async fn invite_friend(&self, user_id: i64, username: &str) -> Result<(), AppError> {
        let mut tx = self.db.begin().await.context("begin transaction")?;

        let target = self
            .users
            .by_username(&mut tx, username)
            .await?
            .ok_or(AppError::NotFound("user"))?;

        if target.id == user_id {
            return Err(AppError::BadRequest("can't invite your own account".into()));
        }

        if self
            .friends
            .friend_between(&mut tx, user_id, target.id)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest("already friends".into()));
        }

        if self
            .friends
            .invite_between(&mut tx, user_id, target.id)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest("invitation already exists".into()));
        }

        self.friends.create_invite(&mut tx, user_id, target.id).await?;
        tx.commit().await.context("commit transaction")?;
        info!(user_id, target_id = target.id, "friend invitation created");
        Ok(())
    }

    /// Invitations addressed to the user, oldest first.
    pub async fn pending_invites(&self, user_id: i64) -> Result<Vec<PendingInvite>, AppError> {
        let mut conn = self.db.acquire().await.context("acquire connection")?;
        Ok(self.friends.pending_invites(&mut conn, user_id).await?)
    }

    /// Accept an invitation addressed to the user: consume it, consume any
    /// reciprocal invite the user had already sent to the inviter, and create
    /// both directions of the friendship. All or nothing.
    pub async fn accept_friendship(&self, user_id: i64, invite_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await.context("begin transaction")?;

        let invite = self
            .friends
            .invite_for_recipient(&mut tx, user_id, invite_id)
            .await?
            .ok_or(AppError::NotFound("invitation"))?;

        // The lookup already pins the addressee; a mismatch here means a bug
        // or tampering, not a legitimate request.
        if invite.with_user_id != user_id {
            return Err(anyhow!(
                "invite {} not addressed to user {}",
                invite.id,
                user_id
            )
            .into());
        }

        if !self.friends.delete_invite(&mut tx, user_id, invite.id).await? {
            return Err(anyhow!("invite {} disappeared during accept", invite.id).into());
        }

        // Mutual invites resolve on the first acceptance.
        if let Some(reciprocal) = self
            .friends
            .invite_between(&mut tx, user_id, invite.user_id)
            .await?
        {
            if !self
                .friends
                .delete_invite(&mut tx, user_id, reciprocal.id)
                .await?
            {
                return Err(
                    anyhow!("reciprocal invite {} disappeared during accept", reciprocal.id).into(),
                );
            }
        }

        self.friends.create_link(&mut tx, user_id, invite.user_id).await?;
        tx.commit().await.context("commit transaction")?;
        info!(user_id, with_user_id = invite.user_id, "friendship created");
        Ok(())
    }

    /// Reject an invitation addressed to the user: consume it and nothing
    /// else.
    pub async fn reject_friendship(&self, user_id: i64, invite_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await.context("begin transaction")?;

        let invite = self
            .friends
            .invite_for_recipient(&mut tx, user_id, invite_id)
            .await?
            .ok_or(AppError::NotFound("invitation"))?;

        if invite.with_user_id != user_id {
            return Err(anyhow!(
                "invite {} not addressed to user {}",
                invite.id,
                user_id
            )
            .into());
        }

        if !self.friends.delete_invite(&mut tx, user_id, invite.id).await? {
            return Err(anyhow!("invite {} disappeared during reject", invite.id).into());
        }

        tx.commit().await.context("commit transaction")?;
        info!(user_id, invite_id, "friend invitation rejected");
        Ok(())
    }

    /// Confirmed friends of the user, oldest friendship first.
    pub async fn list_of_friends(&self, user_id: i64) -> Result<Vec<FriendProfile>, AppError> {
        let mut conn = self.db.acquire().await.context("acquire connection")?;
        Ok(self.friends.friends_of(&mut conn, user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::AuthService;
    use crate::config::AuthConfig;

    fn services(pool: PgPool) -> (AuthService, FriendService) {
        let auth = AuthService::new(
            pool.clone(),
            AuthConfig {
                max_failed_attempts: 5,
                block_duration_hours: 24,
            },
        );
        (auth, FriendService::new(pool))
    }

    async fn register_pair(auth: &AuthService) -> (i64, i64) {
        let alice = auth.register("alice", "pw1", "Alice").await.unwrap();
        let bob = auth.register("bob", "pw2", "Bob").await.unwrap();
        (alice.id, bob.id)
    }

    #[sqlx::test]
    async fn invite_then_accept_links_both_directions(pool: PgPool) {
        let (auth, friends) = services(pool);
        let (alice, bob) = register_pair(&auth).await;

        friends.invite_friend(alice, "bob").await.expect("invite");

        let pending = friends.pending_invites(bob).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].user_id, alice);
        assert_eq!(pending[0].displayed_name, "Alice");

        friends.accept_friendship(bob, pending[0].id).await.expect("accept");

        let bobs = friends.list_of_friends(bob).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].id, alice);

        let alices = friends.list_of_friends(alice).await.unwrap();
        assert_eq!(alices.len(), 1);
        assert_eq!(alices[0].id, bob);

        assert!(friends.pending_invites(bob).await.unwrap().is_empty());
        assert!(friends.pending_invites(alice).await.unwrap().is_empty());
    }

    #[sqlx::test]
    async fn mutual_invites_collapse_on_first_accept(pool: PgPool) {
        let (auth, friends) = services(pool);
        let (alice, bob) = register_pair(&auth).await;

        friends.invite_friend(alice, "bob").await.unwrap();
        // The reverse pair is allowed to coexist until acceptance.
        friends.invite_friend(bob, "alice").await.unwrap();

        let bobs_inbox = friends.pending_invites(bob).await.unwrap();
        assert_eq!(bobs_inbox.len(), 1);

        friends.accept_friendship(bob, bobs_inbox[0].id).await.unwrap();

        // Bob's own outstanding invite to Alice is consumed as well.
        assert!(friends.pending_invites(alice).await.unwrap().is_empty());
        assert!(friends.pending_invites(bob).await.unwrap().is_empty());
        assert_eq!(friends.list_of_friends(alice).await.unwrap().len(), 1);
        assert_eq!(friends.list_of_friends(bob).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    async fn listings_are_ordered_oldest_first(pool: PgPool) {
        let (auth, friends) = services(pool);
        let (alice, bob) = register_pair(&auth).await;
        let carol = auth.register("carol", "pw3", "Carol").await.unwrap();

        // Bob invites first, Carol second.
        friends.invite_friend(bob, "alice").await.unwrap();
        friends.invite_friend(carol.id, "alice").await.unwrap();

        let pending = friends.pending_invites(alice).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending[0].id < pending[1].id);
        assert_eq!(pending[0].user_id, bob);
        assert_eq!(pending[1].user_id, carol.id);

        friends.accept_friendship(alice, pending[0].id).await.unwrap();
        friends.accept_friendship(alice, pending[1].id).await.unwrap();

        // Friendships list in acceptance order as well.
        let list = friends.list_of_friends(alice).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, bob);
        assert_eq!(list[1].id, carol.id);
    }

    #[sqlx::test]
    async fn self_invite_is_rejected(pool: PgPool) {
        let (auth, friends) = services(pool);
        let (alice, _) = register_pair(&auth).await;

        let err = friends.invite_friend(alice, "alice").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[sqlx::test]
    async fn duplicate_invite_is_rejected_without_state_change(pool: PgPool) {
        let (auth, friends) = services(pool);
        let (alice, bob) = register_pair(&auth).await;

        friends.invite_friend(alice, "bob").await.unwrap();
        let err = friends.invite_friend(alice, "bob").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert_eq!(friends.pending_invites(bob).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    async fn invite_to_unknown_username_fails(pool: PgPool) {
        let (auth, friends) = services(pool);
        let (alice, _) = register_pair(&auth).await;

        let err = friends.invite_friend(alice, "nobody").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[sqlx::test]
    async fn invite_between_existing_friends_fails(pool: PgPool) {
        let (auth, friends) = services(pool);
        let (alice, bob) = register_pair(&auth).await;

        friends.invite_friend(alice, "bob").await.unwrap();
        let pending = friends.pending_invites(bob).await.unwrap();
        friends.accept_friendship(bob, pending[0].id).await.unwrap();

        let err = friends.invite_friend(alice, "bob").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = friends.invite_friend(bob, "alice").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[sqlx::test]
    async fn accept_requires_the_addressee(pool: PgPool) {
        let (auth, friends) = services(pool);
        let (alice, bob) = register_pair(&auth).await;
        let carol = auth.register("carol", "pw3", "Carol").await.unwrap();

        friends.invite_friend(alice, "bob").await.unwrap();
        let pending = friends.pending_invites(bob).await.unwrap();

        // A forged id from someone else's inbox does not resolve.
        let err = friends
            .accept_friendship(carol.id, pending[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // The invite survives untouched.
        assert_eq!(friends.pending_invites(bob).await.unwrap().len(), 1);
        assert!(friends.list_of_friends(carol.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    async fn reject_consumes_the_invite_only(pool: PgPool) {
        let (auth, friends) = services(pool);
        let (alice, bob) = register_pair(&auth).await;

        friends.invite_friend(alice, "bob").await.unwrap();
        let pending = friends.pending_invites(bob).await.unwrap();
        let invite_id = pending[0].id;

        friends.reject_friendship(bob, invite_id).await.expect("reject");

        assert!(friends.pending_invites(bob).await.unwrap().is_empty());
        assert!(friends.list_of_friends(alice).await.unwrap().is_empty());
        assert!(friends.list_of_friends(bob).await.unwrap().is_empty());

        // A consumed invite cannot be accepted afterwards.
        let err = friends.accept_friendship(bob, invite_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
