//! Named groups of sessions.
//!
//! A [`Group`] holds each member at most once (identity is the session id).
//! Membership is recorded on both sides: the group's member list and the
//! session's own group list, so that `Session::kill` can leave every group
//! it belongs to without scanning the server.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::application::session::{Session, SessionId};

/// Error returned by group membership operations.
#[derive(Debug, Error)]
pub enum GroupError {
    /// A thread panicked while holding the member list lock.
    #[error("membership of group `{0}` is poisoned")]
    Poisoned(String),
}

/// A named collection of sessions for bulk addressing.
#[derive(Debug)]
pub struct Group {
    name: String,
    members: RwLock<Vec<Arc<Session>>>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `session` to the group.
    ///
    /// Returns `Ok(false)` if it was already a member, or if it has been
    /// killed and may no longer join groups.
    ///
    /// # Errors
    ///
    /// [`GroupError::Poisoned`] if the member list is poisoned.
    pub fn add(self: &Arc<Self>, session: &Arc<Session>) -> Result<bool, GroupError> {
        {
            let mut members = self.members.write().map_err(|_| self.poisoned())?;
            if members.iter().any(|member| member.id() == session.id()) {
                return Ok(false);
            }
            members.push(Arc::clone(session));
        }

        if session.attach_group(Arc::clone(self)) {
            Ok(true)
        } else {
            // Lost the race against `kill`: undo so no terminated session lingers.
            self.remove_member(session)?;
            Ok(false)
        }
    }

    /// Removes `session` from the group. Removing a non-member is a no-op
    /// that returns `Ok(false)`.
    ///
    /// # Errors
    ///
    /// [`GroupError::Poisoned`] if the member list is poisoned.
    pub fn remove(&self, session: &Session) -> Result<bool, GroupError> {
        let removed = self.remove_member(session)?;
        if removed {
            session.detach_group(self);
        }
        Ok(removed)
    }

    /// Removes the member entry only; the session's own list is left alone.
    pub(crate) fn remove_member(&self, session: &Session) -> Result<bool, GroupError> {
        let mut members = self.members.write().map_err(|_| self.poisoned())?;
        let before = members.len();
        members.retain(|member| member.id() != session.id());
        Ok(members.len() != before)
    }

    /// Snapshot of the current members, in insertion order.
    ///
    /// # Errors
    ///
    /// [`GroupError::Poisoned`] if the member list is poisoned.
    pub fn members(&self) -> Result<Vec<Arc<Session>>, GroupError> {
        let members = self.members.read().map_err(|_| self.poisoned())?;
        Ok(members.clone())
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|member| member.id() == id)
    }

    pub fn len(&self) -> usize {
        self.members.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(&self) -> GroupError {
        GroupError::Poisoned(self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{open_test_session, test_server};

    #[tokio::test]
    async fn test_add_records_membership_on_both_sides() {
        // Arrange
        let server = test_server();
        let (session, _peer) = open_test_session(&server);
        let group = Arc::new(Group::new("lobby"));

        // Act
        let added = group.add(&session).unwrap();

        // Assert
        assert!(added);
        assert!(group.contains(session.id()));
        assert_eq!(session.group_names(), vec!["lobby".to_string()]);
    }

    #[tokio::test]
    async fn test_add_twice_keeps_single_membership() {
        let server = test_server();
        let (session, _peer) = open_test_session(&server);
        let group = Arc::new(Group::new("lobby"));

        assert!(group.add(&session).unwrap());
        assert!(!group.add(&session).unwrap());

        assert_eq!(group.len(), 1);
        assert_eq!(session.group_names().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_non_member_is_noop() {
        // Arrange
        let server = test_server();
        let (member, _p1) = open_test_session(&server);
        let (stranger, _p2) = open_test_session(&server);
        let group = Arc::new(Group::new("lobby"));
        group.add(&member).unwrap();

        // Act
        let removed = group.remove(&stranger).unwrap();

        // Assert
        assert!(!removed);
        let ids: Vec<SessionId> = group.members().unwrap().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![member.id()]);
    }

    #[tokio::test]
    async fn test_remove_detaches_group_from_session() {
        let server = test_server();
        let (session, _peer) = open_test_session(&server);
        let group = Arc::new(Group::new("lobby"));
        group.add(&session).unwrap();

        assert!(group.remove(&session).unwrap());

        assert!(group.is_empty());
        assert!(session.group_names().is_empty());
    }

    #[tokio::test]
    async fn test_killed_session_cannot_join() {
        // Arrange
        let server = test_server();
        let (session, _peer) = open_test_session(&server);
        session.kill().await.unwrap();
        let group = Arc::new(Group::new("lobby"));

        // Act
        let added = group.add(&session).unwrap();

        // Assert
        assert!(!added);
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_members_preserve_insertion_order() {
        let server = test_server();
        let (a, _pa) = open_test_session(&server);
        let (b, _pb) = open_test_session(&server);
        let group = Arc::new(Group::new("lobby"));

        group.add(&b).unwrap();
        group.add(&a).unwrap();

        let ids: Vec<SessionId> = group.members().unwrap().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![b.id(), a.id()]);
    }

    mod kill_with_poisoned_group {
        use super::*;
        use std::time::Duration;

        use async_trait::async_trait;
        use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

        use crate::application::hooks::{HookError, SessionHooks};
        use crate::application::server::Server;
        use crate::application::session::SessionError;
        use crate::application::test_support::{server_with, test_config};

        struct LeftRecorder(UnboundedSender<SessionId>);

        #[async_trait]
        impl SessionHooks for LeftRecorder {
            async fn on_left(
                &self,
                _server: Arc<Server>,
                session: Arc<Session>,
            ) -> Result<(), HookError> {
                self.0.send(session.id()).ok();
                Ok(())
            }
        }

        /// Panics on another thread while holding the write guard.
        fn poison(group: &Arc<Group>) {
            let group = Arc::clone(group);
            let _ = std::thread::spawn(move || {
                let _guard = group.members.write().unwrap();
                panic!("poisoning {}", group.name());
            })
            .join();
        }

        #[tokio::test]
        async fn test_kill_attempts_every_group_and_aggregates_failures() {
            // Arrange
            let (tx, mut left) = unbounded_channel();
            let server = server_with(test_config(), Arc::new(LeftRecorder(tx)), None);
            let (session, _peer) = open_test_session(&server);
            server.join_group(&session, "first").await.unwrap();
            server.join_group(&session, "broken").await.unwrap();
            server.join_group(&session, "last").await.unwrap();
            poison(&server.group("broken").await);

            // Act
            let result = session.kill().await;

            // Assert
            match result {
                Err(SessionError::GroupRemoval { id, failures }) => {
                    assert_eq!(id, session.id());
                    assert_eq!(failures.len(), 1);
                    assert!(matches!(&failures[0], GroupError::Poisoned(name) if name == "broken"));
                }
                other => panic!("expected GroupRemoval, got {other:?}"),
            }
            assert!(!server.group("first").await.contains(session.id()));
            assert!(!server.group("last").await.contains(session.id()));
            assert!(session.groups().is_empty());
            let fired = tokio::time::timeout(Duration::from_secs(1), left.recv())
                .await
                .expect("left hook must fire");
            assert_eq!(fired, Some(session.id()));
        }
    }
}
