//! Identity reconciliation
//!
//! The token service can reissue a federated user's key pair at any time,
//! while the storage backend keeps its own credential registry with no
//! notion of federated identity. The reconciler converges the backend to the
//! federated user's current key pair on every authenticated request. There
//! is no transaction spanning both stores; correctness relies on the
//! decision table being idempotent, not on mutual exclusion.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use bucketgate_common::RequestId;

use crate::admin::AdminClient;
use crate::credential::FederatedUser;

/// Reconciles the backend credential registry with federated identities
pub struct IdentityReconciler {
    admin: Arc<dyn AdminClient>,
}

impl IdentityReconciler {
    /// Create a reconciler over the given admin plane
    pub fn new(admin: Arc<dyn AdminClient>) -> Self {
        Self { admin }
    }

    /// Converge the backend registry to the user's current credential
    ///
    /// Returns `true` iff a mutation happened on the backend. Never fails:
    /// every admin-plane error is logged and reported as "no mutation" so
    /// the request pipeline proceeds regardless; the next request from the
    /// same user retries naturally.
    pub async fn reconcile(&self, user: &FederatedUser, request_id: RequestId) -> bool {
        let backend_user = match self.admin.get_user(&user.user_name).await {
            Ok(view) => view,
            Err(e) => {
                error!(%request_id, user = %user.user_name, error = %e,
                    "reconciliation failed: could not fetch backend user");
                return false;
            }
        };

        let Some(backend_user) = backend_user else {
            return self.create_user(user, request_id).await;
        };

        match backend_user.credentials.as_slice() {
            [] => {
                info!(%request_id, user = %user.user_name,
                    "backend user has no credentials, creating one");
                match self
                    .admin
                    .create_credential(&user.user_name, &user.credential)
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        error!(%request_id, user = %user.user_name, error = %e,
                            "reconciliation failed: could not create credential");
                        false
                    }
                }
            }
            [existing] if *existing == user.credential => {
                debug!(%request_id, user = %user.user_name,
                    "backend credential already matches, nothing to do");
                false
            }
            [existing] => self.rotate(user, &existing.access_key_id, request_id).await,
            multiple => {
                // Ambiguous backend state the reconciler cannot safely
                // resolve; signals a registry anomaly.
                error!(%request_id, user = %user.user_name, count = multiple.len(),
                    "reconciliation refused: backend user has multiple credentials");
                false
            }
        }
    }

    async fn create_user(&self, user: &FederatedUser, request_id: RequestId) -> bool {
        info!(%request_id, user = %user.user_name, "creating backend user");
        if let Err(e) = self
            .admin
            .create_user(&user.user_name, &user.credential, true)
            .await
        {
            error!(%request_id, user = %user.user_name, error = %e,
                "reconciliation failed: could not create backend user");
            return false;
        }

        // A brand new user carrying an assumed group also gets a policy on
        // the group bucket. The user itself was already created, so a policy
        // failure still counts as a mutation.
        if let Some(group) = user.assumed_group.as_deref() {
            let policy = group_policy_document(group);
            if let Err(e) = self.admin.set_bucket_policy(group, &policy).await {
                warn!(%request_id, user = %user.user_name, bucket = group, error = %e,
                    "could not install group bucket policy");
            }
        }

        true
    }

    /// Remove the stale credential and register the current one
    ///
    /// Remove-then-create: if the create fails after a successful remove,
    /// the backend user is left with no credential until the next request
    /// reconciles again. Accepted window, surfaced only via logs.
    async fn rotate(
        &self,
        user: &FederatedUser,
        stale_access_key_id: &str,
        request_id: RequestId,
    ) -> bool {
        info!(%request_id, user = %user.user_name,
            stale = stale_access_key_id, "rotating backend credential");

        if let Err(e) = self
            .admin
            .remove_credential(&user.user_name, stale_access_key_id)
            .await
        {
            error!(%request_id, user = %user.user_name, error = %e,
                "reconciliation failed: could not remove stale credential");
            return false;
        }

        match self
            .admin
            .create_credential(&user.user_name, &user.credential)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(%request_id, user = %user.user_name, error = %e,
                    "rotation removed the stale credential but creating the new one failed; \
                     backend user currently has no credential");
                false
            }
        }
    }
}

/// Read-write policy document granting the group full access to its bucket
fn group_policy_document(group: &str) -> String {
    format!(
        r#"{{"Version":"2012-10-17","Statement":[{{"Effect":"Allow","Principal":{{"AWS":["*"]}},"Action":["s3:GetObject","s3:PutObject","s3:DeleteObject","s3:ListBucket"],"Resource":["arn:aws:s3:::{group}","arn:aws:s3:::{group}/*"]}}]}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::AdminError;
    use crate::credential::{BackendUser, Credential};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory admin plane recording every mutation
    #[derive(Default)]
    struct MockAdmin {
        users: Mutex<HashMap<String, Vec<Credential>>>,
        fail_create_credential: Mutex<bool>,
        policies: Mutex<Vec<(String, String)>>,
        mutations: Mutex<u32>,
    }

    impl MockAdmin {
        fn with_user(user_name: &str, credentials: Vec<Credential>) -> Self {
            let admin = Self::default();
            admin
                .users
                .lock()
                .insert(user_name.to_string(), credentials);
            admin
        }

        fn credentials_of(&self, user_name: &str) -> Vec<Credential> {
            self.users.lock().get(user_name).cloned().unwrap_or_default()
        }

        fn mutation_count(&self) -> u32 {
            *self.mutations.lock()
        }
    }

    #[async_trait]
    impl AdminClient for MockAdmin {
        async fn get_user(&self, user_name: &str) -> Result<Option<BackendUser>, AdminError> {
            Ok(self
                .users
                .lock()
                .get(user_name)
                .map(|creds| BackendUser::new(user_name, creds.clone())))
        }

        async fn create_user(
            &self,
            user_name: &str,
            credential: &Credential,
            _system: bool,
        ) -> Result<(), AdminError> {
            *self.mutations.lock() += 1;
            self.users
                .lock()
                .insert(user_name.to_string(), vec![credential.clone()]);
            Ok(())
        }

        async fn create_credential(
            &self,
            user_name: &str,
            credential: &Credential,
        ) -> Result<(), AdminError> {
            if *self.fail_create_credential.lock() {
                return Err(AdminError::Unreachable("injected".into()));
            }
            *self.mutations.lock() += 1;
            self.users
                .lock()
                .entry(user_name.to_string())
                .or_default()
                .push(credential.clone());
            Ok(())
        }

        async fn remove_credential(
            &self,
            user_name: &str,
            access_key_id: &str,
        ) -> Result<(), AdminError> {
            *self.mutations.lock() += 1;
            if let Some(creds) = self.users.lock().get_mut(user_name) {
                creds.retain(|c| c.access_key_id != access_key_id);
            }
            Ok(())
        }

        async fn list_all_buckets(&self) -> Result<Vec<String>, AdminError> {
            Ok(vec![])
        }

        async fn set_bucket_policy(
            &self,
            bucket: &str,
            policy_document: &str,
        ) -> Result<(), AdminError> {
            self.policies
                .lock()
                .push((bucket.to_string(), policy_document.to_string()));
            Ok(())
        }
    }

    fn federated(key: &str, secret: &str) -> FederatedUser {
        FederatedUser::new("alice", Credential::new(key, secret))
    }

    #[tokio::test]
    async fn test_absent_user_is_created_then_noop() {
        let admin = Arc::new(MockAdmin::default());
        let reconciler = IdentityReconciler::new(admin.clone());
        let user = federated("A1", "S1");

        assert!(reconciler.reconcile(&user, RequestId::new()).await);
        assert_eq!(admin.credentials_of("alice"), vec![Credential::new("A1", "S1")]);
        assert_eq!(admin.mutation_count(), 1);

        // Second pass over the same identity is a no-op
        assert!(!reconciler.reconcile(&user, RequestId::new()).await);
        assert_eq!(admin.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_credentials_gets_one_created() {
        let admin = Arc::new(MockAdmin::with_user("alice", vec![]));
        let reconciler = IdentityReconciler::new(admin.clone());

        assert!(reconciler.reconcile(&federated("A1", "S1"), RequestId::new()).await);
        assert_eq!(admin.credentials_of("alice"), vec![Credential::new("A1", "S1")]);
    }

    #[tokio::test]
    async fn test_rotation_replaces_the_stale_pair() {
        let admin = Arc::new(MockAdmin::with_user(
            "alice",
            vec![Credential::new("A1", "S1")],
        ));
        let reconciler = IdentityReconciler::new(admin.clone());

        assert!(reconciler.reconcile(&federated("A2", "S2"), RequestId::new()).await);
        assert_eq!(admin.credentials_of("alice"), vec![Credential::new("A2", "S2")]);
    }

    #[tokio::test]
    async fn test_multiple_credentials_refused() {
        let admin = Arc::new(MockAdmin::with_user(
            "alice",
            vec![Credential::new("A1", "S1"), Credential::new("A2", "S2")],
        ));
        let reconciler = IdentityReconciler::new(admin.clone());

        assert!(!reconciler.reconcile(&federated("A3", "S3"), RequestId::new()).await);
        assert_eq!(admin.mutation_count(), 0);
        assert_eq!(admin.credentials_of("alice").len(), 2);
    }

    #[tokio::test]
    async fn test_failed_create_after_remove_leaves_no_credential() {
        let admin = Arc::new(MockAdmin::with_user(
            "alice",
            vec![Credential::new("A1", "S1")],
        ));
        *admin.fail_create_credential.lock() = true;
        let reconciler = IdentityReconciler::new(admin.clone());

        // Documented window: remove succeeded, create failed, no error raised
        assert!(!reconciler.reconcile(&federated("A2", "S2"), RequestId::new()).await);
        assert!(admin.credentials_of("alice").is_empty());
    }

    #[tokio::test]
    async fn test_new_grouped_user_gets_bucket_policy() {
        let admin = Arc::new(MockAdmin::default());
        let reconciler = IdentityReconciler::new(admin.clone());
        let user = federated("A1", "S1").with_group("analytics");

        assert!(reconciler.reconcile(&user, RequestId::new()).await);
        let policies = admin.policies.lock();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].0, "analytics");
        assert!(policies[0].1.contains("arn:aws:s3:::analytics/*"));
    }
}
