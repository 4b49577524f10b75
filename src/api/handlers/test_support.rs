//! In-memory stores and router wiring for handler tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

use super::{
    auth::{
        AuthConfig, AuthState, Clock, CredentialRecord, CredentialStore, Principal, hash_password,
        utils::normalize_email,
    },
    memberships::{GrantOutcome, MembershipAccount, MembershipStore},
    promotions::{
        Entitlement, EntitlementFacts, ManageError, MembershipLink, Promotion, PromotionRequest,
        PromotionScope, PromotionStore, PromotionSummary, RedeemError, RedemptionEvent, decide,
    },
};
use crate::api::{Services, email::test_support::RecordingEmailSender, router};

pub const TEST_SECRET: &str = "test-token-secret";
pub const TEST_APP_DOMAIN: &str = "https://app.peragrin.com";

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[must_use]
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

#[derive(Default)]
struct Data {
    accounts: Vec<CredentialRecord>,
    organizations: Vec<i32>,
    /// (membership id, community id)
    memberships: Vec<(i32, i32)>,
    links: Vec<(i32, MembershipLink)>,
    promotions: Vec<Promotion>,
    redemptions: Vec<RedemptionEvent>,
    failing: bool,
}

impl Data {
    fn check(&self) -> Result<()> {
        if self.failing {
            Err(anyhow!("store unavailable"))
        } else {
            Ok(())
        }
    }

    fn facts(&self, account_id: i32, promotion_id: i32) -> Option<EntitlementFacts> {
        let promotion = self.promotions.iter().find(|p| p.id == promotion_id)?;
        let prior = self
            .redemptions
            .iter()
            .filter(|event| event.account_id == account_id && event.promotion_id == promotion_id)
            .count();
        Some(EntitlementFacts {
            promotion_expires_at: promotion.expiration,
            single_use: promotion.is_single_use,
            scope: PromotionScope {
                communities: promotion.communities.clone(),
                memberships: promotion.memberships.clone(),
            },
            links: self
                .links
                .iter()
                .filter(|(account, _)| *account == account_id)
                .map(|(_, link)| link.clone())
                .collect(),
            prior_redemptions: i64::try_from(prior).unwrap_or(i64::MAX),
        })
    }

    /// Stand-in for the foreign keys on `promotions` and its scope tables.
    /// A community exists when some membership belongs to it.
    fn check_references(&self, request: &PromotionRequest) -> Result<(), ManageError> {
        let organization_known = self.organizations.contains(&request.organization_id);
        let communities_known = request.communities.iter().all(|community| {
            self.memberships
                .iter()
                .any(|(_, known)| known == community)
        });
        let memberships_known = request
            .memberships
            .iter()
            .all(|membership| self.memberships.iter().any(|(known, _)| known == membership));
        if organization_known && communities_known && memberships_known {
            Ok(())
        } else {
            Err(ManageError::UnknownReference)
        }
    }
}

/// One mutex over all tables, so `redeem` is atomic like the Postgres transaction.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Data>,
}

impl MemoryStore {
    pub async fn add_account(&self, email: &str, password: Option<&str>, is_super: bool) -> Result<i32> {
        let password_hash = password.map(hash_password).transpose()?;
        let mut data = self.data.lock().await;
        let id = i32::try_from(data.accounts.len())? + 1;
        data.accounts.push(CredentialRecord {
            id,
            email: normalize_email(email),
            is_super,
            password_hash,
        });
        Ok(id)
    }

    pub async fn add_organization(&self, organization_id: i32) {
        self.data.lock().await.organizations.push(organization_id);
    }

    pub async fn add_membership(&self, membership_id: i32, community_id: i32) {
        self.data
            .lock()
            .await
            .memberships
            .push((membership_id, community_id));
    }

    pub async fn link(&self, account_id: i32, membership_id: i32, expires_at: Option<DateTime<Utc>>) {
        let mut data = self.data.lock().await;
        let community_id = data
            .memberships
            .iter()
            .find(|(id, _)| *id == membership_id)
            .map_or(0, |(_, community)| *community);
        data.links.push((
            account_id,
            MembershipLink {
                membership_id,
                community_id,
                expires_at,
            },
        ));
    }

    pub async fn add_promotion(
        &self,
        id: i32,
        scope: PromotionScope,
        expires_at: Option<DateTime<Utc>>,
        single_use: bool,
    ) {
        self.data.lock().await.promotions.push(Promotion {
            id,
            organization_id: 1,
            name: format!("promotion {id}"),
            description: String::new(),
            exclusions: String::new(),
            expiration: expires_at,
            is_single_use: single_use,
            communities: scope.communities,
            memberships: scope.memberships,
        });
    }

    pub async fn redemption_count(&self, account_id: i32, promotion_id: i32) -> usize {
        self.data
            .lock()
            .await
            .redemptions
            .iter()
            .filter(|event| event.account_id == account_id && event.promotion_id == promotion_id)
            .count()
    }

    pub async fn password_hash(&self, account_id: i32) -> Option<String> {
        self.data
            .lock()
            .await
            .accounts
            .iter()
            .find(|account| account.id == account_id)
            .and_then(|account| account.password_hash.clone())
    }

    pub async fn link_expiration(
        &self,
        account_id: i32,
        membership_id: i32,
    ) -> Option<Option<DateTime<Utc>>> {
        self.data
            .lock()
            .await
            .links
            .iter()
            .find(|(account, link)| *account == account_id && link.membership_id == membership_id)
            .map(|(_, link)| link.expires_at)
    }

    pub async fn set_failing(&self, failing: bool) {
        self.data.lock().await.failing = failing;
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        let data = self.data.lock().await;
        data.check()?;
        let email = normalize_email(email);
        Ok(data
            .accounts
            .iter()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn set_password_hash(&self, account_id: i32, password_hash: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        data.check()?;
        Ok(data
            .accounts
            .iter_mut()
            .find(|account| account.id == account_id)
            .map(|account| account.password_hash = Some(password_hash.to_string()))
            .is_some())
    }
}

#[async_trait]
impl PromotionStore for MemoryStore {
    async fn entitlement(
        &self,
        account_id: i32,
        promotion_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>> {
        let data = self.data.lock().await;
        data.check()?;
        Ok(data
            .facts(account_id, promotion_id)
            .map(|facts| decide(&facts, now)))
    }

    async fn redeem(
        &self,
        account_id: i32,
        promotion_id: i32,
        now: DateTime<Utc>,
    ) -> Result<RedemptionEvent, RedeemError> {
        let mut data = self.data.lock().await;
        data.check().map_err(RedeemError::Store)?;
        let facts = data
            .facts(account_id, promotion_id)
            .ok_or(RedeemError::PromotionNotFound)?;
        if let Entitlement::Denied(reason) = decide(&facts, now) {
            return Err(RedeemError::Denied(reason));
        }
        let event = RedemptionEvent {
            account_id,
            promotion_id,
            consumed_at: now,
        };
        data.redemptions.push(event.clone());
        Ok(event)
    }

    async fn redemptions(
        &self,
        account_id: i32,
        promotion_id: Option<i32>,
    ) -> Result<Vec<RedemptionEvent>> {
        let data = self.data.lock().await;
        data.check()?;
        Ok(data
            .redemptions
            .iter()
            .rev()
            .filter(|event| {
                event.account_id == account_id
                    && promotion_id.is_none_or(|id| event.promotion_id == id)
            })
            .cloned()
            .collect())
    }

    async fn create(&self, request: PromotionRequest) -> Result<Promotion, ManageError> {
        let mut data = self.data.lock().await;
        data.check().map_err(ManageError::Store)?;
        data.check_references(&request)?;
        let id = data
            .promotions
            .iter()
            .map(|promotion| promotion.id)
            .max()
            .unwrap_or(0)
            + 1;
        let promotion = Promotion::from_request(id, request);
        data.promotions.push(promotion.clone());
        Ok(promotion)
    }

    async fn update(
        &self,
        promotion_id: i32,
        request: PromotionRequest,
    ) -> Result<Promotion, ManageError> {
        let mut data = self.data.lock().await;
        data.check().map_err(ManageError::Store)?;
        if !data.promotions.iter().any(|p| p.id == promotion_id) {
            return Err(ManageError::PromotionNotFound);
        }
        data.check_references(&request)?;
        let promotion = Promotion::from_request(promotion_id, request);
        if let Some(existing) = data.promotions.iter_mut().find(|p| p.id == promotion_id) {
            *existing = promotion.clone();
        }
        Ok(promotion)
    }

    async fn delete(&self, promotion_id: i32) -> Result<bool> {
        let mut data = self.data.lock().await;
        data.check()?;
        let before = data.promotions.len();
        data.promotions.retain(|p| p.id != promotion_id);
        if data.promotions.len() == before {
            return Ok(false);
        }
        data.redemptions
            .retain(|event| event.promotion_id != promotion_id);
        Ok(true)
    }

    async fn list_by_organization(&self, organization_id: i32) -> Result<Vec<PromotionSummary>> {
        let data = self.data.lock().await;
        data.check()?;
        let mut promotions: Vec<PromotionSummary> = data
            .promotions
            .iter()
            .filter(|promotion| promotion.organization_id == organization_id)
            .map(|promotion| {
                let redemptions = data
                    .redemptions
                    .iter()
                    .filter(|event| event.promotion_id == promotion.id)
                    .count();
                PromotionSummary {
                    promotion: promotion.clone(),
                    redemptions: i64::try_from(redemptions).unwrap_or(i64::MAX),
                }
            })
            .collect();
        promotions.sort_by_key(|summary| summary.promotion.id);
        Ok(promotions)
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn grant(
        &self,
        membership_id: i32,
        email: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<GrantOutcome>> {
        let mut data = self.data.lock().await;
        data.check()?;
        let Some(community_id) = data
            .memberships
            .iter()
            .find(|(id, _)| *id == membership_id)
            .map(|(_, community)| *community)
        else {
            return Ok(None);
        };

        let email = normalize_email(email);
        let existing = data
            .accounts
            .iter()
            .find(|account| account.email == email)
            .map(CredentialRecord::principal);
        let (account, created) = match existing {
            Some(principal) => (principal, false),
            None => {
                let record = CredentialRecord {
                    id: i32::try_from(data.accounts.len())? + 1,
                    email,
                    is_super: false,
                    password_hash: None,
                };
                let principal = record.principal();
                data.accounts.push(record);
                (principal, true)
            }
        };

        data.links
            .retain(|(id, link)| !(*id == account.id && link.membership_id == membership_id));
        data.links.push((
            account.id,
            MembershipLink {
                membership_id,
                community_id,
                expires_at,
            },
        ));

        Ok(Some(GrantOutcome { account, created }))
    }

    async fn revoke(&self, membership_id: i32, account_id: i32) -> Result<bool> {
        let mut data = self.data.lock().await;
        data.check()?;
        let before = data.links.len();
        data.links
            .retain(|(id, link)| !(*id == account_id && link.membership_id == membership_id));
        Ok(data.links.len() < before)
    }

    async fn accounts(&self, membership_id: i32) -> Result<Option<Vec<MembershipAccount>>> {
        let data = self.data.lock().await;
        data.check()?;
        if !data.memberships.iter().any(|(id, _)| *id == membership_id) {
            return Ok(None);
        }
        let mut accounts: Vec<MembershipAccount> = data
            .links
            .iter()
            .filter(|(_, link)| link.membership_id == membership_id)
            .filter_map(|(account_id, link)| {
                data.accounts
                    .iter()
                    .find(|account| account.id == *account_id)
                    .map(|account| MembershipAccount {
                        account_id: account.id,
                        email: account.email.clone(),
                        expiration: link.expires_at,
                    })
            })
            .collect();
        accounts.sort_by_key(|account| account.account_id);
        Ok(Some(accounts))
    }

    async fn update_expiration(
        &self,
        membership_id: i32,
        account_id: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<MembershipAccount>> {
        let mut data = self.data.lock().await;
        data.check()?;
        let Some(email) = data
            .accounts
            .iter()
            .find(|account| account.id == account_id)
            .map(|account| account.email.clone())
        else {
            return Ok(None);
        };
        let Some((_, link)) = data
            .links
            .iter_mut()
            .find(|(id, link)| *id == account_id && link.membership_id == membership_id)
        else {
            return Ok(None);
        };
        link.expires_at = expires_at;
        Ok(Some(MembershipAccount {
            account_id,
            email,
            expiration: expires_at,
        }))
    }
}

/// Router over a shared `MemoryStore` with a fixed clock at [`test_now`].
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub emails: Arc<RecordingEmailSender>,
    pub auth_state: Arc<AuthState>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        Self::with_config(AuthConfig::new(
            SecretString::from(TEST_SECRET.to_string()),
            TEST_APP_DOMAIN.to_string(),
        ))
    }

    pub fn with_config(config: AuthConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::default());
        let emails = Arc::new(RecordingEmailSender::default());
        let auth_state = Arc::new(AuthState::new(
            config,
            store.clone(),
            Arc::new(FixedClock(test_now())),
        ));
        // Never connected; only `/health` would touch it.
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let services = Services {
            pool,
            auth_state: auth_state.clone(),
            promotions: store.clone(),
            memberships: store.clone(),
            email_sender: emails.clone(),
        };
        let router = router(services, Duration::from_secs(30))?;
        Ok(Self {
            store,
            emails,
            auth_state,
            router,
        })
    }

    /// Sign a session token for `principal` at the fixed test time.
    pub fn token_for(&self, principal: &Principal) -> Result<String> {
        Ok(self.auth_state.codec().issue(
            principal,
            self.auth_state.config().session_ttl(),
            test_now().timestamp(),
        )?)
    }
}
