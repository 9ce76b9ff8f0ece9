//! Account domain model.
//!
//! A row in `accounts` is surfaced as a tagged union: a pending account is an
//! identity-only placeholder created when a registration OTP is requested, a
//! verified account carries the full profile. Verification happens exactly
//! once; afterwards only the reset flow repopulates the OTP challenge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Account role. Chefs can publish recipes, ordinary users browse and plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Chef,
    Ordinary,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chef => "chef",
            Self::Ordinary => "ordinary",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Ordinary
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "chef" => Ok(Self::Chef),
            "ordinary" => Ok(Self::Ordinary),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Outstanding OTP challenge; both fields live and die together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity-only placeholder awaiting verification.
#[derive(Debug, Clone)]
pub struct PendingAccount {
    pub id: Uuid,
    pub email: String,
    pub challenge: Option<OtpChallenge>,
}

/// Fully registered account.
#[derive(Debug, Clone)]
pub struct VerifiedAccount {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub mobile_number: Option<String>,
    pub role: Role,
    pub avatar_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum Account {
    Pending(PendingAccount),
    Verified(VerifiedAccount),
}

impl Account {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Pending(pending) => pending.id,
            Self::Verified(verified) => verified.id,
        }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::Pending(pending) => &pending.email,
            Self::Verified(verified) => &verified.email,
        }
    }

    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    #[must_use]
    pub const fn as_verified(&self) -> Option<&VerifiedAccount> {
        match self {
            Self::Verified(verified) => Some(verified),
            Self::Pending(_) => None,
        }
    }

    #[must_use]
    pub fn into_verified(self) -> Option<VerifiedAccount> {
        match self {
            Self::Verified(verified) => Some(verified),
            Self::Pending(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("chef".parse::<Role>(), Ok(Role::Chef));
        assert_eq!("ordinary".parse::<Role>(), Ok(Role::Ordinary));
        assert_eq!("Chef".parse::<Role>(), Ok(Role::Chef));
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(Role::Chef.to_string(), "chef");
    }

    #[test]
    fn role_defaults_to_ordinary() {
        assert_eq!(Role::default(), Role::Ordinary);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Chef).unwrap_or_default(),
            "\"chef\""
        );
        let role: Role = serde_json::from_str("\"ordinary\"").expect("deserialize role");
        assert_eq!(role, Role::Ordinary);
    }

    #[test]
    fn account_union_exposes_identity() {
        let id = Uuid::new_v4();
        let pending = Account::Pending(PendingAccount {
            id,
            email: "new@example.com".to_string(),
            challenge: None,
        });
        assert_eq!(pending.id(), id);
        assert_eq!(pending.email(), "new@example.com");
        assert!(!pending.is_verified());
        assert!(pending.as_verified().is_none());

        let verified = Account::Verified(VerifiedAccount {
            id,
            email: "chef@example.com".to_string(),
            username: "chefA".to_string(),
            mobile_number: None,
            role: Role::Chef,
            avatar_path: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        assert!(verified.is_verified());
        assert_eq!(
            verified.as_verified().map(|account| account.role),
            Some(Role::Chef)
        );
        assert!(verified.into_verified().is_some());
    }
}
