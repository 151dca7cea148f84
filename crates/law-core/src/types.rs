//! Registry domain types
//!
//! Values that cross the ledger boundary arrive as strings. The newtypes here
//! are the only way to get a validated username, address or amount, so any
//! value held by a [`UserRecord`] has already passed validation.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::InputError;

// ============================================================================
// Scalars
// ============================================================================

/// Registered username. Case-sensitive, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Validate a username. Surrounding whitespace is kept; a blank name is rejected.
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        if raw.trim().is_empty() {
            return Err(InputError::new("username", "must not be empty"));
        }
        Ok(Self(raw.to_string()))
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chain address as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Validate an address: trimmed, non-empty, no embedded whitespace.
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InputError::new("address", "must not be empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(InputError::new("address", "must not contain whitespace"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-negative integer token quantity of arbitrary size.
///
/// Stored as a canonical base-10 digit string (no sign, no leading zeros
/// except for zero itself), so equality and ordering are exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(String);

impl Amount {
    /// Zero tokens.
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    /// Parse a base-10 non-negative integer.
    ///
    /// Surrounding whitespace is ignored. Signs, decimal points, exponents and
    /// separators are rejected. Leading zeros are stripped.
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InputError::new("amount", "must not be empty"));
        }
        if trimmed.starts_with('-') {
            return Err(InputError::new("amount", "must not be negative"));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InputError::new(
                "amount",
                format!("'{trimmed}' is not a base-10 integer"),
            ));
        }
        let canonical = trimmed.trim_start_matches('0');
        if canonical.is_empty() {
            return Ok(Self::zero());
        }
        Ok(Self(canonical.to_string()))
    }

    /// Canonical digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    /// Exact sum.
    #[must_use]
    pub fn add(&self, other: &Amount) -> Amount {
        let a = self.0.as_bytes();
        let b = other.0.as_bytes();
        let mut out = Vec::with_capacity(a.len().max(b.len()) + 1);
        let mut carry = 0u8;
        let mut i = a.len();
        let mut j = b.len();
        while i > 0 || j > 0 || carry > 0 {
            let da = if i > 0 { i -= 1; a[i] - b'0' } else { 0 };
            let db = if j > 0 { j -= 1; b[j] - b'0' } else { 0 };
            let sum = da + db + carry;
            out.push(b'0' + sum % 10);
            carry = sum / 10;
        }
        Self::from_reversed_digits(out)
    }

    /// Exact difference, or `None` if `other` is larger.
    #[must_use]
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self < other {
            return None;
        }
        let a = self.0.as_bytes();
        let b = other.0.as_bytes();
        let mut out = Vec::with_capacity(a.len());
        let mut borrow = 0i8;
        let mut j = b.len();
        for i in (0..a.len()).rev() {
            let da = (a[i] - b'0') as i8;
            let db = if j > 0 { j -= 1; (b[j] - b'0') as i8 } else { 0 };
            let mut diff = da - db - borrow;
            borrow = 0;
            if diff < 0 {
                diff += 10;
                borrow = 1;
            }
            out.push(b'0' + diff as u8);
        }
        Some(Self::from_reversed_digits(out))
    }

    fn from_reversed_digits(mut digits: Vec<u8>) -> Amount {
        while digits.len() > 1 && digits.last() == Some(&b'0') {
            digits.pop();
        }
        digits.reverse();
        // Only ASCII digits are ever pushed.
        Amount(digits.into_iter().map(char::from).collect())
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Amount {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::parse(&value)
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(value.to_string())
    }
}

/// Kind of mutating ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Register a new user with an initial allocation
    Register,
    /// Redeem (burn) tokens held by the signer
    Redeem,
    /// Mint tokens to an existing user
    Reward,
}

impl OperationKind {
    /// Lowercase label used in logs and messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Redeem => "redeem",
            Self::Reward => "reward",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Records and snapshots
// ============================================================================

/// One registered user as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Username assigned at registration
    pub username: Username,
    /// Chain address bound to the username
    pub address: Address,
    /// Token balance at snapshot time
    pub balance: Amount,
}

impl UserRecord {
    /// Create a record.
    pub fn new(username: Username, address: Address, balance: Amount) -> Self {
        Self {
            username,
            address,
            balance,
        }
    }
}

/// Uniqueness violation detected while assembling a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// Two records share a username
    #[error("duplicate username '{0}'")]
    DuplicateUsername(Username),
    /// Two records share an address
    #[error("duplicate address '{0}'")]
    DuplicateAddress(Address),
}

/// Ordered, immutable view of every registered user.
///
/// Order is the ledger's enumeration order. No two records share a username
/// or an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    users: Vec<UserRecord>,
}

impl RegistrySnapshot {
    /// Empty snapshot, used before the first successful refresh.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, rejecting duplicate usernames or addresses.
    pub fn from_records(users: Vec<UserRecord>) -> Result<Self, SnapshotError> {
        let mut names = HashSet::with_capacity(users.len());
        let mut addresses = HashSet::with_capacity(users.len());
        for user in &users {
            if !addresses.insert(&user.address) {
                return Err(SnapshotError::DuplicateAddress(user.address.clone()));
            }
            if !names.insert(&user.username) {
                return Err(SnapshotError::DuplicateUsername(user.username.clone()));
            }
        }
        Ok(Self { users })
    }

    /// Records in enumeration order.
    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    /// Iterate records in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.iter()
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no users are registered.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Find a record by exact (case-sensitive) username.
    pub fn find_by_username(&self, username: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.username.as_str() == username)
    }

    /// Find a record by address.
    pub fn find_by_address(&self, address: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.address.as_str() == address)
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Amount {
        self.users
            .iter()
            .fold(Amount::zero(), |acc, u| acc.add(&u.balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(name: &str, addr: &str, balance: &str) -> UserRecord {
        UserRecord::new(
            Username::parse(name).unwrap(),
            Address::parse(addr).unwrap(),
            Amount::parse(balance).unwrap(),
        )
    }

    #[test]
    fn test_amount_parse_canonicalizes() {
        assert_eq!(Amount::parse("007").unwrap().as_str(), "7");
        assert_eq!(Amount::parse(" 42 ").unwrap().as_str(), "42");
        assert_eq!(Amount::parse("0000").unwrap(), Amount::zero());
        assert!(Amount::parse("0").unwrap().is_zero());
    }

    #[test]
    fn test_amount_parse_rejects_non_integers() {
        for raw in ["", "   ", "-5", "+5", "1.5", "1e3", "1_000", "abc", "0x10"] {
            let err = Amount::parse(raw).unwrap_err();
            assert_eq!(err.field, "amount", "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_amount_beyond_u128() {
        let big = "340282366920938463463374607431768211456"; // u128::MAX + 1
        let a = Amount::parse(big).unwrap();
        let sum = a.add(&Amount::from(1));
        assert_eq!(sum.as_str(), "340282366920938463463374607431768211457");
        assert_eq!(sum.checked_sub(&a), Some(Amount::from(1)));
    }

    #[test]
    fn test_amount_checked_sub_underflow() {
        assert_eq!(Amount::from(5).checked_sub(&Amount::from(6)), None);
        assert_eq!(Amount::from(100).checked_sub(&Amount::from(1)), Some(Amount::from(99)));
        assert_eq!(Amount::from(100).checked_sub(&Amount::from(100)), Some(Amount::zero()));
    }

    #[test]
    fn test_amount_ordering_is_numeric() {
        assert!(Amount::from(9) < Amount::from(10));
        assert!(Amount::from(100) > Amount::from(99));
    }

    #[test]
    fn test_amount_try_from_string() {
        assert_eq!(Amount::try_from("12".to_string()).unwrap(), Amount::from(12));
        assert!(Amount::try_from("-1".to_string()).is_err());
        assert_eq!(String::from(Amount::from(12)), "12");
    }

    #[test]
    fn test_username_and_address_validation() {
        assert!(Username::parse("").is_err());
        assert!(Username::parse("  ").is_err());
        assert_eq!(Username::parse("Alice").unwrap().as_str(), "Alice");
        assert_ne!(Username::parse("alice").unwrap(), Username::parse("Alice").unwrap());

        assert!(Address::parse("").is_err());
        assert!(Address::parse("0x a").is_err());
        assert_eq!(Address::parse(" 0xabc ").unwrap().as_str(), "0xabc");
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let dup_name = RegistrySnapshot::from_records(vec![
            record("alice", "0xA", "1"),
            record("alice", "0xB", "2"),
        ]);
        assert!(matches!(dup_name, Err(SnapshotError::DuplicateUsername(_))));

        let dup_addr = RegistrySnapshot::from_records(vec![
            record("alice", "0xA", "1"),
            record("bob", "0xA", "2"),
        ]);
        assert!(matches!(dup_addr, Err(SnapshotError::DuplicateAddress(_))));
    }

    #[test]
    fn test_snapshot_lookups_and_supply() {
        let snapshot = RegistrySnapshot::from_records(vec![
            record("alice", "0xA", "100"),
            record("bob", "0xB", "50"),
        ])
        .unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.find_by_username("bob").unwrap().address.as_str(), "0xB");
        assert_eq!(snapshot.find_by_address("0xA").unwrap().username.as_str(), "alice");
        assert!(snapshot.find_by_username("Bob").is_none());
        assert_eq!(snapshot.total_supply(), Amount::from(150));
    }

    proptest! {
        #[test]
        fn prop_amount_add_matches_u64(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
            let sum = Amount::from(a).add(&Amount::from(b));
            prop_assert_eq!(sum, Amount::from(a + b));
        }

        #[test]
        fn prop_amount_sub_matches_u64(a in any::<u64>(), b in any::<u64>()) {
            let diff = Amount::from(a).checked_sub(&Amount::from(b));
            prop_assert_eq!(diff, a.checked_sub(b).map(Amount::from));
        }

        #[test]
        fn prop_amount_parse_accepts_leading_zeros(n in any::<u64>(), zeros in 0usize..5) {
            let raw = format!("{}{}", "0".repeat(zeros), n);
            prop_assert_eq!(Amount::parse(&raw).unwrap(), Amount::from(n));
        }
    }
}
