use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Declares an integer row identifier newtype.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        #[non_exhaustive]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the inner row id.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(
    /// Identifier of a catalog product.
    ProductId
);
row_id!(
    /// Identifier of a color, size, brand or category row.
    AttributeId
);
row_id!(
    /// Identifier of a product collection.
    CollectionId
);
row_id!(
    /// Identifier of a product image.
    ImageId
);
row_id!(
    /// Identifier of a product comment.
    CommentId
);
row_id!(
    /// Identifier of a shopping cart.
    CartId
);
row_id!(
    /// Identifier of a line inside a cart.
    CartItemId
);
row_id!(
    /// Identifier of a placed order.
    OrderId
);
row_id!(
    /// Identifier of a line inside an order.
    OrderItemId
);
row_id!(
    /// Identifier of a registered user.
    UserId
);

/// Opaque key identifying an anonymous browsing session.
///
/// Format: 32 lowercase hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionKey(String);

impl SessionKey {
    /// Length of a session key in characters.
    pub const LEN: usize = 32;

    /// Creates a new random session key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parses a session key received from a client.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidSessionKey`] unless `raw` is exactly
    /// 32 lowercase hex digits.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let well_formed = raw.len() == Self::LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(CoreError::InvalidSessionKey);
        }
        Ok(Self(raw.to_owned()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionKey {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<SessionKey> for String {
    fn from(key: SessionKey) -> Self {
        key.0
    }
}

/// Who a cart or order belongs to.
///
/// Authenticated requests are scoped by user; everything else by the
/// session key carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// A signed-in user.
    User(UserId),
    /// An anonymous visitor.
    Anonymous(SessionKey),
}

impl Identity {
    /// Returns the user id for authenticated identities.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }

    /// Returns the session key for anonymous identities.
    #[must_use]
    pub fn session_key(&self) -> Option<&SessionKey> {
        match self {
            Self::User(_) => None,
            Self::Anonymous(key) => Some(key),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Anonymous(key) => write!(f, "session:{}", &key.as_str()[..8]),
        }
    }
}
