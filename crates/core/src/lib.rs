#![forbid(unsafe_code)]

pub mod resource;

pub mod ids {
    use serde::{Deserialize, Serialize};
    use std::fmt;

    /// Authenticated subject, as resolved by the upstream auth middleware.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct SubjectId(i64);

    impl SubjectId {
        pub fn try_new(value: i64) -> Result<Self, IdError> {
            validate_numeric_id(value)?;
            Ok(Self(value))
        }

        pub fn as_i64(self) -> i64 {
            self.0
        }
    }

    impl fmt::Display for SubjectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    /// Tenant the request runs under.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct DomainId(i64);

    impl DomainId {
        pub fn try_new(value: i64) -> Result<Self, IdError> {
            validate_numeric_id(value)?;
            Ok(Self(value))
        }

        pub fn as_i64(self) -> i64 {
            self.0
        }
    }

    impl fmt::Display for DomainId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum IdError {
        NotPositive,
    }

    impl IdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::NotPositive => "id must be a positive integer",
            }
        }
    }

    fn validate_numeric_id(value: i64) -> Result<(), IdError> {
        if value <= 0 {
            return Err(IdError::NotPositive);
        }
        Ok(())
    }

    /// Public identifier of a resource. Assigned once at creation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct ResourceUuid(uuid::Uuid);

    impl ResourceUuid {
        pub fn generate() -> Self {
            Self(uuid::Uuid::new_v4())
        }

        pub fn parse(value: &str) -> Result<Self, ResourceUuidError> {
            let value = value.trim();
            if value.is_empty() {
                return Err(ResourceUuidError::Empty);
            }
            let parsed = uuid::Uuid::parse_str(value).map_err(|_| ResourceUuidError::Malformed)?;
            if parsed.is_nil() {
                return Err(ResourceUuidError::Nil);
            }
            Ok(Self(parsed))
        }

        pub fn as_uuid(&self) -> &uuid::Uuid {
            &self.0
        }
    }

    impl fmt::Display for ResourceUuid {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0.hyphenated())
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ResourceUuidError {
        Empty,
        Malformed,
        Nil,
    }

    impl ResourceUuidError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "resource uuid must not be empty",
                Self::Malformed => "resource uuid is malformed",
                Self::Nil => "resource uuid must not be nil",
            }
        }
    }
}

pub mod model {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Action {
        Read,
        Modify,
        Delete,
    }

    impl Action {
        /// Actions granted to the creating subject of every resource.
        pub const OWNER: [Action; 3] = [Action::Read, Action::Modify, Action::Delete];

        pub fn as_str(self) -> &'static str {
            match self {
                Action::Read => "read",
                Action::Modify => "modify",
                Action::Delete => "delete",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value.trim() {
                "read" => Some(Action::Read),
                "modify" => Some(Action::Modify),
                "delete" => Some(Action::Delete),
                _ => None,
            }
        }
    }

    /// Object registry classification. Only articles exist today.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ObjectKind {
        Article,
    }

    impl ObjectKind {
        pub fn as_str(self) -> &'static str {
            match self {
                ObjectKind::Article => "article",
            }
        }
    }
}
