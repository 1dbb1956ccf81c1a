//! Resolution of `location/scope` identifiers.

use std::fmt;

/// Location and scope name derived from an identifier such as
/// `us-east-1/myapp` or just `myapp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeCoordinate {
    pub scope: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scope could not be determined from {identifier:?}")]
pub struct MalformedScopeError {
    pub identifier: String,
}

impl fmt::Display for ScopeCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}", self.scope)
        } else {
            write!(f, "{}/{}", self.location, self.scope)
        }
    }
}

/// Split an identifier on `/` into a coordinate.
///
/// Without a `/` the whole identifier is the scope and the location is empty.
/// With one, the first segment is the location and the second the scope; any
/// further segments are ignored.
pub fn resolve_scope(identifier: &str) -> Result<ScopeCoordinate, MalformedScopeError> {
    let malformed = || MalformedScopeError {
        identifier: identifier.to_string(),
    };

    let mut segments = identifier.split('/');
    let first = segments.next().unwrap_or_default();
    let coordinate = match segments.next() {
        None => ScopeCoordinate {
            scope: first.to_string(),
            location: String::new(),
        },
        Some(scope) => ScopeCoordinate {
            scope: scope.to_string(),
            location: first.to_string(),
        },
    };

    if coordinate.scope.is_empty() {
        return Err(malformed());
    }
    Ok(coordinate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_identifier_has_no_location() {
        let c = resolve_scope("myapp").unwrap();
        assert_eq!(c.scope, "myapp");
        assert_eq!(c.location, "");
    }

    #[test]
    fn location_prefix_is_split_off() {
        let c = resolve_scope("us-east-1/myapp").unwrap();
        assert_eq!(c.location, "us-east-1");
        assert_eq!(c.scope, "myapp");
        assert_eq!(c.to_string(), "us-east-1/myapp");
    }

    #[test]
    fn extra_segments_are_ignored() {
        let c = resolve_scope("prod/web/canary").unwrap();
        assert_eq!(c.location, "prod");
        assert_eq!(c.scope, "web");
    }

    #[test]
    fn empty_identifier_is_rejected() {
        assert_eq!(
            resolve_scope(""),
            Err(MalformedScopeError {
                identifier: String::new()
            })
        );
    }

    #[test]
    fn trailing_slash_leaves_no_scope() {
        assert!(resolve_scope("us-east-1/").is_err());
    }

    #[test]
    fn leading_slash_keeps_empty_location() {
        let c = resolve_scope("/myapp").unwrap();
        assert_eq!(c.location, "");
        assert_eq!(c.scope, "myapp");
    }
}
