use crate::config::{RouteAccess, RouteConfig, RouteKind};
use crate::telemetry::metrics::values::ROUTE_UNMATCHED;

/// Gate rule resolved for one request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Matched `[[routes]]` prefix, `None` for unmatched paths
    pub prefix: Option<String>,
    pub kind: RouteKind,
    pub access: RouteAccess,
}

impl RouteMatch {
    /// Label used in logs and metrics
    pub fn label(&self) -> &str {
        self.prefix.as_deref().unwrap_or(ROUTE_UNMATCHED)
    }

    fn unmatched(path: &str) -> Self {
        let kind = if prefix_matches("/api", path) { RouteKind::Api } else { RouteKind::Page };
        Self { prefix: None, kind, access: RouteAccess::Public }
    }
}

/// Ordered route rules. The first matching prefix wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteConfig>,
}

impl RouteTable {
    pub fn new(routes: &[RouteConfig]) -> Self {
        Self { routes: routes.to_vec() }
    }

    /// Resolve the rule for a canonical `path` (see [`canonical_path`]).
    /// Unmatched paths are public and use the global rate policy. They count
    /// as API routes under `/api`.
    ///
    /// [`canonical_path`]: super::canonical_path
    pub fn pick(&self, path: &str) -> RouteMatch {
        self.routes
            .iter()
            .find(|r| prefix_matches(&r.prefix, path))
            .map(|r| RouteMatch { prefix: Some(r.prefix.clone()), kind: r.kind, access: r.access })
            .unwrap_or_else(|| RouteMatch::unmatched(path))
    }
}

/// Prefix match on path segment boundaries: `/api/admin` covers
/// `/api/admin` and `/api/admin/users`, not `/api/administrators`.
/// ASCII case is ignored, as the application's router does.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    let Some((head, rest)) = path.split_at_checked(prefix.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(prefix)
        && (prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(prefix: &str, kind: RouteKind, access: RouteAccess) -> RouteConfig {
        RouteConfig { prefix: prefix.to_string(), kind, access, rate_limit: None }
    }

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::new(&[
            route("/api/admin", RouteKind::Api, RouteAccess::Admin),
            route("/api", RouteKind::Api, RouteAccess::Protected),
        ]);

        assert_eq!(table.pick("/api/admin/users").access, RouteAccess::Admin);
        assert_eq!(table.pick("/api/sessions").access, RouteAccess::Protected);
        assert_eq!(table.pick("/api/sessions").label(), "/api");
    }

    #[test]
    fn test_prefix_respects_segments() {
        let table = RouteTable::new(&[route("/admin", RouteKind::Page, RouteAccess::Admin)]);

        assert_eq!(table.pick("/admin").access, RouteAccess::Admin);
        assert_eq!(table.pick("/admin/reports").access, RouteAccess::Admin);
        assert_eq!(table.pick("/administrators").access, RouteAccess::Public);
    }

    #[test]
    fn test_prefix_ignores_case() {
        let table = RouteTable::new(&[route("/api/admin", RouteKind::Api, RouteAccess::Admin)]);

        assert_eq!(table.pick("/API/ADMIN/users").access, RouteAccess::Admin);
        assert_eq!(table.pick("/Api/Admin").label(), "/api/admin");
        assert_eq!(table.pick("/API/ADMINISTRATORS").access, RouteAccess::Public);
        assert_eq!(table.pick("/API/therapists").kind, RouteKind::Api);
    }

    #[test]
    fn test_root_prefix_matches_everything() {
        let table = RouteTable::new(&[route("/", RouteKind::Page, RouteAccess::Protected)]);
        assert_eq!(table.pick("/anything/at/all").access, RouteAccess::Protected);
    }

    #[test]
    fn test_unmatched_kind_is_inferred() {
        let table = RouteTable::default();

        let api = table.pick("/api/therapists");
        assert_eq!(api.kind, RouteKind::Api);
        assert_eq!(api.access, RouteAccess::Public);
        assert_eq!(api.label(), ROUTE_UNMATCHED);

        assert_eq!(table.pick("/about").kind, RouteKind::Page);
        assert_eq!(table.pick("/apiary").kind, RouteKind::Page);
    }
}
