//! Screen routes and the sign-in guard.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    Login,
    #[default]
    Tasks,
    Board,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Tasks => "/",
            Route::Board => "/board",
        }
    }

    /// Parse a path; anything unknown lands on the list view.
    pub fn parse(path: &str) -> Route {
        match path.trim().trim_end_matches('/') {
            "/login" | "login" => Route::Login,
            "/board" | "board" => Route::Board,
            _ => Route::Tasks,
        }
    }

    pub fn is_protected(self) -> bool {
        !matches!(self, Route::Login)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of checking a route against the sign-in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Allow(Route),
    /// Send to the login screen; `then` is where to go after signing in.
    ToLogin { then: Route },
    /// Already signed in, the login screen is skipped.
    ToHome,
}

impl Guard {
    /// Route that should actually be shown.
    pub fn target(self) -> Route {
        match self {
            Guard::Allow(r) => r,
            Guard::ToLogin { .. } => Route::Login,
            Guard::ToHome => Route::Tasks,
        }
    }
}

pub fn guard(route: Route, signed_in: bool) -> Guard {
    match (route.is_protected(), signed_in) {
        (true, false) => Guard::ToLogin { then: route },
        (false, true) => Guard::ToHome,
        _ => Guard::Allow(route),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paths() {
        assert_eq!(Route::parse("/"), Route::Tasks);
        assert_eq!(Route::parse("/board/"), Route::Board);
        assert_eq!(Route::parse("login"), Route::Login);
        assert_eq!(Route::parse("/nowhere"), Route::Tasks);
    }

    #[test]
    fn protected_routes_need_a_session() {
        assert_eq!(guard(Route::Board, false), Guard::ToLogin { then: Route::Board });
        assert_eq!(guard(Route::Board, true), Guard::Allow(Route::Board));
        assert_eq!(guard(Route::Login, true).target(), Route::Tasks);
        assert_eq!(guard(Route::Login, false), Guard::Allow(Route::Login));
    }
}
