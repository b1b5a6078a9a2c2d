use std::fmt;

use tokio::sync::watch;

use crate::state::{SessionSnapshot, SessionStore};

/// Which screen set is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Start-up restoration has not finished; nothing is shown yet.
    Loading,
    Authenticated,
    Unauthenticated,
}

/// A screen of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Login,
    Register,
    Home,
    Search,
    Wallet,
    Profile,
    EditProfile,
    Vehicles,
    AddVehicle,
}

const UNAUTHENTICATED_SCREENS: &[Screen] = &[Screen::Login, Screen::Register];

const AUTHENTICATED_SCREENS: &[Screen] = &[
    Screen::Home,
    Screen::Search,
    Screen::Wallet,
    Screen::Profile,
    Screen::EditProfile,
    Screen::Vehicles,
    Screen::AddVehicle,
];

impl Route {
    /// The screens reachable under this route. The first one is the entry screen.
    pub fn screens(self) -> &'static [Screen] {
        match self {
            Route::Loading => &[],
            Route::Authenticated => AUTHENTICATED_SCREENS,
            Route::Unauthenticated => UNAUTHENTICATED_SCREENS,
        }
    }

    pub fn entry_screen(self) -> Option<Screen> {
        self.screens().first().copied()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::Loading => "loading",
            Route::Authenticated => "authenticated",
            Route::Unauthenticated => "unauthenticated",
        };
        f.write_str(name)
    }
}

/// Decides the route for a store snapshot.
///
/// Loading wins over everything; after that, a present user means
/// authenticated.
pub fn decide(snapshot: &SessionSnapshot) -> Route {
    if snapshot.loading {
        Route::Loading
    } else if snapshot.user.is_some() {
        Route::Authenticated
    } else {
        Route::Unauthenticated
    }
}

/// Re-evaluates the route whenever the session store changes.
pub struct RouteWatcher {
    receiver: watch::Receiver<SessionSnapshot>,
}

impl RouteWatcher {
    pub fn new(store: &SessionStore) -> Self {
        Self {
            receiver: store.watch(),
        }
    }

    /// The route for the store's current state.
    pub fn current(&self) -> Route {
        decide(&self.receiver.borrow())
    }

    /// Waits for the next store change and returns the route it leads to.
    ///
    /// Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Route> {
        self.receiver.changed().await.ok()?;
        Some(decide(&self.receiver.borrow_and_update()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_has_no_screens() {
        assert!(Route::Loading.screens().is_empty());
        assert_eq!(Route::Loading.entry_screen(), None);
    }

    #[test]
    fn entry_screens() {
        assert_eq!(Route::Unauthenticated.entry_screen(), Some(Screen::Login));
        assert_eq!(Route::Authenticated.entry_screen(), Some(Screen::Home));
    }

    #[test]
    fn screen_sets_are_disjoint() {
        for screen in Route::Authenticated.screens() {
            assert!(!Route::Unauthenticated.screens().contains(screen));
        }
    }

    #[tokio::test]
    async fn watcher_starts_in_loading() {
        let store = SessionStore::new();
        let mut watcher = RouteWatcher::new(&store);
        assert_eq!(watcher.current(), Route::Loading);

        store.finish_loading();
        assert_eq!(watcher.changed().await, Some(Route::Unauthenticated));
    }
}
