//! Which screen stack to show for the current auth snapshot.

use crate::auth::models::Role;
use crate::auth::reconciler::AuthSnapshot;
use crate::errors::BoundaryState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Splash,
    Welcome,
    SupervisorLogin,
    DriverLogin,
    SupervisorHome,
    TicketsList,
    TicketDetail,
    AssignTicket,
    TrucksList,
    TruckDetail,
    TruckMap,
    Stocks,
    ContactUs,
    DriverHome,
    MapView,
    ErrorRecovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationStack {
    Loading,
    Public,
    Supervisor,
    Driver,
    Recovery,
}

impl NavigationStack {
    pub fn for_snapshot(snapshot: &AuthSnapshot, boundary: &BoundaryState) -> Self {
        if let BoundaryState::Failed { .. } = boundary {
            return NavigationStack::Recovery;
        }
        if snapshot.loading {
            return NavigationStack::Loading;
        }
        match snapshot.session().map(|session| session.role()) {
            Some(Role::Supervisor) => NavigationStack::Supervisor,
            Some(Role::Driver) => NavigationStack::Driver,
            None => NavigationStack::Public,
        }
    }

    /// Screens reachable in this stack; the first is the initial route.
    pub fn screens(&self) -> &'static [Screen] {
        use Screen::*;
        match self {
            NavigationStack::Loading => &[Splash],
            NavigationStack::Public => &[Welcome, SupervisorLogin, DriverLogin],
            NavigationStack::Supervisor => &[
                SupervisorHome,
                TicketsList,
                TicketDetail,
                AssignTicket,
                TrucksList,
                TruckDetail,
                TruckMap,
                Stocks,
                ContactUs,
            ],
            NavigationStack::Driver => &[DriverHome, MapView],
            NavigationStack::Recovery => &[ErrorRecovery],
        }
    }

    pub fn initial_screen(&self) -> Screen {
        self.screens()[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::Fields;
    use chrono::Utc;

    use crate::auth::models::{DriverProfile, ProviderProfile, SessionRecord};
    use crate::auth::reconciler::SessionState;

    fn driver_session() -> SessionRecord {
        SessionRecord::new(
            "u-drv",
            "truck@council.lk",
            ProviderProfile::Driver(DriverProfile {
                truck_id: "TRUCK042".into(),
                municipal_council: "Colombo".into(),
                district: "D1".into(),
                ward: "W1".into(),
                supervisor_id: "SUP001".into(),
                extra: Fields::new(),
            }),
            Utc::now(),
        )
    }

    fn snapshot(state: SessionState, loading: bool) -> AuthSnapshot {
        AuthSnapshot { state, loading }
    }

    #[test]
    fn picks_stack_from_snapshot() {
        let healthy = BoundaryState::Healthy;
        assert_eq!(
            NavigationStack::for_snapshot(&snapshot(SessionState::Initializing, true), &healthy),
            NavigationStack::Loading
        );
        assert_eq!(
            NavigationStack::for_snapshot(&snapshot(SessionState::Initializing, false), &healthy),
            NavigationStack::Public
        );
        assert_eq!(
            NavigationStack::for_snapshot(&snapshot(SessionState::Unauthenticated, false), &healthy),
            NavigationStack::Public
        );

        let driver = snapshot(SessionState::Authenticated(driver_session()), false);
        let stack = NavigationStack::for_snapshot(&driver, &healthy);
        assert_eq!(stack, NavigationStack::Driver);
        assert_eq!(stack.initial_screen(), Screen::DriverHome);
    }

    #[test]
    fn tripped_boundary_wins() {
        let failed = BoundaryState::Failed {
            message: "boom".into(),
        };
        let driver = snapshot(SessionState::Authenticated(driver_session()), false);
        let stack = NavigationStack::for_snapshot(&driver, &failed);
        assert_eq!(stack, NavigationStack::Recovery);
        assert_eq!(stack.initial_screen(), Screen::ErrorRecovery);
    }
}
