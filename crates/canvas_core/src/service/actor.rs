//! Current-actor context supplied by the host application.

use crate::model::audit::Actor;

/// Identifies the user performing the current action.
pub trait ActorProvider {
    /// `None` when the host cannot identify the user.
    fn current_actor(&self) -> Option<Actor>;

    /// Current actor, degraded to `Actor::unknown()` instead of failing.
    fn resolve_actor(&self) -> Actor {
        self.current_actor().unwrap_or_else(Actor::unknown)
    }
}

/// A fixed, always-known actor.
impl ActorProvider for Actor {
    fn current_actor(&self) -> Option<Actor> {
        Some(self.clone())
    }
}

/// An actor that may be signed out.
impl ActorProvider for Option<Actor> {
    fn current_actor(&self) -> Option<Actor> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::ActorProvider;
    use crate::model::audit::Actor;

    #[test]
    fn missing_actor_resolves_to_unknown() {
        let signed_out: Option<Actor> = None;
        assert_eq!(signed_out.resolve_actor(), Actor::unknown());

        let known = Actor::new("u-1", "Ada", "ada@example.com");
        assert_eq!(known.resolve_actor().user_id, "u-1");
    }
}
