//! # Classbook Core
//!
//! Core traits and types for the Classbook reducer architecture.
//!
//! Business logic is written as reducers: pure functions that take the current
//! state and an action, mutate the state, and return *descriptions* of side
//! effects. The runtime crate decides when and how those descriptions run.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for one aggregate (e.g. one scheduled course)
//! - **Action**: All possible inputs to a reducer (commands and the events they produce)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use classbook_core::*;
//!
//! impl Reducer for CourseBookReducer {
//!     type State = CourseBook;
//!     type Action = CourseAction;
//!     type Environment = CourseEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CourseBook,
//!         action: CourseAction,
//!         env: &CourseEnvironment,
//!     ) -> SmallVec<[Effect<CourseAction>; 4]> {
//!         // Business logic goes here
//!         SmallVec::new()
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Event trait and serialized event wire format
pub mod event;

/// Event store abstraction (append-only journal of aggregate streams)
pub mod event_store;

/// Stream identity and versioning
pub mod stream;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// Most reducers return zero to four effects, so the result is a
        /// `SmallVec` that stays on the stack in the common case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the runtime.
    ///
    /// The runtime distinguishes two kinds of work:
    ///
    /// - **Transactional** (`Dispatch`, `Future`, `Parallel`, `Sequential`): runs while the
    ///   aggregate is still locked. Actions they produce are fed straight back into the
    ///   reducer as part of the same unit of work.
    /// - **Detached** (`Detached`): runs after the unit of work has committed. It can
    ///   never feed actions back and its failure cannot undo the state transition.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently, feeding back their actions in declaration order
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another
        Sequential(Vec<Effect<Action>>),

        /// Feed an action back into the reducer within the same unit of work
        Dispatch(Box<Action>),

        /// Arbitrary async computation awaited inside the unit of work
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Fire-and-forget computation spawned once the unit of work has committed
        Detached(Pin<Box<dyn Future<Output = ()> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Dispatch(action) => f.debug_tuple("Effect::Dispatch").field(action).finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Detached(_) => write!(f, "Effect::Detached(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Feed `action` back into the reducer
        #[must_use]
        pub fn dispatch(action: Action) -> Effect<Action> {
            Effect::Dispatch(Box::new(action))
        }

        /// Wrap an async computation that may produce a follow-up action
        #[must_use]
        pub fn future<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }

        /// Wrap post-commit, fire-and-forget work
        #[must_use]
        pub fn detached<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = ()> + Send + 'static,
        {
            Effect::Detached(Box::pin(future))
        }

        /// Returns `true` for [`Effect::None`]
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }

        /// The dispatched action, if this is an [`Effect::Dispatch`]
        #[must_use]
        pub fn as_dispatch(&self) -> Option<&Action> {
            match self {
                Effect::Dispatch(action) => Some(action),
                _ => None,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Deadline arithmetic and calendar-day comparisons read "now" only through
    /// this trait, so tests can pin time to the exact second.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};

    #[derive(Debug, Clone, PartialEq)]
    enum Ping {
        Pong,
    }

    #[test]
    fn dispatch_effect_exposes_action() {
        let effect = Effect::dispatch(Ping::Pong);
        assert_eq!(effect.as_dispatch(), Some(&Ping::Pong));
        assert!(!effect.is_none());
    }

    #[test]
    fn debug_output_hides_futures() {
        let effect: Effect<Ping> = Effect::future(async { Some(Ping::Pong) });
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");

        let detached: Effect<Ping> = Effect::detached(async {});
        assert_eq!(format!("{detached:?}"), "Effect::Detached(<future>)");
    }

    #[tokio::test]
    async fn future_effect_yields_action() {
        let effect: Effect<Ping> = Effect::future(async { Some(Ping::Pong) });
        let Effect::Future(fut) = effect else {
            unreachable!("constructed as a future");
        };
        assert_eq!(fut.await, Some(Ping::Pong));
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
