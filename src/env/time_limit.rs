use super::{DiscreteActionSpace, Environment, Feedback};

/// Truncates episodes of the wrapped environment after a fixed number of steps
///
/// A step that terminates on its own is still reported as terminal, even when it is also the last allowed step.
#[derive(Debug, Clone)]
pub struct TimeLimit<E> {
    env: E,
    max_steps: usize,
    steps: usize,
}

impl<E: Environment> TimeLimit<E> {
    pub fn new(env: E, max_steps: usize) -> Self {
        Self {
            env,
            max_steps,
            steps: 0,
        }
    }

    /// Steps taken in the current episode
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn inner(&self) -> &E {
        &self.env
    }

    pub fn into_inner(self) -> E {
        self.env
    }
}

impl<E: Environment> Environment for TimeLimit<E> {
    type State = E::State;
    type Action = E::Action;

    fn random_action(&mut self) -> Self::Action {
        self.env.random_action()
    }

    fn step(&mut self, action: Self::Action) -> Feedback<Self::State> {
        let mut feedback = self.env.step(action);
        self.steps += 1;
        if self.steps >= self.max_steps && feedback.next_state.is_some() {
            feedback.truncated = true;
        }
        feedback
    }

    fn reset(&mut self) -> Self::State {
        self.steps = 0;
        self.env.reset()
    }
}

impl<E: DiscreteActionSpace> DiscreteActionSpace for TimeLimit<E> {
    fn actions(&self) -> Vec<Self::Action> {
        self.env.actions()
    }
}
