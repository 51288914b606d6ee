mod epsilon_greedy;

pub use epsilon_greedy::EpsilonGreedy;

/// Exploration policy result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Explore,
    Exploit,
}
