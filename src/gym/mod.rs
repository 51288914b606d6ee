pub mod acrobot;
pub mod cart_pole;
pub mod mountain_car;
pub mod pendulum;

pub use acrobot::Acrobot;
pub use cart_pole::CartPole;
pub use mountain_car::MountainCar;
pub use pendulum::Pendulum;
