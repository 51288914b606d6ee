use std::path::Path;

use burn::{
    config::Config,
    module::{Module, Param},
    nn::{Linear, LinearConfig},
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{
        activation::relu,
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};

use crate::algo::DQNModel;

/// A fully connected Q network: `input → hidden → hidden → actions` with ReLU activations
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
}

#[derive(Config, Debug)]
pub struct QNetworkConfig {
    /// Length of the observation vector
    input_size: usize,
    /// Number of discrete actions
    output_size: usize,
    #[config(default = 128)]
    hidden_size: usize,
}

impl QNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        QNetwork {
            fc1: LinearConfig::new(self.input_size, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            fc3: LinearConfig::new(self.hidden_size, self.output_size).init(device),
        }
    }
}

impl<B: Backend> QNetwork<B> {
    /// Q values for a `[batch, input_size]` batch of observations
    pub fn q_values(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.fc1.forward(input));
        let x = relu(self.fc2.forward(x));
        self.fc3.forward(x)
    }

    /// Save the parameters to `path`, which gets the recorder's `.mpk` extension
    pub fn save(self, path: impl AsRef<Path>) -> crate::Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.save_file(path.as_ref().to_path_buf(), &recorder)?;
        Ok(())
    }

    /// Load parameters saved with [`save`](QNetwork::save) into a network of the same shape
    pub fn load(self, path: impl AsRef<Path>, device: &B::Device) -> crate::Result<Self> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        Ok(self.load_file(path.as_ref().to_path_buf(), &recorder, device)?)
    }
}

impl<B: AutodiffBackend> DQNModel<B> for QNetwork<B> {
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.q_values(input)
    }

    fn soft_update(self, other: &Self, tau: f32) -> Self {
        Self {
            fc1: soft_update_linear(self.fc1, &other.fc1, tau),
            fc2: soft_update_linear(self.fc2, &other.fc2, tau),
            fc3: soft_update_linear(self.fc3, &other.fc3, tau),
        }
    }
}

/// The blend is detached so the target network never accumulates an autodiff graph
fn soft_update_tensor<B: Backend, const D: usize>(
    this: Param<Tensor<B, D>>,
    that: &Param<Tensor<B, D>>,
    tau: f32,
) -> Param<Tensor<B, D>> {
    this.map(|tensor| (tensor * (1.0 - tau) + that.val() * tau).detach())
}

fn soft_update_linear<B: Backend>(mut this: Linear<B>, that: &Linear<B>, tau: f32) -> Linear<B> {
    this.weight = soft_update_tensor(this.weight, &that.weight, tau);
    this.bias = match (this.bias, &that.bias) {
        (Some(b1), Some(b2)) => Some(soft_update_tensor(b1, b2, tau)),
        _ => None,
    };

    this
}

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};

    use super::*;

    type B = Autodiff<NdArray>;

    fn outputs(model: &QNetwork<B>) -> Vec<f32> {
        let device = Default::default();
        let input = Tensor::<B, 2>::from_floats([[0.1, -0.2, 0.3, 0.0]], &device);
        model.q_values(input).into_data().convert::<f32>().value
    }

    #[test]
    fn output_shape() {
        let device = Default::default();
        let model = QNetworkConfig::new(4, 3).with_hidden_size(16).init::<B>(&device);
        let input = Tensor::<B, 2>::zeros([5, 4], &device);
        assert_eq!(model.q_values(input).dims(), [5, 3], "one Q value per action");
    }

    #[test]
    fn soft_update_blends() {
        let device = Default::default();
        let config = QNetworkConfig::new(4, 2).with_hidden_size(8);
        let a = config.init::<B>(&device);
        let b = config.init::<B>(&device);

        let unchanged = a.clone().soft_update(&b, 0.0);
        assert_eq!(outputs(&unchanged), outputs(&a), "tau = 0 keeps the target");

        let copied = a.soft_update(&b, 1.0);
        let (x, y) = (outputs(&copied), outputs(&b));
        for (x, y) in x.iter().zip(y.iter()) {
            assert!((x - y).abs() < 1e-6, "tau = 1 copies the policy");
        }
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DQN_CartPole-v1");
        let device = Default::default();
        let config = QNetworkConfig::new(4, 2).with_hidden_size(8);

        let model = config.init::<B>(&device);
        let expected = outputs(&model);
        model.save(&path).unwrap();
        assert!(path.with_extension("mpk").exists(), "written with the mpk extension");

        let loaded = config.init::<B>(&device).load(&path, &device).unwrap();
        assert_eq!(outputs(&loaded), expected, "parameters restored");
    }
}
