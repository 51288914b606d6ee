use burn::tensor::{backend::Backend, BasicOps, Data, Float, Int, Shape, Tensor};

/// A trait for converting items to tensors
///
/// Implemented for the batches a DQN agent feeds its networks: observation vectors become a
/// `[batch, N]` float tensor, while action indices and scalars become `[batch, 1]` columns.
pub trait ToTensor<B: Backend, const D: usize, K: BasicOps<B>> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, D, K>;
}

impl<B: Backend, const N: usize> ToTensor<B, 2, Float> for Vec<[f32; N]> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 2, Float> {
        let len = self.len();
        let data = Data::new(
            self.into_iter().flatten().collect::<Vec<f32>>(),
            Shape::new([len, N]),
        );
        Tensor::from_data(data.convert::<B::FloatElem>(), device)
    }
}

impl<B: Backend> ToTensor<B, 2, Float> for Vec<f32> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 2, Float> {
        let len = self.len();
        let data = Data::new(self, Shape::new([len, 1]));
        Tensor::from_data(data.convert::<B::FloatElem>(), device)
    }
}

impl<B: Backend> ToTensor<B, 2, Int> for Vec<usize> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 2, Int> {
        let len = self.len();
        let data = Data::new(
            self.into_iter().map(|x| x as i64).collect::<Vec<_>>(),
            Shape::new([len, 1]),
        );
        Tensor::from_data(data.convert::<B::IntElem>(), device)
    }
}
