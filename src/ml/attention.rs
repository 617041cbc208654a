// ============================================================
// Layer 5 — Luong Attention
// ============================================================
// Multiplicative ("general") attention over the encoder's
// spatial feature grid:
//
//   keys       = W_mem · memory          (once per sequence)
//   score_j    = keys_j · query          (query = top LSTM output)
//   alignments = softmax(score)
//   context    = Σ_j alignments_j · memory_j
//
// Keys are computed once and carried in AttentionMemory so each
// decoding step only pays for one batched matmul.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

#[derive(Config, Debug)]
pub struct LuongAttentionConfig {
    /// Channel width of each memory slot
    pub memory_size: usize,
    /// Width of keys and queries
    pub num_units:   usize,
}

impl LuongAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LuongAttention<B> {
        LuongAttention {
            memory_layer: LinearConfig::new(self.memory_size, self.num_units)
                .with_bias(false)
                .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct LuongAttention<B: Backend> {
    pub memory_layer: Linear<B>,
}

/// Encoder features prepared for attention.
#[derive(Debug, Clone)]
pub struct AttentionMemory<B: Backend> {
    /// Raw features, [batch, slots, memory_size]
    pub values: Tensor<B, 3>,
    /// Projected features, [batch, slots, num_units]
    pub keys:   Tensor<B, 3>,
}

impl<B: Backend> AttentionMemory<B> {
    /// Repeat every batch row `times` times, row-major: a batch of one
    /// image becomes `times` identical rows for beam search.
    pub fn tile(self, times: usize) -> Self {
        Self {
            values: tile_rows(self.values, times),
            keys:   tile_rows(self.keys, times),
        }
    }

    pub fn slots(&self) -> usize {
        self.values.dims()[1]
    }
}

pub(crate) fn tile_rows<B: Backend, const D: usize>(tensor: Tensor<B, D>, times: usize) -> Tensor<B, D> {
    if times <= 1 {
        return tensor;
    }
    let batch = tensor.dims()[0];
    let index: Vec<i64> = (0..batch as i64)
        .flat_map(|row| std::iter::repeat(row).take(times))
        .collect();
    let index = Tensor::<B, 1, Int>::from_data(
        burn::tensor::TensorData::new(index, [batch * times]),
        &tensor.device(),
    );
    tensor.select(0, index)
}

impl<B: Backend> LuongAttention<B> {
    pub fn memory(&self, values: Tensor<B, 3>) -> AttentionMemory<B> {
        let keys = self.memory_layer.forward(values.clone());
        AttentionMemory { values, keys }
    }

    /// Alignment weights of `query` ([batch, num_units]) over every slot.
    pub fn align(&self, query: Tensor<B, 2>, memory: &AttentionMemory<B>) -> Tensor<B, 2> {
        let [batch, units] = query.dims();
        let slots = memory.slots();
        let scores = memory
            .keys
            .clone()
            .matmul(query.reshape([batch, units, 1]))
            .reshape([batch, slots]);
        softmax(scores, 1)
    }

    /// Weighted sum of memory values, [batch, memory_size].
    pub fn context(&self, alignments: Tensor<B, 2>, memory: &AttentionMemory<B>) -> Tensor<B, 2> {
        let [batch, slots] = alignments.dims();
        let [_, _, size] = memory.values.dims();
        alignments
            .reshape([batch, 1, slots])
            .matmul(memory.values.clone())
            .reshape([batch, size])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_alignments_sum_to_one() {
        let device = Default::default();
        let attn = LuongAttentionConfig::new(5, 4).init::<B>(&device);
        let memory = attn.memory(Tensor::random([2, 6, 5], burn::tensor::Distribution::Default, &device));
        let alignments = attn.align(Tensor::ones([2, 4], &device), &memory);

        assert_eq!(alignments.dims(), [2, 6]);
        let sums: Vec<f32> = alignments.sum_dim(1).into_data().to_vec().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_context_of_identical_slots_is_that_slot() {
        let device = Default::default();
        let attn = LuongAttentionConfig::new(3, 2).init::<B>(&device);
        let row = Tensor::<B, 3>::from_floats([[[1.0, -2.0, 0.5]]], &device);
        let values = Tensor::cat(vec![row.clone(), row.clone(), row], 1);
        let memory = attn.memory(values);

        let alignments = attn.align(Tensor::from_floats([[0.3, -0.1]], &device), &memory);
        let context: Vec<f32> = attn.context(alignments, &memory).into_data().to_vec().unwrap();

        let expected = [1.0, -2.0, 0.5];
        for (c, e) in context.iter().zip(expected) {
            assert!((c - e).abs() < 1e-5);
        }
    }

    #[test]
    fn test_tile_repeats_each_row() {
        let device = Default::default();
        let t = Tensor::<B, 2>::from_floats([[1.0, 1.0], [2.0, 2.0]], &device);
        let tiled: Vec<f32> = tile_rows(t, 3).into_data().to_vec().unwrap();
        assert_eq!(tiled, vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
    }
}
