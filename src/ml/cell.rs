// ============================================================
// Layer 5 — LSTM Cell
// ============================================================
// One step of a standard LSTM:
//
//   gates = W_x · x + b + W_h · h
//   i, g, f, o = split(gates, 4)
//   c' = σ(f + forget_bias) ⊙ c + σ(i) ⊙ tanh(g)
//   h' = σ(o) ⊙ tanh(c')
//
// The decoder stacks several of these and drives them one token
// at a time, so the cell exposes a single-step forward rather
// than a whole-sequence one.
//
// burn::nn::Lstm is not used here:
//   - forget_bias is a fixed constant added inside the forget
//     gate on every step, separate from the trainable bias
//   - the first layer's input depends on the previous step's
//     attention output, so the stack cannot run as a sequence
//   - beam search reorders each layer's (cell, hidden) rows
//     between steps, which CellState exposes directly

use burn::{
    nn::{Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

/// Cell and hidden state of one LSTM layer
#[derive(Debug, Clone)]
pub struct CellState<B: Backend> {
    /// Memory cell c, [batch, hidden]
    pub cell: Tensor<B, 2>,

    /// Output h, [batch, hidden]; also the next layer's input
    pub hidden: Tensor<B, 2>,
}

#[derive(Config, Debug)]
pub struct LstmCellConfig {
    pub input_size:  usize,
    pub hidden_size: usize,
    #[config(default = 1.0)]
    pub forget_bias: f64,
}

impl LstmCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LstmCell<B> {
        let initializer = Initializer::XavierUniform { gain: 1.0 };
        let input_gates = LinearConfig::new(self.input_size, 4 * self.hidden_size)
            .with_initializer(initializer.clone())
            .init(device);
        let hidden_gates = LinearConfig::new(self.hidden_size, 4 * self.hidden_size)
            .with_bias(false)
            .with_initializer(initializer)
            .init(device);
        LstmCell {
            input_gates,
            hidden_gates,
            hidden_size: self.hidden_size,
            forget_bias: self.forget_bias,
        }
    }
}

#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    pub input_gates:  Linear<B>,
    pub hidden_gates: Linear<B>,
    pub hidden_size:  usize,
    pub forget_bias:  f64,
}

impl<B: Backend> LstmCell<B> {
    /// Advance one step. `input` is [batch, input_size].
    pub fn forward(&self, input: Tensor<B, 2>, state: CellState<B>) -> CellState<B> {
        let [batch, _] = input.dims();
        let h = self.hidden_size;

        let gates = self.input_gates.forward(input) + self.hidden_gates.forward(state.hidden);
        let gate = |k: usize| gates.clone().slice([0..batch, k * h..(k + 1) * h]);

        let input_gate  = sigmoid(gate(0));
        let candidate   = gate(1).tanh();
        let forget_gate = sigmoid(gate(2).add_scalar(self.forget_bias));
        let output_gate = sigmoid(gate(3));

        let cell   = forget_gate * state.cell + input_gate * candidate;
        let hidden = output_gate * cell.clone().tanh();
        CellState { cell, hidden }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let cell = LstmCellConfig::new(6, 4).init::<B>(&device);
        let state = CellState {
            cell:   Tensor::zeros([3, 4], &device),
            hidden: Tensor::zeros([3, 4], &device),
        };
        let next = cell.forward(Tensor::ones([3, 6], &device), state);
        assert_eq!(next.cell.dims(), [3, 4]);
        assert_eq!(next.hidden.dims(), [3, 4]);
    }

    #[test]
    fn test_zero_weights_keep_zero_state() {
        let device = Default::default();
        let cell = LstmCellConfig::new(2, 3).init::<B>(&device);
        let cell = LstmCell {
            input_gates: LinearConfig::new(2, 12)
                .with_initializer(Initializer::Zeros)
                .init(&device),
            hidden_gates: LinearConfig::new(3, 12)
                .with_bias(false)
                .with_initializer(Initializer::Zeros)
                .init(&device),
            ..cell
        };
        let state = CellState {
            cell:   Tensor::zeros([1, 3], &device),
            hidden: Tensor::zeros([1, 3], &device),
        };
        // candidate = tanh(0) = 0 and the old cell is 0, so nothing accumulates
        let next = cell.forward(Tensor::ones([1, 2], &device), state);
        let hidden: Vec<f32> = next.hidden.into_data().to_vec().unwrap();
        assert!(hidden.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_forget_bias_preserves_cell() {
        let device = Default::default();
        let mut cell = LstmCellConfig::new(1, 1).with_forget_bias(50.0).init::<B>(&device);
        cell.input_gates = LinearConfig::new(1, 4)
            .with_initializer(Initializer::Zeros)
            .init(&device);
        cell.hidden_gates = LinearConfig::new(1, 4)
            .with_bias(false)
            .with_initializer(Initializer::Zeros)
            .init(&device);
        let state = CellState {
            cell:   Tensor::from_floats([[0.7]], &device),
            hidden: Tensor::zeros([1, 1], &device),
        };
        let next = cell.forward(Tensor::zeros([1, 1], &device), state);
        let c: f32 = next.cell.into_scalar();
        assert!((c - 0.7).abs() < 1e-4);
    }
}
